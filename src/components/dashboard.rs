use leptos::{prelude::*, task::spawn_local};
use leptos_router::hooks::use_navigate;

use crate::api::HttpApi;
use crate::components::browser::{confirm, use_auth_guard};
use crate::storage::{self, BrowserStorage};

/// Shared top bar for the signed-in views.
#[component]
pub fn PageHeader(title: &'static str) -> impl IntoView {
    let navigate = use_navigate();
    let (username, set_username) = signal(String::from("User"));

    Effect::new(move |_| {
        set_username(storage::username(&BrowserStorage));
    });

    let logout = move |_| {
        if confirm("Are you sure you want to logout?") {
            <HttpApi>::default().logout();
            navigate("/login?message=logout", Default::default());
        }
    };

    view! {
        <div class="flex justify-between items-center bg-gray-300 dark:bg-teal-800 px-6 py-4">
            <div class="flex items-center space-x-4">
                <a href="/dashboard" class="text-2xl text-teal-600 dark:text-mint-400 hover:text-teal-800 dark:hover:text-mint-300">
                    "ragdesk"
                </a>
                <span class="text-lg text-gray-700 dark:text-gray-300">{title}</span>
            </div>
            <div class="flex items-center space-x-4">
                <a href="/file-management" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"files"</a>
                <a href="/query-interface" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"ask"</a>
                <a href="/chat-interface" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"chat"</a>
                <span class="text-sm text-gray-600 dark:text-gray-400">{username}</span>
                <button
                    class="px-3 py-1 text-sm bg-salmon-600 hover:bg-salmon-700 text-white rounded-md transition-colors"
                    on:click=logout
                >
                    "Logout"
                </button>
            </div>
        </div>
    }
}

#[component]
pub fn DashboardPage() -> impl IntoView {
    use_auth_guard();
    let (file_count, set_file_count) = signal(Option::<usize>::None);

    Effect::new(move |_| {
        spawn_local(async move {
            match <HttpApi>::default().list_files().await {
                Ok(list) => set_file_count(Some(list.files.len())),
                Err(e) => log::info!("File loading failed, using defaults: {}", e),
            }
        });
    });

    view! {
        <div class="min-h-screen bg-gray-100 dark:bg-teal-900">
            <PageHeader title="Dashboard" />
            <div class="container mx-auto p-6 space-y-6">
                <div class="bg-white dark:bg-teal-800 rounded-lg shadow-md p-6">
                    <p class="text-gray-600 dark:text-gray-400">"Uploaded documents"</p>
                    <p class="text-3xl font-bold text-gray-800 dark:text-gray-200">
                        {move || file_count.get().unwrap_or(0)}
                    </p>
                </div>
                <div class="grid gap-4 md:grid-cols-3">
                    <NavCard
                        href="/file-management"
                        title="Manage Files"
                        blurb="Upload documents, pick up to three and prepare them for search."
                    />
                    <NavCard
                        href="/query-interface"
                        title="Ask a Question"
                        blurb="One-off answers from your documents, Wikipedia, or both."
                    />
                    <NavCard
                        href="/chat-interface"
                        title="Chat"
                        blurb="A running conversation over your prepared documents."
                    />
                </div>
            </div>
        </div>
    }
}

#[component]
fn NavCard(href: &'static str, title: &'static str, blurb: &'static str) -> impl IntoView {
    view! {
        <a
            href=href
            class="block bg-white dark:bg-teal-800 rounded-lg shadow-md p-6 hover:shadow-lg transition-shadow"
        >
            <h2 class="text-xl font-semibold text-gray-800 dark:text-gray-200 mb-2">{title}</h2>
            <p class="text-sm text-gray-600 dark:text-gray-400">{blurb}</p>
        </a>
    }
}
