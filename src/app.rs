use leptos::prelude::*;
use leptos_meta::*;
use leptos_router::{
    components::{Route, Router, Routes},
    path,
};

use crate::components::auth_forms::{ForgotPasswordPage, LoginPage, RegisterPage};
use crate::components::chat_interface::ChatInterfacePage;
use crate::components::dashboard::DashboardPage;
use crate::components::file_management::FileManagementPage;
use crate::components::query_interface::QueryInterfacePage;
use crate::components::toast::{ToastContext, ToastHost};

pub fn shell(options: LeptosOptions) -> impl IntoView {
    view! {
        <!DOCTYPE html>
        <html lang="en">
            <head>
                <meta charset="utf-8"/>
                <meta name="viewport" content="width=device-width, initial-scale=1"/>
                <AutoReload options=options.clone()/>
                <HydrationScripts options/>
                <MetaTags/>
            </head>
            <body>
                <App/>
            </body>
        </html>
    }
}

#[component]
pub fn App() -> impl IntoView {
    provide_meta_context();
    provide_context(ToastContext::new());

    view! {
        <Stylesheet id="leptos" href="/pkg/ragdesk.css"/>
        <Title text="ragdesk"/>

        <Router>
            <main>
                <Routes fallback=NotFound>
                    <Route path=path!("/") view=LoginPage/>
                    <Route path=path!("/login") view=LoginPage/>
                    <Route path=path!("/register") view=RegisterPage/>
                    <Route path=path!("/forgot-password") view=ForgotPasswordPage/>
                    <Route path=path!("/dashboard") view=DashboardPage/>
                    <Route path=path!("/file-management") view=FileManagementPage/>
                    <Route path=path!("/query-interface") view=QueryInterfacePage/>
                    <Route path=path!("/chat-interface") view=ChatInterfacePage/>
                </Routes>
            </main>
            <ToastHost/>
        </Router>
    }
}

#[component]
fn NotFound() -> impl IntoView {
    #[cfg(feature = "ssr")]
    {
        if let Some(response) = use_context::<leptos_axum::ResponseOptions>() {
            response.set_status(http::StatusCode::NOT_FOUND);
        }
    }

    view! {
        <div class="min-h-screen flex flex-col items-center justify-center bg-gray-100 dark:bg-teal-900">
            <h1 class="text-3xl text-gray-800 dark:text-gray-200 mb-4">"Page not found"</h1>
            <a href="/dashboard" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"Back to the dashboard"</a>
        </div>
    }
}
