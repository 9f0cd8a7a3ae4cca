use leptos::{prelude::*, task::spawn_local};

use crate::api::types::UploadedFile;
use crate::api::HttpApi;
use crate::components::browser::{confirm, sleep, use_auth_guard};
use crate::components::dashboard::PageHeader;
use crate::components::toast::use_toasts;
use crate::files::{self, FILES_PER_PAGE, MAX_SELECTED};
use crate::indexing::{poll_until_settled, status_label, PollPolicy, PollStep};
use crate::storage::{KeyValueStore, BrowserStorage, RAG_INITIALIZED};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Badge {
    Idle,
    Working,
    Ready,
    Failed,
}

impl Badge {
    fn classes(&self) -> &'static str {
        match self {
            Badge::Idle => "bg-yellow-400",
            Badge::Working => "bg-teal-400 animate-pulse",
            Badge::Ready => "bg-seafoam-500",
            Badge::Failed => "bg-salmon-500",
        }
    }
}

fn format_date(date: Option<&str>) -> String {
    date.and_then(|d| {
        chrono::NaiveDateTime::parse_from_str(d, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .or_else(|| Some(d.to_string()))
    })
    .unwrap_or_else(|| "Unknown".to_string())
}

#[component]
pub fn FileManagementPage() -> impl IntoView {
    use_auth_guard();
    let toasts = use_toasts();

    let files = RwSignal::new(Vec::<UploadedFile>::new());
    let (loading, set_loading) = signal(false);
    let (search, set_search) = signal(String::new());
    let (page_number, set_page_number) = signal(1usize);
    let (badge, set_badge) = signal(Badge::Idle);
    let (status_text, set_status_text) = signal(String::from("Checking..."));
    let (initializing, set_initializing) = signal(false);
    let (uploading, set_uploading) = signal(false);

    let load_files = move || {
        set_loading(true);
        spawn_local(async move {
            match <HttpApi>::default().list_files().await {
                Ok(list) => files.set(list.files),
                Err(e) => {
                    log::error!("Error loading files: {}", e);
                    toasts.error("Failed to load files");
                }
            }
            set_loading(false);
        });
    };

    let check_status = move || {
        spawn_local(async move {
            match <HttpApi>::default().chain_status().await {
                Ok(status) => {
                    set_badge(if status.initialized { Badge::Ready } else { Badge::Idle });
                    set_status_text(format!("Document Status: {}", status_label(&status)));
                }
                Err(e) => {
                    log::error!("Error checking document status: {}", e);
                    set_badge(Badge::Failed);
                    set_status_text("Document Status: Unknown".to_string());
                }
            }
        });
    };

    Effect::new(move |_| {
        load_files();
        check_status();
    });

    let toggle = move |file_id: i64| {
        let selection = match files::toggle_selection(&files.get_untracked(), file_id) {
            Ok(selection) => selection,
            Err(e) => {
                toasts.warning(e.to_string());
                return;
            }
        };
        spawn_local(async move {
            match <HttpApi>::default().select_files(&selection).await {
                Ok(response) => {
                    let selected: Vec<i64> = response.selected_files.iter().map(|f| f.id).collect();
                    files.update(|files| files::apply_selection(files, &selected));
                }
                Err(e) => {
                    log::error!("Error updating selection: {}", e);
                    toasts.error(e.user_message());
                }
            }
        });
    };

    let delete = move |file: UploadedFile| {
        let prompt = format!(
            "Are you sure you want to delete \"{}\"? This action cannot be undone.",
            file.filename
        );
        if !confirm(&prompt) {
            return;
        }
        spawn_local(async move {
            match <HttpApi>::default().delete_file(file.id).await {
                Ok(()) => {
                    toasts.success("File deleted successfully");
                    load_files();
                }
                Err(e) => {
                    log::error!("Error deleting file: {}", e);
                    toasts.error("Failed to delete file");
                }
            }
        });
    };

    let initialize = move |_| {
        set_initializing(true);
        set_badge(Badge::Working);
        set_status_text("Document Status: Starting...".to_string());
        toasts.info("Starting document processing in background...");

        spawn_local(async move {
            let api = <HttpApi>::default();
            match api.initialize_chain().await {
                Ok(reply) if reply.status.as_deref() == Some("warning") => {
                    toasts.warning(reply.message.unwrap_or_default());
                    set_badge(Badge::Idle);
                    set_status_text("Document Status: Not Processed".to_string());
                    set_initializing(false);
                    return;
                }
                Ok(_) => {
                    set_status_text("Document Status: Initializing...".to_string());
                    toasts.info("Document processing started. This may take a few minutes...");
                }
                Err(e) => {
                    log::error!("Error initializing resources: {}", e);
                    set_badge(Badge::Failed);
                    set_status_text("Document Status: Error".to_string());
                    toasts.error("Failed to start document processing");
                    set_initializing(false);
                    return;
                }
            }

            match poll_until_settled(&api, PollPolicy::default(), sleep, chrono::Utc::now).await {
                PollStep::Ready => {
                    BrowserStorage.set(RAG_INITIALIZED, "true");
                    set_badge(Badge::Ready);
                    set_status_text("Document Status: Ready".to_string());
                    toasts.success("Documents processed successfully!");
                }
                PollStep::Failed(message) => {
                    set_badge(Badge::Failed);
                    set_status_text("Document Status: Error".to_string());
                    toasts.error(format!("Document processing failed: {}", message));
                }
                PollStep::TimedOut | PollStep::Continue => {
                    set_badge(Badge::Failed);
                    set_status_text("Document Status: Timeout".to_string());
                    toasts.warning("Document processing timeout. Please try again.");
                }
            }
            set_initializing(false);
        });
    };

    let on_pick = move |ev: leptos::ev::Event| {
        let input: web_sys::HtmlInputElement = event_target(&ev);
        let Some(list) = input.files() else {
            return;
        };
        let picked: Vec<web_sys::File> = (0..list.length()).filter_map(|i| list.get(i)).collect();
        input.set_value("");
        if picked.is_empty() {
            return;
        }

        let described: Vec<(String, String)> = picked.iter().map(|f| (f.name(), f.type_())).collect();
        let plan = match files::plan_upload(&described, &files.get_untracked()) {
            Ok(plan) => plan,
            Err(e) => {
                toasts.error(e.to_string());
                return;
            }
        };
        if !plan.duplicates.is_empty() {
            toasts.warning(format!("Duplicate file(s) found: {}", plan.duplicates.join(", ")));
        }
        let accepted: Vec<web_sys::File> = plan.accepted.iter().map(|&i| picked[i].clone()).collect();
        let total: f64 = accepted.iter().map(|f| f.size()).sum();
        log::info!("Uploading {} file(s), {}", accepted.len(), files::format_file_size(total));

        set_uploading(true);
        spawn_local(async move {
            match upload(accepted).await {
                Ok(()) => {
                    toasts.success("Files uploaded successfully");
                    load_files();
                }
                Err(message) => toasts.error(message),
            }
            set_uploading(false);
        });
    };

    let visible = move || {
        let all = files.get();
        let filtered: Vec<UploadedFile> = files::filter_files(&all, &search.get())
            .into_iter()
            .cloned()
            .collect();
        let page = files::page(filtered.len(), page_number.get(), FILES_PER_PAGE);
        (filtered[page.start..page.end].to_vec(), page)
    };

    let selected_count = move || files.with(|f| files::selected_ids(f).len());

    view! {
        <div class="min-h-screen bg-gray-100 dark:bg-teal-900">
            <PageHeader title="File Management" />
            <div class="container mx-auto p-6 space-y-6">
                <div class="bg-white dark:bg-teal-800 rounded-lg shadow-md p-6 flex flex-wrap items-center justify-between gap-4">
                    <div class="flex items-center space-x-3">
                        <span class=move || format!("inline-block w-3 h-3 rounded-full {}", badge.get().classes())></span>
                        <span class="text-gray-700 dark:text-gray-300">{status_text}</span>
                    </div>
                    <div class="text-sm text-gray-600 dark:text-gray-400">
                        {move || format!("{} files, {} of {} selected", files.with(Vec::len), selected_count(), MAX_SELECTED)}
                    </div>
                    <button
                        class="px-4 py-2 bg-seafoam-600 hover:bg-seafoam-700 text-white rounded-md disabled:bg-gray-400 disabled:cursor-not-allowed"
                        prop:disabled=move || initializing.get() || selected_count() == 0
                        on:click=initialize
                    >
                        {move || if initializing.get() { "Initializing..." } else { "Prepare Documents for Smart Search" }}
                    </button>
                </div>

                <div class="bg-white dark:bg-teal-800 rounded-lg shadow-md p-6 space-y-4">
                    <div class="flex flex-wrap items-center justify-between gap-4">
                        <input
                            class="flex-1 p-2 rounded-md border border-gray-300 dark:border-teal-600 bg-white dark:bg-teal-700 text-gray-800 dark:text-gray-200"
                            type="text"
                            placeholder="Search files..."
                            prop:value=search
                            on:input=move |ev| {
                                set_search(event_target_value(&ev));
                                set_page_number(1);
                            }
                        />
                        <label class="px-4 py-2 bg-teal-600 hover:bg-teal-700 text-white rounded-md cursor-pointer">
                            {move || if uploading.get() { "Uploading..." } else { "Upload PDF" }}
                            <input type="file" accept="application/pdf" multiple class="hidden" on:change=on_pick />
                        </label>
                    </div>

                    {move || {
                        if loading.get() {
                            return view! { <p class="text-gray-500">"Loading files..."</p> }.into_any();
                        }
                        let (rows, page) = visible();
                        if rows.is_empty() {
                            return view! {
                                <div class="text-center text-gray-500 dark:text-gray-400 py-8">
                                    <h3 class="text-lg">"No documents uploaded yet"</h3>
                                    <p class="text-sm">"Upload your first PDF document to get started"</p>
                                </div>
                            }
                                .into_any();
                        }
                        view! {
                            <div class="space-y-2">
                                <For
                                    each=move || rows.clone()
                                    key=|file| (file.id, file.is_selected)
                                    children=move |file| {
                                        let id = file.id;
                                        let for_delete = file.clone();
                                        view! {
                                            <div class=format!(
                                                "flex items-center justify-between p-3 rounded-md border {}",
                                                if file.is_selected { "border-seafoam-500" } else { "border-gray-200 dark:border-teal-600" },
                                            )>
                                                <div class="flex items-center space-x-3">
                                                    <input
                                                        type="checkbox"
                                                        prop:checked=file.is_selected
                                                        on:change=move |_| toggle(id)
                                                    />
                                                    <div>
                                                        <div class="text-gray-800 dark:text-gray-200">{file.filename.clone()}</div>
                                                        <div class="text-xs text-gray-500 dark:text-gray-400">
                                                            {format_date(file.upload_date.as_deref())}
                                                            {if file.is_selected { " - Selected" } else { " - Not Selected" }}
                                                        </div>
                                                        {file.description.clone().map(|d| view! {
                                                            <div class="text-xs text-gray-500 dark:text-gray-400 italic">{d}</div>
                                                        })}
                                                    </div>
                                                </div>
                                                <button
                                                    class="px-2 py-1 text-sm text-salmon-600 hover:underline"
                                                    on:click=move |_| delete(for_delete.clone())
                                                >
                                                    "Delete"
                                                </button>
                                            </div>
                                        }
                                    }
                                />
                                {(page.total > 1).then(|| view! {
                                    <div class="flex items-center justify-center space-x-4 pt-2">
                                        <button
                                            class="px-3 py-1 rounded-md bg-gray-200 dark:bg-teal-700 disabled:opacity-50"
                                            prop:disabled=page.number == 1
                                            on:click=move |_| set_page_number(page.number - 1)
                                        >
                                            "Previous"
                                        </button>
                                        <span class="text-sm">{format!("Page {} of {}", page.number, page.total)}</span>
                                        <button
                                            class="px-3 py-1 rounded-md bg-gray-200 dark:bg-teal-700 disabled:opacity-50"
                                            prop:disabled=page.number == page.total
                                            on:click=move |_| set_page_number(page.number + 1)
                                        >
                                            "Next"
                                        </button>
                                    </div>
                                })}
                            </div>
                        }
                            .into_any()
                    }}
                </div>
            </div>
        </div>
    }
}

#[cfg(feature = "hydrate")]
async fn upload(accepted: Vec<web_sys::File>) -> Result<(), String> {
    <HttpApi>::default()
        .upload_files(&accepted)
        .await
        .map(|_| ())
        .map_err(|e| {
            log::error!("Upload failed: {}", e);
            e.user_message()
        })
}

#[cfg(not(feature = "hydrate"))]
async fn upload(accepted: Vec<web_sys::File>) -> Result<(), String> {
    Err(format!("cannot upload {} file(s) outside the browser", accepted.len()))
}
