use leptos::{prelude::*, task::spawn_local};

use crate::api::HttpApi;
use crate::chat::export::{chat_csv, chat_export_filename};
use crate::chat::{ChatError, ChatMessage, Citation, Role, SessionOutcome, SessionReconciler, Transcript};
use crate::components::browser::{confirm, download_text, use_auth_guard};
use crate::components::citation_views::{AnswerWithMarkers, CitationDetail, CitedText, SourcesList};
use crate::components::dashboard::PageHeader;
use crate::components::toast::{use_toasts, ToastContext};
use crate::storage::BrowserStorage;

type Reconciler = SessionReconciler<HttpApi, BrowserStorage>;

/// The page's single reconciler. Async work checks it out for the duration of
/// one operation, so a second operation started meanwhile finds the slot empty.
#[derive(Clone, Copy)]
struct ReconcilerSlot(StoredValue<Option<Reconciler>, LocalStorage>);

impl ReconcilerSlot {
    fn new(reconciler: Reconciler) -> Self {
        Self(StoredValue::new_local(Some(reconciler)))
    }

    fn checkout(&self) -> Option<Reconciler> {
        self.0.try_update_value(Option::take).flatten()
    }

    fn restore(&self, reconciler: Reconciler) {
        self.0.set_value(Some(reconciler));
    }
}

fn cited_detail(transcript: &Transcript, message_id: &str, index: usize) -> Option<Citation> {
    transcript.citation(Some(message_id), index).cloned()
}

fn uses_spans(message: &ChatMessage) -> bool {
    message.citations.iter().any(|c| c.text_span.is_some())
}

#[component]
pub fn ChatInterfacePage() -> impl IntoView {
    use_auth_guard();
    let toasts = use_toasts();

    let transcript = RwSignal::new(Transcript::new());
    let (index_ready, set_index_ready) = signal(Option::<bool>::None);
    let (session_active, set_session_active) = signal(false);
    let (sending, set_sending) = signal(false);
    let (draft, set_draft) = signal(String::new());
    let (detail, set_detail) = signal(Option::<(String, usize)>::None);

    let mut reconciler = SessionReconciler::new(<HttpApi>::default(), BrowserStorage);
    reconciler.set_observer(move |current: &Transcript| transcript.set(current.clone()));
    let slot = ReconcilerSlot::new(reconciler);

    let sync_flags = move |reconciler: &Reconciler| {
        set_index_ready(reconciler.index_initialized());
        set_session_active(reconciler.is_active());
    };

    Effect::new(move |_| {
        let Some(mut reconciler) = slot.checkout() else {
            return;
        };
        spawn_local(async move {
            reconciler.refresh_index_status().await;
            match reconciler.ensure_session().await {
                Ok(SessionOutcome::IndexNotReady) => {
                    log::info!("Chat disabled until documents are prepared");
                }
                Ok(outcome) => log::info!("Chat session ready: {:?}", outcome),
                Err(e) => report(toasts, "Error starting chat session", &e),
            }
            sync_flags(&reconciler);
            slot.restore(reconciler);
        });
    });

    let send = move || {
        let text = draft.get_untracked();
        if text.trim().is_empty() {
            return;
        }
        let Some(mut reconciler) = slot.checkout() else {
            toasts.info("Please wait for the current request to finish");
            return;
        };
        set_draft(String::new());
        set_sending(true);
        spawn_local(async move {
            match reconciler.send_message(&text).await {
                Ok(()) | Err(ChatError::EmptyMessage) => {}
                Err(e @ (ChatError::NoActiveSession | ChatError::IndexNotReady)) => toasts.error(e.user_message()),
                Err(e) => report(toasts, "Error sending message. Please try again.", &e),
            }
            sync_flags(&reconciler);
            slot.restore(reconciler);
            set_sending(false);
        });
    };

    let clear = move |_| {
        if !session_active.get_untracked() || transcript.with_untracked(Transcript::is_empty) {
            toasts.info("No messages to clear.");
            return;
        }
        if !confirm("Are you sure you want to clear the current chat history?") {
            return;
        }
        let Some(mut reconciler) = slot.checkout() else {
            return;
        };
        reconciler.clear_local();
        slot.restore(reconciler);
        set_detail(None);
        toasts.success("Chat history cleared");
    };

    let end = move |_| {
        if !confirm("End this chat session? The conversation will be closed on the server.") {
            return;
        }
        let Some(mut reconciler) = slot.checkout() else {
            return;
        };
        set_detail(None);
        spawn_local(async move {
            if let Err(e) = reconciler.end_session().await {
                log::error!("Error ending chat session: {}", e);
            }
            sync_flags(&reconciler);
            slot.restore(reconciler);
            toasts.info("Chat session ended");
        });
    };

    let export = move |_| {
        let csv = transcript.with_untracked(|t| (!t.is_empty()).then(|| chat_csv(t.messages())));
        let Some(csv) = csv else {
            toasts.info("No messages to export");
            return;
        };
        match download_text(&chat_export_filename(chrono::Utc::now()), &csv, "text/csv;charset=utf-8") {
            Ok(()) => toasts.success("Chat history exported"),
            Err(e) => {
                log::error!("Error exporting chat history: {}", e);
                toasts.error("Error exporting chat history");
            }
        }
    };

    let close_detail = Callback::new(move |_| set_detail(None));

    view! {
        <div class="min-h-screen flex flex-col bg-gray-100 dark:bg-teal-900">
            <PageHeader title="Chat" />
            <div class="container mx-auto p-6 flex-1 flex flex-col space-y-4">
                <div class="flex items-center justify-between">
                    <span class="text-sm text-gray-600 dark:text-gray-400">
                        {move || match (index_ready.get(), session_active.get()) {
                            (None, _) => "Checking documents...",
                            (Some(false), false) => "Documents not prepared",
                            (_, true) => "Session active",
                            (Some(true), false) => "No active session",
                        }}
                    </span>
                    <div class="flex space-x-2">
                        <button class="px-3 py-1 text-sm rounded-md bg-gray-200 dark:bg-teal-700" on:click=export>
                            "Export"
                        </button>
                        <button class="px-3 py-1 text-sm rounded-md bg-gray-200 dark:bg-teal-700" on:click=clear>
                            "Clear"
                        </button>
                        <button
                            class="px-3 py-1 text-sm rounded-md bg-salmon-600 hover:bg-salmon-700 text-white disabled:opacity-50"
                            prop:disabled=move || !session_active.get()
                            on:click=end
                        >
                            "End Session"
                        </button>
                    </div>
                </div>

                <Show when=move || index_ready.get() == Some(false)>
                    <div class="p-3 rounded-md bg-yellow-100 dark:bg-yellow-900 text-yellow-800 dark:text-yellow-200 text-sm">
                        "Chat needs prepared documents. "
                        <a href="/file-management" class="underline">"Go to File Management"</a>
                    </div>
                </Show>

                <div class="flex-1 overflow-y-auto bg-white dark:bg-teal-800 rounded-lg shadow-md p-4 space-y-4">
                    <Show
                        when=move || !transcript.with(Transcript::is_empty)
                        fallback=|| view! {
                            <div class="text-center text-gray-500 dark:text-gray-400 py-12">
                                <h3 class="text-lg">"Start chatting with your documents"</h3>
                                <p class="text-sm">"Ask questions and get AI-powered answers with citations."</p>
                            </div>
                        }
                    >
                        <For
                            each=move || transcript.with(|t| t.messages().to_vec())
                            key=|message| (message.id.clone(), message.content.len(), message.citations.len())
                            children=move |message| view! { <MessageBubble message=message on_cite=set_detail /> }
                        />
                    </Show>
                    <Show when=move || sending.get()>
                        <div class="text-sm text-gray-500 animate-pulse">"Thinking..."</div>
                    </Show>
                </div>

                <div class="flex space-x-2">
                    <textarea
                        class="flex-1 p-2 rounded-md border border-gray-300 dark:border-teal-600 bg-white dark:bg-teal-700 text-gray-800 dark:text-gray-200"
                        rows="2"
                        placeholder="Ask about your documents..."
                        prop:value=draft
                        prop:disabled=move || sending.get() || index_ready.get() != Some(true)
                        on:input=move |ev| set_draft(event_target_value(&ev))
                        on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                            if ev.key() == "Enter" && !ev.shift_key() {
                                ev.prevent_default();
                                send();
                            }
                        }
                    ></textarea>
                    <button
                        class="px-4 py-2 bg-seafoam-600 hover:bg-seafoam-700 text-white rounded-md disabled:bg-gray-400"
                        prop:disabled=move || sending.get() || draft.with(|d| d.trim().is_empty())
                        on:click=move |_| send()
                    >
                        "Send"
                    </button>
                </div>

                {move || {
                    let (message_id, index) = detail.get()?;
                    let citation = transcript.with(|t| cited_detail(t, &message_id, index))?;
                    Some(view! { <CitationDetail citation=citation index=index on_close=close_detail /> })
                }}
            </div>
        </div>
    }
}

fn report(toasts: ToastContext, message: &str, error: &ChatError) {
    log::error!("{}: {}", message, error);
    toasts.error(message.to_string());
}

#[component]
fn MessageBubble(message: ChatMessage, on_cite: WriteSignal<Option<(String, usize)>>) -> impl IntoView {
    let id = message.id.clone();
    let on_select = Callback::new(move |index: usize| on_cite.set(Some((id.clone(), index))));
    let is_user = message.role == Role::User;
    let wrapper = if is_user { "flex justify-end" } else { "flex justify-start" };
    let bubble = format!(
        "max-w-3xl rounded-lg px-4 py-2 {} {}",
        if is_user {
            "bg-seafoam-600 text-white"
        } else {
            "bg-gray-100 dark:bg-teal-700 text-gray-800 dark:text-gray-200"
        },
        if message.is_temporary { "opacity-60" } else { "" }
    );

    let body = if is_user || message.citations.is_empty() {
        view! { <span class="whitespace-pre-wrap">{message.content.clone()}</span> }.into_any()
    } else if uses_spans(&message) {
        view! { <CitedText content=message.content.clone() citations=message.citations.clone() on_select=on_select /> }
            .into_any()
    } else {
        view! {
            <AnswerWithMarkers answer=message.content.clone() citations=message.citations.clone() on_select=on_select />
        }
        .into_any()
    };

    let sources = (!is_user && message.has_citations())
        .then(|| view! { <SourcesList citations=message.citations.clone() on_select=on_select /> });

    view! {
        <div class=wrapper>
            <div class=bubble>
                {body}
                {sources}
                <div class="text-xs opacity-70 mt-1">{message.timestamp.clone()}</div>
            </div>
        </div>
    }
}
