use leptos::{prelude::*, task::spawn_local};

use crate::api::types::{AskMode, AskRequest, AskResponse, DEFAULT_WORD_LENGTH};
use crate::api::HttpApi;
use crate::chat::citations::collisions;
use crate::chat::export::{qa_export_filename, qa_report};
use crate::components::browser::{download_text, use_auth_guard};
use crate::components::citation_views::{AnswerWithMarkers, CitationDetail, SourcesList};
use crate::components::dashboard::PageHeader;
use crate::components::toast::use_toasts;
use crate::storage::{BrowserStorage, KeyValueStore, LAST_QUERY};

const WORD_LENGTH_STEP: u32 = 50;
const WORD_LENGTH_MIN: u32 = 50;
const WORD_LENGTH_MAX: u32 = 1000;

fn mode_blurb(mode: AskMode) -> &'static str {
    match mode {
        AskMode::Documents => "Documents Mode - Ask questions about your uploaded files",
        AskMode::Wikipedia => "Wikipedia Mode - Search general knowledge",
        AskMode::Hybrid => "Hybrid Mode - AI will choose the best source for your question",
    }
}

fn needs_index(mode: AskMode) -> bool {
    !matches!(mode, AskMode::Wikipedia)
}

#[derive(Clone)]
struct Answered {
    question: String,
    mode: AskMode,
    response: AskResponse,
    seconds: f64,
}

#[component]
pub fn QueryInterfacePage() -> impl IntoView {
    use_auth_guard();
    let toasts = use_toasts();

    let (index_ready, set_index_ready) = signal(false);
    let (mode, set_mode) = signal(Option::<AskMode>::None);
    let (question, set_question) = signal(String::new());
    let (word_length, set_word_length) = signal(DEFAULT_WORD_LENGTH);
    let (asking, set_asking) = signal(false);
    let (answer, set_answer) = signal(Option::<Answered>::None);
    let (detail, set_detail) = signal(Option::<usize>::None);

    Effect::new(move |_| {
        if let Some(last) = BrowserStorage.get(LAST_QUERY) {
            set_question(last);
        }
        spawn_local(async move {
            // a failed status check leaves the document modes locked
            let ready = match <HttpApi>::default().chain_status().await {
                Ok(status) => status.initialized,
                Err(e) => {
                    log::error!("Error checking RAG status: {}", e);
                    false
                }
            };
            set_index_ready(ready);
        });
    });

    let pick_mode = move |picked: AskMode| {
        if needs_index(picked) && !index_ready.get_untracked() {
            toasts.warning("Please initialize RAG system first");
            return;
        }
        set_mode(Some(picked));
    };

    let reset_mode = move |_| {
        set_mode(None);
        set_answer(None);
        set_detail(None);
    };

    let ask = move || {
        let Some(current_mode) = mode.get_untracked() else {
            return;
        };
        let text = question.get_untracked().trim().to_string();
        if text.is_empty() {
            toasts.error("Please enter a question");
            return;
        }
        let request = AskRequest {
            question: text.clone(),
            word_length: word_length.get_untracked(),
        };

        set_asking(true);
        set_detail(None);
        spawn_local(async move {
            let started = chrono::Utc::now();
            match <HttpApi>::default().ask(current_mode, &request).await {
                Ok(response) => {
                    let elapsed = chrono::Utc::now() - started;
                    for collision in collisions(&response.citations) {
                        log::warn!(
                            "Marker [{}] names citation {} by source_id and citation {} by position",
                            collision.number,
                            collision.by_source_id,
                            collision.by_position
                        );
                    }
                    set_answer(Some(Answered {
                        question: text,
                        mode: current_mode,
                        response,
                        seconds: elapsed.num_milliseconds() as f64 / 1000.0,
                    }));
                    toasts.success("Answer ready! Click citation numbers for details.");
                }
                Err(e) => {
                    log::error!("Error asking question: {}", e);
                    toasts.error("Failed to get answer. Please try again.");
                }
            }
            set_asking(false);
        });
    };

    let export = move |_| {
        let Some(answered) = answer.get_untracked() else {
            toasts.error("No answer to export");
            return;
        };
        let report = qa_report(
            &answered.question,
            &answered.response.answer,
            &answered.response.citations,
            answered.mode,
            chrono::Local::now(),
        );
        let filename = qa_export_filename(&answered.question, answered.mode, chrono::Utc::now());
        match download_text(&filename, &report, "text/plain;charset=utf-8") {
            Ok(()) => toasts.success("Q&A exported with full citation details!"),
            Err(e) => {
                log::error!("Export failed: {}", e);
                toasts.error("Failed to export Q&A");
            }
        }
    };

    let select_citation = Callback::new(move |index: usize| set_detail(Some(index)));
    let close_detail = Callback::new(move |_| set_detail(None));

    let mode_button = move |option: AskMode| {
        let locked = move || needs_index(option) && !index_ready.get();
        view! {
            <button
                class="flex-1 p-4 rounded-lg border border-gray-300 dark:border-teal-600 text-left hover:border-seafoam-500 transition-colors"
                class=("opacity-50", locked)
                on:click=move |_| pick_mode(option)
            >
                <div class="font-semibold text-gray-800 dark:text-gray-200">{option.display_name()}</div>
                <div class="text-xs text-gray-600 dark:text-gray-400">{mode_blurb(option)}</div>
                <div class="text-xs mt-1">
                    {move || if locked() { "Not Available" } else { "Ready" }}
                </div>
            </button>
        }
    };

    view! {
        <div class="min-h-screen bg-gray-100 dark:bg-teal-900">
            <PageHeader title="Ask a Question" />
            <div class="container mx-auto p-6 space-y-6">
                <Show when=move || !index_ready.get()>
                    <div class="p-3 rounded-md bg-yellow-100 dark:bg-yellow-900 text-yellow-800 dark:text-yellow-200 text-sm">
                        "Documents are not prepared yet. Prepare them on the file management page to ask about your files."
                    </div>
                </Show>

                {move || match mode.get() {
                    None => view! {
                        <div class="flex flex-col md:flex-row gap-4">
                            {mode_button(AskMode::Documents)}
                            {mode_button(AskMode::Wikipedia)}
                            {mode_button(AskMode::Hybrid)}
                        </div>
                    }
                    .into_any(),
                    Some(current) => view! {
                        <div class="bg-white dark:bg-teal-800 rounded-lg shadow-md p-6 space-y-4">
                            <div class="flex items-center justify-between">
                                <span class="text-gray-700 dark:text-gray-300">{mode_blurb(current)}</span>
                                <button class="text-sm text-seafoam-600 hover:underline" on:click=reset_mode>
                                    "Change mode"
                                </button>
                            </div>
                            <textarea
                                class="w-full p-2 rounded-md border border-gray-300 dark:border-teal-600 bg-white dark:bg-teal-700 text-gray-800 dark:text-gray-200"
                                rows="3"
                                placeholder="Type your question here..."
                                prop:value=question
                                prop:disabled=asking
                                on:input=move |ev| {
                                    let value = event_target_value(&ev);
                                    BrowserStorage.set(LAST_QUERY, &value);
                                    set_question(value);
                                }
                                on:keydown=move |ev: leptos::ev::KeyboardEvent| {
                                    if ev.key() == "Enter" && !ev.shift_key() {
                                        ev.prevent_default();
                                        ask();
                                    }
                                }
                            ></textarea>
                            <div class="flex items-center justify-between">
                                <div class="flex items-center space-x-2 text-sm text-gray-700 dark:text-gray-300">
                                    <span>"Answer length (words):"</span>
                                    <button
                                        class="px-2 rounded bg-gray-200 dark:bg-teal-700"
                                        on:click=move |_| set_word_length.update(|w| *w = w.saturating_sub(WORD_LENGTH_STEP).max(WORD_LENGTH_MIN))
                                    >
                                        "-"
                                    </button>
                                    <span>{word_length}</span>
                                    <button
                                        class="px-2 rounded bg-gray-200 dark:bg-teal-700"
                                        on:click=move |_| set_word_length.update(|w| *w = (*w + WORD_LENGTH_STEP).min(WORD_LENGTH_MAX))
                                    >
                                        "+"
                                    </button>
                                </div>
                                <button
                                    class="px-4 py-2 bg-seafoam-600 hover:bg-seafoam-700 text-white rounded-md disabled:bg-gray-400"
                                    prop:disabled=asking
                                    on:click=move |_| ask()
                                >
                                    {move || if asking.get() { "Thinking..." } else { "Ask" }}
                                </button>
                            </div>
                        </div>
                    }
                    .into_any(),
                }}

                {move || answer.get().map(|answered| {
                    let citations = answered.response.citations.clone();
                    let has_sources = !citations.is_empty();
                    view! {
                        <div class="bg-white dark:bg-teal-800 rounded-lg shadow-md p-6">
                            <div class="flex items-center justify-between mb-3">
                                <h2 class="text-lg font-semibold text-gray-800 dark:text-gray-200">"Answer"</h2>
                                <div class="flex items-center space-x-4">
                                    <span class="text-xs text-gray-500">
                                        {format!("Response time: {:.1}s", answered.seconds)}
                                    </span>
                                    <button class="text-sm text-seafoam-600 hover:underline" on:click=export>
                                        "Export"
                                    </button>
                                </div>
                            </div>
                            <div class="text-gray-800 dark:text-gray-200">
                                <AnswerWithMarkers
                                    answer=answered.response.answer.clone()
                                    citations=citations.clone()
                                    on_select=select_citation
                                />
                            </div>
                            {has_sources.then(|| view! {
                                <SourcesList citations=citations.clone() on_select=select_citation />
                            })}
                        </div>
                    }
                })}

                {move || {
                    let index = detail.get()?;
                    let citation = answer.with(|a| a.as_ref().and_then(|a| a.response.citations.get(index).cloned()))?;
                    Some(view! { <CitationDetail citation=citation index=index on_close=close_detail /> })
                }}
            </div>
        </div>
    }
}
