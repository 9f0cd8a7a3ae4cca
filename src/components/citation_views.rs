use leptos::prelude::*;

use crate::chat::citations::{embed_spans, resolve_markers, AnswerSegment, SpanSegment};
use crate::chat::types::{Citation, SourceKind};

/// Message text with `text_span` citations wrapped in clickable runs.
#[component]
pub fn CitedText(content: String, citations: Vec<Citation>, on_select: Callback<usize>) -> impl IntoView {
    embed_spans(&content, &citations)
        .into_iter()
        .map(|segment| match segment {
            SpanSegment::Text(text) => view! { <span>{text}</span> }.into_any(),
            SpanSegment::Cited {
                text,
                citation_index,
                marker,
            } => view! {
                <span
                    class="bg-seafoam-100 dark:bg-teal-600 rounded px-0.5 cursor-pointer"
                    on:click=move |_| on_select.run(citation_index)
                >
                    {text}
                    <sup class="text-seafoam-600 dark:text-aqua-400 ml-0.5">{format!("[{}]", marker)}</sup>
                </span>
            }
            .into_any(),
        })
        .collect_view()
}

/// Free-form answer text with `[n]` markers bound to their citations.
#[component]
pub fn AnswerWithMarkers(answer: String, citations: Vec<Citation>, on_select: Callback<usize>) -> impl IntoView {
    resolve_markers(&answer, &citations)
        .into_iter()
        .map(|segment| match segment {
            AnswerSegment::Text(text) => view! { <span class="whitespace-pre-wrap">{text}</span> }.into_any(),
            AnswerSegment::Marker { raw, citation_index, .. } => view! {
                <sup
                    class="text-seafoam-600 dark:text-aqua-400 cursor-pointer hover:underline"
                    on:click=move |_| on_select.run(citation_index)
                >
                    {raw}
                </sup>
            }
            .into_any(),
            AnswerSegment::Missing { raw, .. } => view! {
                <sup class="text-gray-400 line-through" title="Citation not found">{raw}</sup>
            }
            .into_any(),
        })
        .collect_view()
}

#[component]
pub fn SourcesList(citations: Vec<Citation>, on_select: Callback<usize>) -> impl IntoView {
    let count = citations.len();
    let items = citations
        .into_iter()
        .enumerate()
        .map(|(index, citation)| {
            let label = match citation.page_display() {
                Some(page) => format!("[{}] {} (p. {})", citation.display_number(index), citation.display_name(), page),
                None => format!("[{}] {}", citation.display_number(index), citation.display_name()),
            };
            view! {
                <li>
                    <button
                        class="text-left text-xs text-seafoam-600 dark:text-aqua-400 hover:underline"
                        on:click=move |_| on_select.run(index)
                    >
                        {label}
                    </button>
                </li>
            }
        })
        .collect_view();

    view! {
        <div class="mt-3 pt-3 border-t border-gray-300 dark:border-teal-600">
            <div class="text-sm font-medium text-gray-600 dark:text-gray-300 mb-2">
                {format!("Sources ({}):", count)}
            </div>
            <ul class="space-y-1">{items}</ul>
        </div>
    }
}

/// Modal with everything known about one citation.
#[component]
pub fn CitationDetail(citation: Citation, index: usize, on_close: Callback<()>) -> impl IntoView {
    let kind = citation.source_kind();
    let source = citation.source.clone().unwrap_or_default();
    let content = citation
        .page_content
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "No content available".to_string());

    view! {
        <div class="fixed inset-0 bg-black/50 z-40" on:click=move |_| on_close.run(())></div>
        <div class="fixed z-50 top-1/2 left-1/2 -translate-x-1/2 -translate-y-1/2 w-full max-w-2xl bg-white dark:bg-teal-800 rounded-lg shadow-xl p-6">
            <div class="flex justify-between items-start mb-4">
                <h3 class="text-lg font-semibold text-gray-800 dark:text-gray-200">
                    {format!("[{}] {}", citation.display_number(index), citation.display_name())}
                </h3>
                <button class="text-gray-500 hover:text-gray-700" on:click=move |_| on_close.run(())>"x"</button>
            </div>
            <div class="text-sm text-gray-600 dark:text-gray-400 space-y-1 mb-4">
                {match kind {
                    SourceKind::Web => view! {
                        <div>
                            "Wikipedia Article: "
                            <a href=source.clone() target="_blank" rel="noopener noreferrer" class="text-seafoam-600 hover:underline">
                                {source.clone()}
                            </a>
                        </div>
                    }
                    .into_any(),
                    SourceKind::Document => view! { <div>{format!("Document: {}", source)}</div> }.into_any(),
                }}
                {citation.page_display().map(|page| view! { <div>{format!("Page: {}", page)}</div> })}
                {citation.error.clone().map(|e| view! { <div class="text-salmon-600">{e}</div> })}
            </div>
            <blockquote class="max-h-80 overflow-y-auto whitespace-pre-wrap text-sm text-gray-800 dark:text-gray-200 border-l-4 border-seafoam-500 pl-3">
                {content}
            </blockquote>
        </div>
    }
}
