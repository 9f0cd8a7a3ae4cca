use chrono::{DateTime, Local, Utc};

use super::types::{file_name, ChatMessage, Citation, PageRef, SourceKind};
use crate::api::types::AskMode;

const RULE_WIDE: usize = 60;
const RULE_NARROW: usize = 40;

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// CSV with a `Role,Message,Timestamp,Citations` header. Temporary echoes are left out.
pub fn chat_csv(messages: &[ChatMessage]) -> String {
    let mut csv = String::from("Role,Message,Timestamp,Citations\n");

    for message in messages.iter().filter(|m| !m.is_temporary) {
        let citations = message
            .citations
            .iter()
            .map(|c| c.source.as_deref().map(last_segment).unwrap_or("Unknown"))
            .collect::<Vec<_>>()
            .join(", ");

        csv.push_str(&format!(
            "{},{},{},{}\n",
            quoted(message.role.as_str()),
            quoted(&message.content),
            quoted(&message.timestamp),
            quoted(&citations)
        ));
    }

    csv
}

fn last_segment(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}

pub fn chat_export_filename(at: DateTime<Utc>) -> String {
    format!("chat-export-{}.csv", at.timestamp_millis())
}

pub fn qa_report(
    question: &str,
    answer: &str,
    citations: &[Citation],
    mode: AskMode,
    generated_at: DateTime<Local>,
) -> String {
    let stamp = generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string();
    let mut out = String::new();

    out.push_str("Advanced RAG System - Q&A Export\n");
    out.push_str(&format!("Generated on: {}\n", stamp));
    out.push_str(&format!("Mode: {}\n", mode.display_name()));
    out.push_str(&format!("{}\n\n", "=".repeat(RULE_WIDE)));
    out.push_str(&format!("QUESTION:\n{}\n\n", question));
    out.push_str(&format!("ANSWER:\n{}\n\n", answer));

    if !citations.is_empty() {
        out.push_str(&format!("SOURCES & CITATIONS ({} total):\n", citations.len()));
        out.push_str(&format!("{}\n\n", "=".repeat(RULE_NARROW)));

        out.push_str("DOCUMENTS USED:\n");
        let mut seen: Vec<&str> = Vec::new();
        for source in citations.iter().filter_map(|c| c.source.as_deref()) {
            if source.is_empty() || seen.contains(&source) {
                continue;
            }
            seen.push(source);
            let n = seen.len();
            if source.starts_with("http") {
                out.push_str(&format!("{}. Wikipedia Article: {}\n", n, source));
            } else {
                out.push_str(&format!("{}. Document: {}\n", n, file_name(source)));
                out.push_str(&format!("   Full Path: {}\n", source));
            }
        }
        out.push('\n');

        out.push_str("DETAILED CITATIONS:\n");
        for (index, citation) in citations.iter().enumerate() {
            out.push_str(&format!("[{}] ", index));
            match citation.source.as_deref().filter(|s| !s.is_empty()) {
                Some(source) if citation.source_kind() == SourceKind::Web => {
                    out.push_str("Source: Wikipedia Article\n");
                    out.push_str(&format!("   URL: {}\n", source));
                }
                Some(source) => {
                    out.push_str(&format!("Source: {}\n", file_name(source)));
                    if let Some(page) = citation.page_label.as_ref().and_then(PageRef::label) {
                        out.push_str(&format!("   Page: {}\n", page));
                    }
                    out.push_str(&format!("   File Path: {}\n", source));
                }
                None => out.push_str("Source: Unknown\n"),
            }
            if let Some(content) = citation.page_content.as_deref().filter(|c| !c.is_empty()) {
                out.push_str("   Content:\n");
                out.push_str(&format!("   \"{}\"\n", content));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!("\n{}\n", "=".repeat(RULE_WIDE)));
    out.push_str(&format!("Export completed at: {}\n", stamp));
    out.push_str("Advanced RAG System - Document Analysis & Q&A\n");

    out
}

/// `QA_{Mode}_{first 30 chars of the question}_{yyyymmddThhmm}.txt`
pub fn qa_export_filename(question: &str, mode: AskMode, at: DateTime<Utc>) -> String {
    let preview: String = question
        .chars()
        .take(30)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "QA_{}_{}_{}.txt",
        mode.display_name(),
        preview,
        at.format("%Y%m%dT%H%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Role;
    use chrono::TimeZone;

    fn message(role: Role, content: &str, citations: Vec<Citation>) -> ChatMessage {
        ChatMessage::new(
            "m".to_string(),
            role,
            content.to_string(),
            Some("2024-05-01T10:00:00".to_string()),
            citations,
        )
    }

    fn cite(source: Option<&str>) -> Citation {
        Citation {
            source: source.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_chat_csv_escapes_and_lists_sources() {
        let mut messages = vec![
            message(Role::User, "He said \"hi\"", vec![]),
            message(
                Role::Assistant,
                "Answer, with comma",
                vec![cite(Some("/data/uploads/a.pdf")), cite(None)],
            ),
        ];
        messages.push(ChatMessage::temporary("pending".to_string()));

        let csv = chat_csv(&messages);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Role,Message,Timestamp,Citations");
        assert_eq!(lines[1], r#""user","He said ""hi""","2024-05-01T10:00:00","""#);
        assert_eq!(
            lines[2],
            r#""assistant","Answer, with comma","2024-05-01T10:00:00","a.pdf, Unknown""#
        );
    }

    #[test]
    fn test_qa_report_sections() {
        let citations = vec![
            Citation {
                source: Some("C:\\docs\\report.pdf".to_string()),
                page_label: Some(PageRef::Text("3".to_string())),
                page_content: Some("Birds fly.".to_string()),
                ..Default::default()
            },
            cite(Some("https://en.wikipedia.org/wiki/Bird")),
            Citation {
                source: Some("C:\\docs\\report.pdf".to_string()),
                ..Default::default()
            },
            cite(None),
        ];
        let at = Local.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap();

        let report = qa_report("Do birds fly?", "Yes [1].", &citations, AskMode::Hybrid, at);

        assert!(report.starts_with("Advanced RAG System - Q&A Export\nGenerated on: 5/1/2024, 2:05:09 PM\nMode: Hybrid\n"));
        assert!(report.contains("QUESTION:\nDo birds fly?\n\nANSWER:\nYes [1].\n\n"));
        assert!(report.contains("SOURCES & CITATIONS (4 total):"));
        assert!(report.contains(
            "DOCUMENTS USED:\n1. Document: report.pdf\n   Full Path: C:\\docs\\report.pdf\n2. Wikipedia Article: https://en.wikipedia.org/wiki/Bird\n\n"
        ));
        assert!(report.contains("[0] Source: report.pdf\n   Page: 3\n"));
        assert!(report.contains("   Content:\n   \"Birds fly.\"\n"));
        assert!(report.contains("[1] Source: Wikipedia Article\n   URL: https://en.wikipedia.org/wiki/Bird\n"));
        assert!(report.contains("[3] Source: Unknown\n"));
        assert!(report.ends_with("Advanced RAG System - Document Analysis & Q&A\n"));
    }

    #[test]
    fn test_qa_report_without_citations() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let report = qa_report("q", "a", &[], AskMode::Documents, at);
        assert!(!report.contains("SOURCES & CITATIONS"));
        assert!(report.contains("Mode: Documents"));
    }

    #[test]
    fn test_filenames() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 0).unwrap();
        assert_eq!(
            qa_export_filename("What is X? (really)", AskMode::Wikipedia, at),
            "QA_Wikipedia_What_is_X___really__20240501T1405.txt"
        );
        assert_eq!(chat_export_filename(at), format!("chat-export-{}.csv", at.timestamp_millis()));
    }
}
