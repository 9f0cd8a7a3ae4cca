use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character offsets into the content of the message a citation belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

/// Page locators arrive either as numbers or as strings ("64", "N/A").
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PageRef {
    Number(i64),
    Text(String),
}

impl PageRef {
    /// `None` for the backend's "N/A" placeholder and blank labels.
    pub fn label(&self) -> Option<String> {
        match self {
            PageRef::Number(n) => Some(n.to_string()),
            PageRef::Text(s) if s.trim().is_empty() || s == "N/A" => None,
            PageRef::Text(s) => Some(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Document,
    Web,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_label: Option<PageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_span: Option<TextSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Citation {
    pub fn source_kind(&self) -> SourceKind {
        match self.source.as_deref() {
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => SourceKind::Web,
            _ => SourceKind::Document,
        }
    }

    /// Number shown to the user: the backend's `source_id`, else the 1-based position.
    pub fn display_number(&self, index: usize) -> i64 {
        self.source_id.unwrap_or(index as i64 + 1)
    }

    pub fn display_name(&self) -> String {
        let Some(source) = self.source.as_deref().filter(|s| !s.is_empty()) else {
            return "Unknown Source".to_string();
        };

        match self.source_kind() {
            SourceKind::Web => {
                let title = source
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or(source)
                    .replace('_', " ");
                urlencoding::decode(&title)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or(title)
            }
            SourceKind::Document => file_name(source).to_string(),
        }
    }

    /// Page label preferred over the raw page index, with "N/A" treated as absent.
    pub fn page_display(&self) -> Option<String> {
        self.page_label
            .as_ref()
            .and_then(PageRef::label)
            .or_else(|| self.page.as_ref().and_then(PageRef::label))
    }
}

/// Last component of a filesystem-style path, splitting on both separators.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().filter(|s| !s.is_empty()).unwrap_or(path)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub is_temporary: bool,
}

impl ChatMessage {
    pub fn new(id: String, role: Role, content: String, timestamp: Option<String>, citations: Vec<Citation>) -> Self {
        // only assistant messages carry citations
        let citations = if role == Role::Assistant { citations } else { Vec::new() };

        Self {
            id,
            role,
            content,
            timestamp: timestamp
                .filter(|t| !t.is_empty())
                .unwrap_or_else(now_iso),
            citations,
            is_temporary: false,
        }
    }

    pub fn temporary(content: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: format!("temp_{}", now.timestamp_millis()),
            role: Role::User,
            content,
            timestamp: now.to_rfc3339(),
            citations: Vec::new(),
            is_temporary: true,
        }
    }

    pub fn has_citations(&self) -> bool {
        self.role == Role::Assistant && !self.citations.is_empty()
    }
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Random, timestamp-prefixed id for messages the client creates itself.
pub fn client_message_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("msg_{}_{}", chrono::Utc::now().timestamp_millis(), &suffix[..9])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str) -> Citation {
        Citation {
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_kind_from_scheme() {
        assert_eq!(doc("https://en.wikipedia.org/wiki/Rust").source_kind(), SourceKind::Web);
        assert_eq!(doc("http://example.com/a").source_kind(), SourceKind::Web);
        assert_eq!(doc("/srv/uploads/birds.pdf").source_kind(), SourceKind::Document);
        assert_eq!(Citation::default().source_kind(), SourceKind::Document);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            doc("https://en.wikipedia.org/wiki/Common_Myna").display_name(),
            "Common Myna"
        );
        assert_eq!(
            doc("https://en.wikipedia.org/wiki/Caf%C3%A9").display_name(),
            "Café"
        );
        assert_eq!(doc("c:\\Users\\me\\100Birds.pdf").display_name(), "100Birds.pdf");
        assert_eq!(doc("/srv/uploads/report.pdf").display_name(), "report.pdf");
        assert_eq!(Citation::default().display_name(), "Unknown Source");
    }

    #[test]
    fn test_display_number_falls_back_to_position() {
        let with_id = Citation { source_id: Some(7), ..Default::default() };
        assert_eq!(with_id.display_number(0), 7);
        assert_eq!(Citation::default().display_number(2), 3);
    }

    #[test]
    fn test_page_display_skips_placeholder() {
        let json = r#"{"source_id": 1, "page": 63, "page_label": "64", "source": "a.pdf"}"#;
        let citation: Citation = serde_json::from_str(json).unwrap();
        assert_eq!(citation.page_display().as_deref(), Some("64"));

        let json = r#"{"source_id": 1, "page": "N/A", "page_label": "N/A"}"#;
        let citation: Citation = serde_json::from_str(json).unwrap();
        assert_eq!(citation.page_display(), None);
    }

    #[test]
    fn test_user_messages_drop_citations() {
        let msg = ChatMessage::new(
            "m1".to_string(),
            Role::User,
            "hi".to_string(),
            None,
            vec![doc("a.pdf")],
        );
        assert!(msg.citations.is_empty());
        assert!(!msg.timestamp.is_empty());
    }

    #[test]
    fn test_temporary_message_is_flagged() {
        let msg = ChatMessage::temporary("pending".to_string());
        assert!(msg.is_temporary);
        assert!(msg.id.starts_with("temp_"));
        assert_eq!(msg.role, Role::User);
    }
}
