use serde::{Deserialize, Serialize};

use crate::chat::types::{ChatMessage, Citation, Role};

pub const DEFAULT_WORD_LENGTH: u32 = 250;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetPasswordRequest {
    pub username: String,
    pub new_password: String,
}

/// Free-form status payload returned by auth, file and initialize calls.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StatusMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub initialization_status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    NotInitialized,
    Initializing,
    Ready,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChainStatus {
    pub initialized: bool,
    #[serde(default)]
    pub status: Option<IndexState>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AskMode {
    Documents,
    Wikipedia,
    Hybrid,
}

impl AskMode {
    pub fn endpoint(&self) -> &'static str {
        match self {
            AskMode::Documents => "/api/chain/ask_documents",
            AskMode::Wikipedia => "/api/chain/ask_wikipedia",
            AskMode::Hybrid => "/api/chain/ask_rag_agent",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AskMode::Documents => "documents",
            AskMode::Wikipedia => "wikipedia",
            AskMode::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "wikipedia" => AskMode::Wikipedia,
            "hybrid" => AskMode::Hybrid,
            _ => AskMode::Documents,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AskMode::Documents => "Documents",
            AskMode::Wikipedia => "Wikipedia",
            AskMode::Hybrid => "Hybrid",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AskRequest {
    pub question: String,
    pub word_length: u32,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            word_length: DEFAULT_WORD_LENGTH,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatInput {
    pub session_id: String,
    pub message: String,
}

/// One entry of a session's history as the backend stores it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
}

impl HistoryEntry {
    // positional ids keep reloads of an unchanged history stable
    pub fn into_message(self, position: usize) -> ChatMessage {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("msg_{}", position));
        ChatMessage::new(
            id,
            self.role,
            self.content,
            self.timestamp,
            self.citations.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadedFile {
    pub id: i64,
    pub filename: String,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SelectFilesResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub selected_files: Vec<UploadedFile>,
}
