use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection and try again.";
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("not signed in")]
    Unauthorized,
}

impl ApiError {
    // FastAPI puts the reason in `detail`, other handlers use `message`
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["detail", "message"]
                    .iter()
                    .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
            })
            .unwrap_or_default();

        ApiError::Backend { status, message }
    }

    pub fn user_message(&self) -> String {
        match self {
            ApiError::Backend { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            ApiError::Unauthorized => "Please log in to continue.".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}
