pub mod citations;
pub mod export;
pub mod reconciler;
pub mod transcript;
pub mod types;

pub use reconciler::{ChatBackend, ChatError, SessionOutcome, SessionReconciler, SessionState};
pub use transcript::Transcript;
pub use types::{ChatMessage, Citation, Role};
