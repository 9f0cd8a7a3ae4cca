use thiserror::Error;

use super::transcript::Transcript;
use super::types::{client_message_id, ChatMessage, Role};
use crate::api::types::{ChainStatus, ChatInput, ChatResponse, HistoryEntry};
use crate::api::ApiError;
use crate::storage::{KeyValueStore, CHAT_SESSION_ID, RAG_INITIALIZED};

/// The slice of the backend API the reconciler depends on.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn chain_status(&self) -> Result<ChainStatus, ApiError>;
    async fn start_chat(&self) -> Result<ChatResponse, ApiError>;
    async fn send_chat_message(&self, input: &ChatInput) -> Result<ChatResponse, ApiError>;
    async fn chat_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError>;
    async fn end_chat(&self, session_id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("message is empty")]
    EmptyMessage,
    #[error("no active chat session")]
    NoActiveSession,
    #[error("documents are not ready for chat yet")]
    IndexNotReady,
    #[error("backend did not return a session id")]
    InvalidSessionResponse,
    #[error("a message is already being sent")]
    SendInFlight,
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Api(e) => e.user_message(),
            ChatError::NoActiveSession => "Error: No active chat session".to_string(),
            ChatError::IndexNotReady => {
                "Documents are not ready yet. Prepare them from File Management first.".to_string()
            }
            ChatError::InvalidSessionResponse => {
                "Could not start a chat session. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A new session was started on the backend.
    Created,
    /// A stored session id was confirmed by its history.
    Resumed,
    /// The retrieval index is not initialized; chat stays disabled.
    IndexNotReady,
    /// The stored session had no valid history and was discarded.
    Stale,
}

/// A message echoed locally and awaiting the backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    session_id: String,
    message: String,
}

impl PendingSend {
    pub fn input(&self) -> ChatInput {
        ChatInput {
            session_id: self.session_id.clone(),
            message: self.message.clone(),
        }
    }
}

type Observer = Box<dyn Fn(&Transcript)>;

/// Opening line of the backend's session greeting.
const GREETING_PREFIX: &str = "Hello! I'm ready to help";

pub struct SessionReconciler<B, S> {
    backend: B,
    store: S,
    transcript: Transcript,
    session: SessionState,
    index_initialized: Option<bool>,
    sending: bool,
    observer: Option<Observer>,
}

impl<B: ChatBackend, S: KeyValueStore> SessionReconciler<B, S> {
    pub fn new(backend: B, store: S) -> Self {
        Self {
            backend,
            store,
            transcript: Transcript::new(),
            session: SessionState::NoSession,
            index_initialized: None,
            sending: false,
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: impl Fn(&Transcript) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.session {
            SessionState::Active(id) => Some(id),
            SessionState::NoSession => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.session, SessionState::Active(_))
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn index_initialized(&self) -> Option<bool> {
        self.index_initialized
    }

    pub fn set_index_initialized(&mut self, initialized: bool) {
        self.index_initialized = Some(initialized);
        self.store.set(RAG_INITIALIZED, &initialized.to_string());
    }

    /// Fetch the retrieval index status. Failures count as "not initialized".
    pub async fn refresh_index_status(&mut self) -> bool {
        let initialized = match self.backend.chain_status().await {
            Ok(status) => status.initialized,
            Err(e) => {
                log::error!("Error checking RAG status: {}", e);
                false
            }
        };
        self.set_index_initialized(initialized);
        initialized
    }

    pub async fn ensure_session(&mut self) -> Result<SessionOutcome, ChatError> {
        if let Some(session_id) = self.stored_session_id() {
            log::info!("Found existing chat session: {}", session_id);
            self.session = SessionState::Active(session_id.clone());
            return Ok(self.load_history_for(&session_id).await);
        }

        let initialized = match self.index_initialized {
            Some(initialized) => initialized,
            None => self.refresh_index_status().await,
        };
        if !initialized {
            log::info!("RAG not initialized, skipping session creation");
            self.store.remove(CHAT_SESSION_ID);
            return Ok(SessionOutcome::IndexNotReady);
        }

        self.start_session().await
    }

    pub async fn load_history(&mut self) -> SessionOutcome {
        match self.session_id().map(str::to_owned).or_else(|| self.stored_session_id()) {
            Some(session_id) => self.load_history_for(&session_id).await,
            None => {
                log::info!("No session ID found, starting fresh chat");
                self.drop_session()
            }
        }
    }

    pub async fn load_history_for(&mut self, session_id: &str) -> SessionOutcome {
        match self.backend.chat_history(session_id).await {
            Ok(entries) if !entries.is_empty() => {
                let messages = self.without_duplicate_greeting(entries);
                self.transcript.replace(messages);
                self.session = SessionState::Active(session_id.to_string());
                log::info!(
                    "Chat history loaded: {} messages",
                    self.transcript.authoritative_len()
                );
                self.notify();
                SessionOutcome::Resumed
            }
            Ok(_) => {
                log::info!("No valid history found for session {}", session_id);
                self.drop_session()
            }
            Err(e) => {
                log::warn!("Error loading chat history for {}: {}", session_id, e);
                self.drop_session()
            }
        }
    }

    pub async fn send_message(&mut self, text: &str) -> Result<(), ChatError> {
        if !self.is_active() {
            let initialized = match self.index_initialized {
                Some(initialized) => initialized,
                None => self.refresh_index_status().await,
            };
            if !initialized {
                return Err(ChatError::IndexNotReady);
            }
            self.start_session().await?;
        }

        let pending = self.stage_message(text)?;
        let result = self.backend.send_chat_message(&pending.input()).await;
        self.settle_message(pending, result)
    }

    /// First phase of a send: draw the temporary echo.
    pub fn stage_message(&mut self, text: &str) -> Result<PendingSend, ChatError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.sending {
            return Err(ChatError::SendInFlight);
        }
        let session_id = self
            .session_id()
            .map(str::to_owned)
            .ok_or(ChatError::NoActiveSession)?;

        self.sending = true;
        self.transcript
            .push_temporary(ChatMessage::temporary(message.to_string()));
        self.notify();

        Ok(PendingSend {
            session_id,
            message: message.to_string(),
        })
    }

    /// Second phase of a send. Rolls back to the untouched transcript on failure.
    pub fn settle_message(
        &mut self,
        pending: PendingSend,
        result: Result<ChatResponse, ApiError>,
    ) -> Result<(), ChatError> {
        self.sending = false;
        self.transcript.remove_temporary();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::error!("Error sending message: {}", e);
                self.notify();
                return Err(e.into());
            }
        };

        if let Some(rotated) = response
            .session_id
            .filter(|id| !id.is_empty() && *id != pending.session_id)
        {
            log::info!("Updating session ID to: {}", rotated);
            self.store.set(CHAT_SESSION_ID, &rotated);
            self.session = SessionState::Active(rotated);
        }

        match response.history {
            Some(history) => self.transcript.replace(into_messages(history)),
            None => log::warn!("Message response carried no history; transcript left as is"),
        }
        self.notify();

        Ok(())
    }

    /// Best-effort backend teardown followed by unconditional local cleanup.
    pub async fn end_session(&mut self) -> Result<(), ChatError> {
        let session_id = self
            .session_id()
            .map(str::to_owned)
            .or_else(|| self.stored_session_id());

        match session_id {
            Some(session_id) => {
                if let Err(e) = self.backend.end_chat(&session_id).await {
                    log::warn!("Failed to end chat session {} on the backend: {}", session_id, e);
                }
            }
            None => log::info!("No active session to end"),
        }

        self.store.remove(CHAT_SESSION_ID);
        self.session = SessionState::NoSession;
        self.transcript.clear();
        self.notify();
        Ok(())
    }

    pub fn clear_local(&mut self) {
        self.transcript.clear();
        self.notify();
    }

    async fn start_session(&mut self) -> Result<SessionOutcome, ChatError> {
        log::info!("Creating new chat session...");
        let response = self.backend.start_chat().await?;

        let session_id = response
            .session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ChatError::InvalidSessionResponse)?;
        self.store.set(CHAT_SESSION_ID, &session_id);
        log::info!("Chat session created: {}", session_id);

        match response.history {
            Some(history) if !history.is_empty() => {
                self.transcript.replace(into_messages(history));
            }
            _ => {
                let greeting = response.answer.filter(|a| !a.is_empty()).map(|answer| {
                    ChatMessage::new(
                        client_message_id(),
                        Role::Assistant,
                        answer,
                        None,
                        response.citations,
                    )
                });
                self.transcript.replace(greeting.into_iter().collect());
            }
        }
        self.session = SessionState::Active(session_id);
        self.notify();

        Ok(SessionOutcome::Created)
    }

    // A leading greeting is dropped when the local transcript already holds
    // messages that did not start with that same greeting.
    fn without_duplicate_greeting(&self, entries: Vec<HistoryEntry>) -> Vec<ChatMessage> {
        let mut messages = into_messages(entries);

        let drop_greeting = match (self.transcript.first(), messages.first()) {
            (Some(local), Some(incoming)) => {
                incoming.role == Role::Assistant
                    && incoming.citations.is_empty()
                    && incoming.content.contains(GREETING_PREFIX)
                    && !(local.role == incoming.role && local.content == incoming.content)
            }
            _ => false,
        };
        if drop_greeting {
            log::debug!("Skipping duplicate greeting in reloaded history");
            messages.remove(0);
        }

        messages
    }

    fn drop_session(&mut self) -> SessionOutcome {
        self.store.remove(CHAT_SESSION_ID);
        self.session = SessionState::NoSession;
        self.transcript.clear();
        self.notify();
        SessionOutcome::Stale
    }

    fn stored_session_id(&self) -> Option<String> {
        self.store.get(CHAT_SESSION_ID).filter(|id| !id.is_empty())
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer(&self.transcript);
        }
    }
}

fn into_messages(entries: Vec<HistoryEntry>) -> Vec<ChatMessage> {
    entries
        .into_iter()
        .enumerate()
        .map(|(position, entry)| entry.into_message(position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::citations::{resolve_markers, AnswerSegment};
    use crate::chat::types::Citation;
    use crate::storage::MemoryStore;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Script {
        initialized: Cell<bool>,
        status_fails: Cell<bool>,
        starts: RefCell<VecDeque<Result<ChatResponse, ApiError>>>,
        replies: RefCell<VecDeque<Result<ChatResponse, ApiError>>>,
        histories: RefCell<VecDeque<Result<Vec<HistoryEntry>, ApiError>>>,
        end_fails: Cell<bool>,
        sent: RefCell<Vec<(String, String)>>,
        ended: RefCell<Vec<String>>,
        start_calls: Cell<usize>,
    }

    #[derive(Clone, Default)]
    struct ScriptedBackend(Rc<Script>);

    impl ChatBackend for ScriptedBackend {
        async fn chain_status(&self) -> Result<ChainStatus, ApiError> {
            if self.0.status_fails.get() {
                return Err(ApiError::Network("offline".to_string()));
            }
            Ok(ChainStatus {
                initialized: self.0.initialized.get(),
                status: None,
                message: None,
            })
        }

        async fn start_chat(&self) -> Result<ChatResponse, ApiError> {
            self.0.start_calls.set(self.0.start_calls.get() + 1);
            self.0
                .starts
                .borrow_mut()
                .pop_front()
                .expect("unexpected start_chat call")
        }

        async fn send_chat_message(&self, input: &ChatInput) -> Result<ChatResponse, ApiError> {
            self.0
                .sent
                .borrow_mut()
                .push((input.session_id.clone(), input.message.clone()));
            self.0
                .replies
                .borrow_mut()
                .pop_front()
                .expect("unexpected send_chat_message call")
        }

        async fn chat_history(&self, _session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
            self.0
                .histories
                .borrow_mut()
                .pop_front()
                .expect("unexpected chat_history call")
        }

        async fn end_chat(&self, session_id: &str) -> Result<(), ApiError> {
            self.0.ended.borrow_mut().push(session_id.to_string());
            if self.0.end_fails.get() {
                Err(ApiError::Network("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn entry(role: Role, content: &str, citations: Option<Vec<Citation>>) -> HistoryEntry {
        HistoryEntry {
            id: None,
            role,
            content: content.to_string(),
            timestamp: Some("2024-05-01T10:00:00".to_string()),
            citations,
        }
    }

    fn doc_citation(id: i64) -> Citation {
        Citation {
            source_id: Some(id),
            source: Some("doc.pdf".to_string()),
            page_content: Some("...".to_string()),
            ..Default::default()
        }
    }

    fn reply(session_id: &str, history: Vec<HistoryEntry>) -> ChatResponse {
        ChatResponse {
            session_id: Some(session_id.to_string()),
            answer: history.last().map(|e| e.content.clone()),
            citations: Vec::new(),
            history: Some(history),
        }
    }

    fn setup() -> (
        SessionReconciler<ScriptedBackend, MemoryStore>,
        Rc<Script>,
        MemoryStore,
    ) {
        let backend = ScriptedBackend::default();
        let script = backend.0.clone();
        let store = MemoryStore::new();
        (SessionReconciler::new(backend, store.clone()), script, store)
    }

    fn active(session_id: &str) -> (
        SessionReconciler<ScriptedBackend, MemoryStore>,
        Rc<Script>,
        MemoryStore,
    ) {
        let (mut reconciler, script, store) = setup();
        store.set(CHAT_SESSION_ID, session_id);
        reconciler.session = SessionState::Active(session_id.to_string());
        reconciler.index_initialized = Some(true);
        (reconciler, script, store)
    }

    fn contents(reconciler: &SessionReconciler<ScriptedBackend, MemoryStore>) -> Vec<(Role, String)> {
        reconciler
            .transcript()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect()
    }

    mod session_lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_creates_session_and_renders_greeting() {
            let (mut reconciler, script, store) = setup();
            script.initialized.set(true);
            script.starts.borrow_mut().push_back(Ok(ChatResponse {
                session_id: Some("s1".to_string()),
                answer: Some("Hello!".to_string()),
                citations: Vec::new(),
                history: None,
            }));

            let outcome = reconciler.ensure_session().await.unwrap();

            assert_eq!(outcome, SessionOutcome::Created);
            assert_eq!(store.get(CHAT_SESSION_ID).as_deref(), Some("s1"));
            assert_eq!(reconciler.session(), &SessionState::Active("s1".to_string()));
            assert_eq!(contents(&reconciler), vec![(Role::Assistant, "Hello!".to_string())]);
            assert_eq!(store.get(RAG_INITIALIZED).as_deref(), Some("true"));
        }

        #[tokio::test]
        async fn test_start_with_empty_history_still_shows_greeting() {
            let (mut reconciler, script, _store) = setup();
            script.initialized.set(true);
            script.starts.borrow_mut().push_back(Ok(ChatResponse {
                session_id: Some("s1".to_string()),
                answer: Some("Hello! I'm ready to help you with your documents.".to_string()),
                citations: Vec::new(),
                history: Some(Vec::new()),
            }));

            reconciler.ensure_session().await.unwrap();
            assert_eq!(reconciler.transcript().messages().len(), 1);
        }

        #[tokio::test]
        async fn test_index_not_ready_creates_nothing() {
            let (mut reconciler, script, store) = setup();
            script.initialized.set(false);

            let outcome = reconciler.ensure_session().await.unwrap();

            assert_eq!(outcome, SessionOutcome::IndexNotReady);
            assert_eq!(script.start_calls.get(), 0);
            assert!(store.get(CHAT_SESSION_ID).is_none());
            assert!(!reconciler.is_active());
        }

        #[tokio::test]
        async fn test_status_failure_counts_as_not_ready() {
            let (mut reconciler, script, _store) = setup();
            script.status_fails.set(true);

            let outcome = reconciler.ensure_session().await.unwrap();
            assert_eq!(outcome, SessionOutcome::IndexNotReady);
            assert_eq!(reconciler.index_initialized(), Some(false));
        }

        #[tokio::test]
        async fn test_failed_creation_stores_nothing() {
            let (mut reconciler, script, store) = setup();
            script.initialized.set(true);
            script.starts.borrow_mut().push_back(Err(ApiError::Backend {
                status: 500,
                message: String::new(),
            }));
            script.starts.borrow_mut().push_back(Ok(ChatResponse {
                session_id: Some("  ".to_string()),
                ..Default::default()
            }));

            let first = reconciler.ensure_session().await;
            assert!(matches!(first, Err(ChatError::Api(ApiError::Backend { status: 500, .. }))));

            let second = reconciler.ensure_session().await;
            assert!(matches!(second, Err(ChatError::InvalidSessionResponse)));

            assert!(store.get(CHAT_SESSION_ID).is_none());
            assert!(!reconciler.is_active());
        }

        #[tokio::test]
        async fn test_stored_session_resumes_from_history() {
            let (mut reconciler, script, store) = setup();
            store.set(CHAT_SESSION_ID, "s9");
            script.histories.borrow_mut().push_back(Ok(vec![
                entry(Role::User, "What is X?", None),
                entry(Role::Assistant, "X is Y [0].", Some(vec![doc_citation(0)])),
            ]));

            let outcome = reconciler.ensure_session().await.unwrap();

            assert_eq!(outcome, SessionOutcome::Resumed);
            assert_eq!(reconciler.session_id(), Some("s9"));
            assert_eq!(reconciler.transcript().messages().len(), 2);
            assert_eq!(reconciler.transcript().cited_message_count(), 1);
            assert_eq!(script.start_calls.get(), 0);
        }

        #[tokio::test]
        async fn test_empty_history_discards_stored_session() {
            let (mut reconciler, script, store) = setup();
            store.set(CHAT_SESSION_ID, "old");
            script.histories.borrow_mut().push_back(Ok(Vec::new()));

            let outcome = reconciler.ensure_session().await.unwrap();

            assert_eq!(outcome, SessionOutcome::Stale);
            assert!(store.get(CHAT_SESSION_ID).is_none());
            assert_eq!(reconciler.session(), &SessionState::NoSession);
            assert!(reconciler.transcript().is_empty());
        }

        #[tokio::test]
        async fn test_history_failure_discards_stored_session() {
            let (mut reconciler, script, store) = active("old");
            script.histories.borrow_mut().push_back(Err(ApiError::Backend {
                status: 404,
                message: "Chat session not found".to_string(),
            }));

            assert_eq!(reconciler.load_history().await, SessionOutcome::Stale);
            assert!(store.get(CHAT_SESSION_ID).is_none());
            assert!(!reconciler.is_active());
        }

        #[tokio::test]
        async fn test_end_session_cleans_up_even_when_backend_fails() {
            let (mut reconciler, script, store) = active("s1");
            script.end_fails.set(true);
            reconciler.transcript.replace(vec![entry(Role::User, "hi", None).into_message(0)]);

            reconciler.end_session().await.unwrap();

            assert_eq!(script.ended.borrow().as_slice(), ["s1".to_string()]);
            assert!(store.get(CHAT_SESSION_ID).is_none());
            assert_eq!(reconciler.session(), &SessionState::NoSession);
            assert!(reconciler.transcript().is_empty());
        }

        #[tokio::test]
        async fn test_clear_local_keeps_session() {
            let (mut reconciler, script, store) = active("s1");
            reconciler.transcript.replace(vec![entry(Role::User, "hi", None).into_message(0)]);

            reconciler.clear_local();

            assert!(reconciler.transcript().is_empty());
            assert_eq!(reconciler.session_id(), Some("s1"));
            assert_eq!(store.get(CHAT_SESSION_ID).as_deref(), Some("s1"));
            assert!(script.ended.borrow().is_empty());
        }
    }

    mod history_tests {
        use super::*;

        #[tokio::test]
        async fn test_load_history_is_idempotent() {
            let (mut reconciler, script, _store) = active("s1");
            let history = vec![
                entry(Role::Assistant, "Hello! I'm ready to help.", None),
                entry(Role::User, "What is X?", None),
                entry(Role::Assistant, "X is Y [1].", Some(vec![doc_citation(1)])),
            ];
            script.histories.borrow_mut().push_back(Ok(history.clone()));
            script.histories.borrow_mut().push_back(Ok(history));

            reconciler.load_history().await;
            let first = reconciler.transcript().clone();
            reconciler.load_history().await;

            assert_eq!(reconciler.transcript(), &first);
            assert_eq!(first.messages().len(), 3);
        }

        #[tokio::test]
        async fn test_greeting_dropped_when_transcript_already_populated() {
            let (mut reconciler, script, _store) = active("s1");
            reconciler
                .transcript
                .replace(vec![entry(Role::User, "earlier question", None).into_message(0)]);
            script.histories.borrow_mut().push_back(Ok(vec![
                entry(Role::Assistant, "Hello! I'm ready to help.", None),
                entry(Role::User, "earlier question", None),
            ]));

            reconciler.load_history().await;

            assert_eq!(contents(&reconciler), vec![(Role::User, "earlier question".to_string())]);
        }

        #[tokio::test]
        async fn test_uncited_first_answer_is_kept() {
            let (mut reconciler, script, _store) = active("s1");
            reconciler
                .transcript
                .replace(vec![entry(Role::User, "stale local question", None).into_message(0)]);
            script.histories.borrow_mut().push_back(Ok(vec![
                entry(Role::Assistant, "Nothing in your documents covers that.", None),
                entry(Role::User, "q", None),
            ]));

            reconciler.load_history().await;

            assert_eq!(
                contents(&reconciler),
                vec![
                    (Role::Assistant, "Nothing in your documents covers that.".to_string()),
                    (Role::User, "q".to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_cited_first_message_is_not_a_greeting() {
            let (mut reconciler, script, _store) = active("s1");
            reconciler
                .transcript
                .replace(vec![entry(Role::User, "q", None).into_message(0)]);
            script.histories.borrow_mut().push_back(Ok(vec![entry(
                Role::Assistant,
                "Answer [0]",
                Some(vec![doc_citation(0)]),
            )]));

            reconciler.load_history().await;
            assert_eq!(reconciler.transcript().messages().len(), 1);
        }
    }

    mod send_tests {
        use super::*;

        #[tokio::test]
        async fn test_transcript_equals_history_after_each_send() {
            let (mut reconciler, script, _store) = active("s1");
            let first = vec![
                entry(Role::User, "one", None),
                entry(Role::Assistant, "reply one", None),
            ];
            let mut second = first.clone();
            second.push(entry(Role::User, "two", None));
            second.push(entry(Role::Assistant, "reply two [1]", Some(vec![doc_citation(1)])));
            script.replies.borrow_mut().push_back(Ok(reply("s1", first.clone())));
            script.replies.borrow_mut().push_back(Ok(reply("s1", second.clone())));

            for (text, history) in [("one", first), ("two", second)] {
                reconciler.send_message(text).await.unwrap();

                let expected: Vec<ChatMessage> = into_messages(history);
                assert_eq!(reconciler.transcript().messages(), expected.as_slice());
                assert!(!reconciler.transcript().has_temporary());
            }
            assert_eq!(
                script.sent.borrow().as_slice(),
                [("s1".to_string(), "one".to_string()), ("s1".to_string(), "two".to_string())]
            );
        }

        #[tokio::test]
        async fn test_observer_sees_temporary_echo() {
            let (mut reconciler, script, _store) = active("s1");
            let seen: Rc<RefCell<Vec<(usize, bool)>>> = Rc::default();
            let sink = seen.clone();
            reconciler.set_observer(move |t| sink.borrow_mut().push((t.messages().len(), t.has_temporary())));
            script.replies.borrow_mut().push_back(Ok(reply(
                "s1",
                vec![entry(Role::User, "hi", None), entry(Role::Assistant, "hello", None)],
            )));

            reconciler.send_message("  hi  ").await.unwrap();

            assert_eq!(seen.borrow().as_slice(), [(1, true), (2, false)]);
            assert_eq!(script.sent.borrow()[0].1, "hi");
        }

        #[tokio::test]
        async fn test_failed_send_rolls_back_echo() {
            let (mut reconciler, script, _store) = active("s1");
            let before = vec![entry(Role::Assistant, "Hello!", None).into_message(0)];
            reconciler.transcript.replace(before.clone());
            script
                .replies
                .borrow_mut()
                .push_back(Err(ApiError::Network("Failed to fetch".to_string())));

            let result = reconciler.send_message("will fail").await;

            assert!(matches!(result, Err(ChatError::Api(ApiError::Network(_)))));
            assert_eq!(reconciler.transcript().messages(), before.as_slice());
            assert!(!reconciler.is_sending());
        }

        #[tokio::test]
        async fn test_rotated_session_id_is_stored() {
            let (mut reconciler, script, store) = active("s1");
            script.replies.borrow_mut().push_back(Ok(reply(
                "s2",
                vec![entry(Role::User, "hi", None), entry(Role::Assistant, "hello", None)],
            )));

            reconciler.send_message("hi").await.unwrap();

            assert_eq!(store.get(CHAT_SESSION_ID).as_deref(), Some("s2"));
            assert_eq!(reconciler.session_id(), Some("s2"));
        }

        #[tokio::test]
        async fn test_send_without_session_starts_one() {
            let (mut reconciler, script, store) = setup();
            script.initialized.set(true);
            script.starts.borrow_mut().push_back(Ok(ChatResponse {
                session_id: Some("s1".to_string()),
                answer: Some("Hello!".to_string()),
                ..Default::default()
            }));
            script.replies.borrow_mut().push_back(Ok(reply(
                "s1",
                vec![entry(Role::User, "hi", None), entry(Role::Assistant, "hello", None)],
            )));

            reconciler.send_message("hi").await.unwrap();

            assert_eq!(store.get(CHAT_SESSION_ID).as_deref(), Some("s1"));
            assert_eq!(reconciler.transcript().messages().len(), 2);
        }

        #[tokio::test]
        async fn test_send_refused_when_index_not_ready() {
            let (mut reconciler, script, _store) = setup();
            script.initialized.set(false);

            let result = reconciler.send_message("hi").await;
            assert!(matches!(result, Err(ChatError::IndexNotReady)));
            assert!(script.sent.borrow().is_empty());
        }

        #[test]
        fn test_stage_guards() {
            let (mut reconciler, _script, _store) = setup();
            assert!(matches!(reconciler.stage_message("   "), Err(ChatError::EmptyMessage)));
            assert!(matches!(reconciler.stage_message("hi"), Err(ChatError::NoActiveSession)));

            reconciler.session = SessionState::Active("s1".to_string());
            let pending = reconciler.stage_message("hi").unwrap();
            assert!(matches!(reconciler.stage_message("again"), Err(ChatError::SendInFlight)));
            assert_eq!(reconciler.transcript().messages().len(), 1);

            reconciler
                .settle_message(pending, Err(ApiError::Network("x".to_string())))
                .unwrap_err();
            assert!(reconciler.transcript().is_empty());
        }

        #[tokio::test]
        async fn test_answer_marker_resolves_to_single_citation() {
            let (mut reconciler, script, _store) = active("s1");
            let citation = doc_citation(1);
            script.replies.borrow_mut().push_back(Ok(ChatResponse {
                session_id: Some("s1".to_string()),
                answer: Some("X is Y [1].".to_string()),
                citations: vec![citation.clone()],
                history: Some(vec![
                    entry(Role::User, "What is X?", None),
                    entry(Role::Assistant, "X is Y [1].", Some(vec![citation])),
                ]),
            }));

            reconciler.send_message("What is X?").await.unwrap();

            let assistant = &reconciler.transcript().messages()[1];
            let segments = resolve_markers(&assistant.content, &assistant.citations);
            assert!(segments.iter().any(|s| matches!(
                s,
                AnswerSegment::Marker { number: 1, citation_index: 0, .. }
            )));
            let resolved = reconciler.transcript().citation(Some(assistant.id.as_str()), 0).unwrap();
            assert_eq!(resolved.source.as_deref(), Some("doc.pdf"));
        }
    }
}
