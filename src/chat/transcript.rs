use std::collections::HashMap;

use super::types::{ChatMessage, Citation};

/// Server messages plus at most one in-flight echo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    cited: HashMap<String, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the server's canonical list. Never merges.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        self.clear();
        self.messages = messages.into_iter().filter(|m| !m.is_temporary).collect();
        self.rebuild_index();
    }

    pub fn push(&mut self, message: ChatMessage) {
        if message.has_citations() && !message.is_temporary {
            self.cited.insert(message.id.clone(), self.messages.len());
        }
        self.messages.push(message);
    }

    pub fn push_temporary(&mut self, mut message: ChatMessage) {
        message.is_temporary = true;
        self.messages.push(message);
    }

    pub fn remove_temporary(&mut self) {
        if self.messages.iter().any(|m| m.is_temporary) {
            self.messages.retain(|m| !m.is_temporary);
            self.rebuild_index();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.cited.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages confirmed by the backend, in order.
    pub fn authoritative(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| !m.is_temporary)
    }

    pub fn authoritative_len(&self) -> usize {
        self.authoritative().count()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_temporary(&self) -> bool {
        self.messages.iter().any(|m| m.is_temporary)
    }

    pub fn first(&self) -> Option<&ChatMessage> {
        self.authoritative().next()
    }

    pub fn citations_for(&self, message_id: &str) -> Option<&[Citation]> {
        self.cited
            .get(message_id)
            .and_then(|&pos| self.messages.get(pos))
            .map(|m| m.citations.as_slice())
    }

    /// Without a message id the latest cited assistant message is used.
    pub fn citation(&self, message_id: Option<&str>, index: usize) -> Option<&Citation> {
        let citations = match message_id {
            Some(id) => self.citations_for(id)?,
            None => {
                let pos = self.cited.values().copied().max()?;
                self.messages[pos].citations.as_slice()
            }
        };
        citations.get(index)
    }

    pub fn cited_message_count(&self) -> usize {
        self.cited.len()
    }

    fn rebuild_index(&mut self) {
        self.cited = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.has_citations() && !m.is_temporary)
            .map(|(pos, m)| (m.id.clone(), pos))
            .collect();
    }
}
