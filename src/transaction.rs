//! Correlated request/response pairs.

use std::time::SystemTime;

use crate::message::Message;

/// A request paired with its response, or one side flushed on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    request: Option<Message>,
    response: Option<Message>,
    ts: SystemTime,
    notes: Vec<String>,
}

impl Transaction {
    /// Pair a request with the response answering it.
    #[must_use]
    pub fn complete(request: Message, response: Message) -> Self {
        let notes = request
            .notes()
            .iter()
            .chain(response.notes())
            .cloned()
            .collect();
        Self {
            ts: request.ts(),
            request: Some(request),
            response: Some(response),
            notes,
        }
    }

    /// Report a request that never received a response.
    #[must_use]
    pub fn unanswered(request: Message, note: impl Into<String>) -> Self {
        let mut notes = request.notes().to_vec();
        notes.push(note.into());
        Self {
            ts: request.ts(),
            request: Some(request),
            response: None,
            notes,
        }
    }

    /// Report a response that arrived without a pending request.
    #[must_use]
    pub fn orphan(response: Message, note: impl Into<String>) -> Self {
        let mut notes = response.notes().to_vec();
        notes.push(note.into());
        Self {
            ts: response.ts(),
            request: None,
            response: Some(response),
            notes,
        }
    }

    /// Request side, if observed.
    #[must_use]
    pub fn request(&self) -> Option<&Message> { self.request.as_ref() }

    /// Response side, if observed.
    #[must_use]
    pub fn response(&self) -> Option<&Message> { self.response.as_ref() }

    /// Timestamp of the earliest observed side.
    #[must_use]
    pub fn ts(&self) -> SystemTime { self.ts }

    /// Notes merged from both sides plus correlation diagnostics.
    #[must_use]
    pub fn notes(&self) -> &[String] { &self.notes }

    /// Whether both sides were observed.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.request.is_some() && self.response.is_some() }
}
