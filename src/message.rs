//! Parsed protocol units.

use std::time::SystemTime;

use bytes::Bytes;

use crate::flow::{Direction, FlowTuple};

/// Role of a message within a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Opens a transaction.
    Request,
    /// Answers the oldest pending request.
    Response,
}

impl Role {
    /// Lower-case label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Request => "request",
            Role::Response => "response",
        }
    }
}

/// One framed protocol unit.
///
/// A message is built by the parser and handed over to the correlator,
/// which attaches the flow tuple. It is not modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub(crate) ts: SystemTime,
    pub(crate) size: usize,
    pub(crate) direction: Direction,
    pub(crate) role: Role,
    pub(crate) content: Bytes,
    pub(crate) complete: bool,
    pub(crate) failed: bool,
    pub(crate) notes: Vec<String>,
    pub(crate) tuple: Option<FlowTuple>,
}

impl Message {
    pub(crate) fn new(ts: SystemTime, role: Role) -> Self {
        Self {
            ts,
            size: 0,
            direction: match role {
                Role::Request => Direction::Forward,
                Role::Response => Direction::Reverse,
            },
            role,
            content: Bytes::new(),
            complete: false,
            failed: false,
            notes: Vec::new(),
            tuple: None,
        }
    }

    /// Timestamp of the packet that started this unit.
    #[must_use]
    pub fn ts(&self) -> SystemTime { self.ts }

    /// Raw stream bytes consumed, including markers and delimiter.
    #[must_use]
    pub fn size(&self) -> usize { self.size }

    /// Direction of travel. Implied by the role until the correlator records
    /// the direction the unit was observed on.
    #[must_use]
    pub fn direction(&self) -> Direction { self.direction }

    /// Request or response.
    #[must_use]
    pub fn role(&self) -> Role { self.role }

    /// Whether this message opens a transaction.
    #[must_use]
    pub fn is_request(&self) -> bool { self.role == Role::Request }

    /// Body bytes without framing markers or delimiter.
    #[must_use]
    pub fn content(&self) -> &Bytes { &self.content }

    /// Whether the unit was fully framed.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.complete }

    /// Whether the framing marker was invalid.
    #[must_use]
    pub fn is_failed(&self) -> bool { self.failed }

    /// Diagnostic notes gathered while parsing.
    #[must_use]
    pub fn notes(&self) -> &[String] { &self.notes }

    /// Flow tuple oriented from the sender, once attached by the correlator.
    #[must_use]
    pub fn tuple(&self) -> Option<&FlowTuple> { self.tuple.as_ref() }
}
