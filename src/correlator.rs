//! FIFO request/response correlation with timeout-based eviction.
//!
//! [`Correlator`] keeps the unanswered requests of one connection in arrival
//! order. The next response always answers the oldest pending request. A
//! request waiting longer than the transaction timeout is flushed as an
//! incomplete transaction before newer traffic is correlated, and a response
//! without any pending request is published on its own. Nothing observed on
//! the wire is dropped silently.

use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    time::{Duration, SystemTime},
};

use tracing::debug;

use crate::{
    flow::{Direction, FlowTuple},
    message::{Message, Role},
    publish::Publisher,
    transaction::Transaction,
};

/// Note attached to a request flushed by the transaction timeout.
pub const NOTE_STALE: &str = "transaction timeout: no response received";
/// Note attached to a response without a pending request.
pub const NOTE_ORPHAN: &str = "response without matching request";
/// Note attached to a request evicted because the pending queue was full.
pub const NOTE_OVERFLOW: &str = "pending request queue full: oldest request flushed";

/// Default transaction timeout.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);
/// Default cap on unanswered requests per connection.
pub const DEFAULT_MAX_PENDING_REQUESTS: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(count) => count,
    None => NonZeroUsize::MIN,
};

/// Settings bounding pending correlation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Maximum time a request may wait for its response.
    pub transaction_timeout: Duration,
    /// Maximum number of unanswered requests kept per connection.
    pub max_pending_requests: NonZeroUsize,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
        }
    }
}

/// Per-connection correlation state.
#[derive(Debug)]
pub struct Correlator {
    config: TransactionConfig,
    requests: VecDeque<Message>,
}

impl Correlator {
    /// Create an idle correlator.
    #[must_use]
    pub fn new(config: TransactionConfig) -> Self {
        Self {
            config,
            requests: VecDeque::new(),
        }
    }

    /// Correlate a message received on `tuple` in direction `dir`.
    ///
    /// The message records `dir` and takes ownership of the tuple oriented
    /// from its sender.
    /// Stale requests are flushed first, measured against the timestamp of
    /// the incoming message.
    pub fn on_message(
        &mut self,
        tuple: &FlowTuple,
        dir: Direction,
        mut msg: Message,
        publisher: &Publisher,
    ) {
        msg.direction = dir;
        msg.tuple = Some(tuple.oriented(dir));
        self.expire(msg.ts(), publisher);

        match msg.role() {
            Role::Request => self.on_request(msg, publisher),
            Role::Response => self.on_response(msg, publisher),
        }
    }

    fn on_request(&mut self, msg: Message, publisher: &Publisher) {
        if self.requests.len() >= self.config.max_pending_requests.get()
            && let Some(oldest) = self.requests.pop_front()
        {
            debug!(pending = self.requests.len(), "pending request queue full");
            publisher.on_transaction(Transaction::unanswered(oldest, NOTE_OVERFLOW));
        }
        self.requests.push_back(msg);
    }

    fn on_response(&mut self, msg: Message, publisher: &Publisher) {
        match self.requests.pop_front() {
            Some(requ) => publisher.on_transaction(Transaction::complete(requ, msg)),
            None => {
                debug!(size = msg.size(), "response without pending request");
                publisher.on_transaction(Transaction::orphan(msg, NOTE_ORPHAN));
            }
        }
    }

    /// Flush every pending request whose age at `now` reached the timeout.
    ///
    /// Returns the number of flushed requests.
    pub fn expire(&mut self, now: SystemTime, publisher: &Publisher) -> usize {
        let timeout = self.config.transaction_timeout;
        let mut flushed = 0;

        // Requests are queued in arrival order, so the stale ones sit at the front.
        while let Some(oldest) = self.requests.front() {
            let age = now.duration_since(oldest.ts()).unwrap_or(Duration::ZERO);
            if age < timeout {
                break;
            }
            let Some(stale) = self.requests.pop_front() else {
                break;
            };
            publisher.on_transaction(Transaction::unanswered(stale, NOTE_STALE));
            flushed += 1;
        }

        if flushed > 0 {
            debug!(flushed, "expired pending requests");
        }
        flushed
    }

    /// Publish every pending request as incomplete, tagging it with `reason`.
    ///
    /// Used when the connection is torn down. Returns the number of flushed
    /// requests.
    pub fn flush(&mut self, reason: &str, publisher: &Publisher) -> usize {
        let flushed = self.requests.len();
        for requ in self.requests.drain(..) {
            publisher.on_transaction(Transaction::unanswered(requ, reason));
        }
        flushed
    }

    /// Number of unanswered requests.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.requests.len() }
}
