//! Metric helpers for `flowframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::{message::Role, publish::Status};

/// Name of the counter tracking framed messages.
pub const MESSAGES_PARSED: &str = "flowframe_messages_parsed_total";
/// Name of the counter tracking published transactions.
pub const TRANSACTIONS_PUBLISHED: &str = "flowframe_transactions_published_total";
/// Name of the counter tracking connections the analyzer dropped after a
/// parse failure or a stream gap. Host-driven teardown is not counted.
pub const CONNECTIONS_DROPPED: &str = "flowframe_connections_dropped_total";

/// Record a framed message for the given role.
pub fn inc_messages(role: Role) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_PARSED, "role" => role.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = role;
}

/// Record a published transaction for the given status.
pub fn inc_transactions(status: Status) {
    #[cfg(feature = "metrics")]
    counter!(TRANSACTIONS_PUBLISHED, "status" => status.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = status;
}

/// Record a connection dropped by the analyzer.
pub fn inc_dropped() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTIONS_DROPPED).increment(1);
}
