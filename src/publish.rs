//! Transaction publisher.
//!
//! [`Publisher`] turns a [`Transaction`] into an [`Event`] and forwards it to
//! the [`EventSink`] injected at construction. Publishing never fails: any
//! field that cannot be rendered faithfully is replaced by a best effort
//! value and explained in the event notes.

use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Serialize, Serializer};

use crate::{
    flow::Endpoint,
    message::Message,
    metrics,
    transaction::Transaction,
};

/// Outcome classification of a published transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    /// Both sides observed and well formed.
    #[serde(rename = "OK")]
    Ok,
    /// Both sides observed but at least one failed framing.
    Error,
    /// Only one side was observed.
    Incomplete,
}

impl Status {
    /// Label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "Error",
            Status::Incomplete => "Incomplete",
        }
    }
}

/// Endpoint as rendered into an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndpointRecord {
    /// IP address in textual form.
    pub ip: String,
    /// Transport port.
    pub port: u16,
    /// Process label resolved by the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
}

impl From<&Endpoint> for EndpointRecord {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            ip: endpoint.addr.ip().to_string(),
            port: endpoint.addr.port(),
            process: endpoint.process.as_deref().map(str::to_owned),
        }
    }
}

/// Structured record emitted for each published transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Timestamp of the transaction, serialised as Unix milliseconds.
    #[serde(serialize_with = "serialize_epoch_millis")]
    pub timestamp: SystemTime,
    /// Protocol tag.
    #[serde(rename = "type")]
    pub protocol: String,
    /// Outcome classification.
    pub status: Status,
    /// Response time in milliseconds; absent for incomplete transactions.
    #[serde(rename = "responsetime", skip_serializing_if = "Option::is_none")]
    pub response_time: Option<i64>,
    /// Bytes consumed by the request.
    pub bytes_in: u64,
    /// Bytes consumed by the response.
    pub bytes_out: u64,
    /// Client side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<EndpointRecord>,
    /// Server side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<EndpointRecord>,
    /// Parsing and correlation diagnostics.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Raw request content, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Raw response content, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

fn serialize_epoch_millis<S>(ts: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let millis = ts
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX));
    serializer.serialize_u64(millis)
}

/// Destination for published events.
pub trait EventSink: Send + Sync {
    /// Forward one event.
    fn publish(&self, event: Event);
}

impl<F> EventSink for F
where
    F: Fn(Event) + Send + Sync,
{
    fn publish(&self, event: Event) { self(event); }
}

/// Maps transactions to events and forwards them to the sink.
#[derive(Clone)]
pub struct Publisher {
    protocol: String,
    send_request: bool,
    send_response: bool,
    sink: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("protocol", &self.protocol)
            .field("send_request", &self.send_request)
            .field("send_response", &self.send_response)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Publisher {
    /// Create a publisher tagging events with `protocol` and no sink.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            send_request: false,
            send_response: false,
            sink: None,
        }
    }

    /// Include raw request content in events.
    #[must_use]
    pub fn send_request(mut self, enabled: bool) -> Self {
        self.send_request = enabled;
        self
    }

    /// Include raw response content in events.
    #[must_use]
    pub fn send_response(mut self, enabled: bool) -> Self {
        self.send_response = enabled;
        self
    }

    /// Install the sink receiving events.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Whether events are forwarded anywhere.
    #[must_use]
    pub fn has_sink(&self) -> bool { self.sink.is_some() }

    /// Publish a transaction. Without a sink this is a no-op.
    pub fn on_transaction(&self, transaction: Transaction) {
        let Some(sink) = &self.sink else {
            return;
        };
        let event = self.create_event(&transaction);
        metrics::inc_transactions(event.status);
        sink.publish(event);
    }

    /// Render a transaction as an event.
    #[must_use]
    pub fn create_event(&self, transaction: &Transaction) -> Event {
        let requ = transaction.request();
        let resp = transaction.response();
        let mut notes = transaction.notes().to_vec();

        let status = match (requ, resp) {
            (Some(requ), Some(resp)) if requ.is_failed() || resp.is_failed() => Status::Error,
            (Some(_), Some(_)) => Status::Ok,
            _ => Status::Incomplete,
        };

        let response_time = match (requ, resp) {
            (Some(requ), Some(resp)) => response_time_ms(requ.ts(), resp.ts(), &mut notes),
            _ => None,
        };

        // Endpoints are reported in the flow's forward orientation.
        let tuple = match (requ, resp) {
            (Some(requ), _) => requ.tuple().cloned(),
            (None, Some(resp)) => resp.tuple().map(|t| t.oriented(resp.direction())),
            (None, None) => None,
        };
        if tuple.is_none() {
            notes.push("flow tuple unavailable".to_owned());
        }

        if transaction.ts() < UNIX_EPOCH {
            notes.push("timestamp precedes the unix epoch".to_owned());
        }

        let request = match requ {
            Some(requ) if self.send_request => Some(render_content("request", requ, &mut notes)),
            _ => None,
        };
        let response = match resp {
            Some(resp) if self.send_response => Some(render_content("response", resp, &mut notes)),
            _ => None,
        };

        Event {
            timestamp: transaction.ts(),
            protocol: self.protocol.clone(),
            status,
            response_time,
            bytes_in: requ.map_or(0, |m| m.size() as u64),
            bytes_out: resp.map_or(0, |m| m.size() as u64),
            src: tuple.as_ref().map(|t| EndpointRecord::from(&t.src)),
            dst: tuple.as_ref().map(|t| EndpointRecord::from(&t.dst)),
            notes,
            request,
            response,
        }
    }
}

fn response_time_ms(requ: SystemTime, resp: SystemTime, notes: &mut Vec<String>) -> Option<i64> {
    let (elapsed, negative) = match resp.duration_since(requ) {
        Ok(elapsed) => (elapsed, false),
        Err(err) => (err.duration(), true),
    };
    let Ok(millis) = i64::try_from(elapsed.as_millis()) else {
        notes.push("response time overflows milliseconds".to_owned());
        return None;
    };
    if negative {
        notes.push("response timestamp precedes request".to_owned());
        return Some(-millis);
    }
    Some(millis)
}

fn render_content(side: &str, msg: &Message, notes: &mut Vec<String>) -> String {
    match std::str::from_utf8(msg.content()) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            notes.push(format!("{side} content is not valid UTF-8"));
            String::from_utf8_lossy(msg.content()).into_owned()
        }
    }
}
