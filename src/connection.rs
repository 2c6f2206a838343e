//! Per-flow analyzer state.
//!
//! A [`Connection`] owns one [`Stream`] per direction and a single
//! [`Correlator`]. It is stored by the host between packets as an opaque
//! [`FlowState`] and is only ever touched by the worker handling that flow.

use std::{any::Any, fmt, sync::Arc, time::SystemTime};

use crate::{
    correlator::{Correlator, TransactionConfig},
    error::Result,
    flow::{Direction, FlowTuple, Packet},
    metrics,
    parser::{Parser, ParserConfig},
    publish::Publisher,
};

/// Immutable settings snapshot shared by every connection of an analyzer.
#[derive(Debug)]
pub struct Settings {
    /// Parser settings.
    pub parser: Arc<ParserConfig>,
    /// Correlator settings.
    pub transactions: TransactionConfig,
    /// Event publisher.
    pub publisher: Publisher,
}

/// Parsing state for one direction of a connection.
#[derive(Debug)]
pub struct Stream {
    parser: Parser,
}

impl Stream {
    fn new(config: Arc<ParserConfig>) -> Self {
        Self {
            parser: Parser::new(config),
        }
    }

    /// Bytes of the unit currently being framed.
    #[must_use]
    pub fn buffered(&self) -> usize { self.parser.buffered() }
}

/// Application-layer state of one tracked flow.
#[derive(Debug)]
pub struct Connection {
    streams: [Option<Stream>; 2],
    correlator: Correlator,
    settings: Arc<Settings>,
}

impl Connection {
    /// Create a connection bound to a settings snapshot.
    #[must_use]
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            streams: [None, None],
            correlator: Correlator::new(settings.transactions),
            settings,
        }
    }

    /// Feed a payload chunk travelling in `dir`.
    ///
    /// The stream for `dir` is created on first use. Completed messages are
    /// correlated and published before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error when the stream can no longer be framed; the caller
    /// must then [`drop_with`](Self::drop_with) the connection.
    pub fn feed(&mut self, packet: &Packet<'_>, tuple: &FlowTuple, dir: Direction) -> Result<()> {
        let Self {
            streams,
            correlator,
            settings,
        } = self;
        let stream =
            streams[dir.index()].get_or_insert_with(|| Stream::new(Arc::clone(&settings.parser)));
        let publisher = &settings.publisher;

        stream.parser.feed(packet.ts, packet.payload, |msg| {
            metrics::inc_messages(msg.role());
            correlator.on_message(tuple, dir, msg, publisher);
        })?;
        Ok(())
    }

    /// Flush requests whose transaction timeout elapsed at `now`.
    pub fn expire(&mut self, now: SystemTime) -> usize {
        self.correlator.expire(now, &self.settings.publisher)
    }

    /// Tear the connection down: publish every pending request as incomplete
    /// with `reason` as a note and release all stream buffers.
    pub fn drop_with(&mut self, reason: &str) -> usize {
        let flushed = self.correlator.flush(reason, &self.settings.publisher);
        for stream in self.streams.iter_mut().filter_map(Option::as_mut) {
            stream.parser.clear();
        }
        self.streams = [None, None];
        flushed
    }

    /// Stream state for `dir`, if any payload was seen in that direction.
    #[must_use]
    pub fn stream(&self, dir: Direction) -> Option<&Stream> { self.streams[dir.index()].as_ref() }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.correlator.pending_len() }

    /// Settings snapshot this connection was created with.
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> { &self.settings }
}

/// Opaque per-flow handle stored by the host between packets.
///
/// The host keeps the value verbatim and hands it back with the next packet
/// of the same flow. Only the analyzer that created it can look inside.
pub struct FlowState(Box<dyn Any + Send>);

impl fmt::Debug for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("FlowState(..)") }
}

impl FlowState {
    /// Wrap analyzer state.
    #[must_use]
    pub fn new<T: Any + Send>(state: T) -> Self { Self(Box::new(state)) }

    pub(crate) fn from_connection(conn: Box<Connection>) -> Self { Self(conn) }

    /// Recover the connection, or give the handle back if it holds
    /// something else.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when the state is not a [`Connection`].
    pub fn into_connection(self) -> std::result::Result<Box<Connection>, Self> {
        self.0.downcast::<Connection>().map_err(Self)
    }

    /// Borrow the connection, if this handle holds one.
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> { self.0.downcast_ref::<Connection>() }
}
