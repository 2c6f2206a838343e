//! Host-facing analyzer entry points.
//!
//! [`TcpAnalyzer`] is the contract a packet-capture host drives: one call per
//! reassembled payload chunk plus lifecycle notifications. [`Analyzer`]
//! implements it on top of [`Connection`], keeping the parser and
//! correlator state inside the opaque [`FlowState`] the host stores for each
//! flow.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use log::warn;

use crate::{
    config::{AnalyzerConfig, ConfigError},
    connection::{Connection, FlowState, Settings},
    error::Result,
    flow::{Direction, FlowTuple, Packet},
    metrics,
    publish::{EventSink, Publisher},
};

/// Note attached to requests flushed because of a gap in the stream.
pub const NOTE_GAP: &str = "connection dropped: gap in stream";
/// Note attached to requests flushed because the host lost the connection.
pub const NOTE_LOST: &str = "connection lost";
/// Note attached to requests of a state handed to the wrong analyzer.
pub const NOTE_FOREIGN: &str = "connection state belongs to another analyzer";

/// Contract between a TCP stream host and an application-layer analyzer.
///
/// Every method is synchronous and must return promptly. The host
/// guarantees that calls for one flow are never made concurrently.
pub trait TcpAnalyzer: Send + Sync {
    /// Ports whose traffic should be routed to this analyzer.
    fn ports(&self) -> &[u16];

    /// Idle timeout the host should apply to flows; zero selects the host
    /// default.
    fn connection_timeout(&self) -> Duration;

    /// Process one payload chunk.
    ///
    /// # Errors
    ///
    /// Returns an error when the flow can no longer be analysed. Pending
    /// transactions have already been flushed and the host must discard the
    /// flow state.
    fn parse(
        &self,
        packet: &Packet<'_>,
        tuple: &FlowTuple,
        dir: Direction,
        state: Option<FlowState>,
    ) -> Result<FlowState>;

    /// Handle a FIN in `dir`.
    fn received_fin(
        &self,
        tuple: &FlowTuple,
        dir: Direction,
        state: Option<FlowState>,
    ) -> Option<FlowState>;

    /// Handle `nbytes` missing from the stream in `dir`.
    ///
    /// Returns the state to keep and whether the flow should be dropped.
    fn gap_in_stream(
        &self,
        tuple: &FlowTuple,
        dir: Direction,
        nbytes: usize,
        state: Option<FlowState>,
    ) -> (Option<FlowState>, bool);

    /// Handle the host expiring or losing the flow.
    fn connection_lost(&self, tuple: &FlowTuple, state: Option<FlowState>);

    /// Flush transactions that timed out at `now`.
    fn expire(&self, now: SystemTime, state: Option<FlowState>) -> Option<FlowState> {
        let _ = now;
        state
    }
}

/// Analyzer for the line-oriented reference protocol.
#[derive(Debug)]
pub struct Analyzer {
    ports: Vec<u16>,
    settings: Arc<Settings>,
}

impl Analyzer {
    /// Build an analyzer from a validated configuration.
    ///
    /// Without a sink, transactions are still correlated but events are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn new(
        config: &AnalyzerConfig,
        sink: Option<Arc<dyn EventSink>>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let mut publisher = Publisher::new(config.protocol.clone())
            .send_request(config.send_request)
            .send_response(config.send_response);
        if let Some(sink) = sink {
            publisher = publisher.with_sink(sink);
        }

        let settings = Settings {
            parser: Arc::new(config.parser_config()?),
            transactions: config.transaction_config()?,
            publisher,
        };

        Ok(Self {
            ports: config.ports.clone(),
            settings: Arc::new(settings),
        })
    }

    /// Settings snapshot handed to new connections.
    #[must_use]
    pub fn settings(&self) -> &Arc<Settings> { &self.settings }

    fn new_connection(&self) -> Box<Connection> {
        Box::new(Connection::new(Arc::clone(&self.settings)))
    }

    fn ensure_connection(&self, state: Option<FlowState>) -> Box<Connection> {
        match self.get_connection(state) {
            Some(conn) => conn,
            None => self.new_connection(),
        }
    }

    fn get_connection(&self, state: Option<FlowState>) -> Option<Box<Connection>> {
        let Ok(mut conn) = state?.into_connection() else {
            warn!("flow state type mismatch; starting a new connection");
            return None;
        };
        if Arc::ptr_eq(conn.settings(), &self.settings) {
            return Some(conn);
        }

        // Pending requests are flushed through the publisher they were
        // recorded with.
        warn!("flow state created by another analyzer instance; starting a new connection");
        conn.drop_with(NOTE_FOREIGN);
        None
    }

    fn on_drop_connection(&self, conn: &mut Connection, reason: &str) {
        metrics::inc_dropped();
        Self::release_connection(conn, reason);
    }

    fn release_connection(conn: &mut Connection, reason: &str) {
        let flushed = conn.drop_with(reason);
        tracing::debug!(reason, flushed, "dropped connection state");
    }
}

impl TcpAnalyzer for Analyzer {
    fn ports(&self) -> &[u16] { &self.ports }

    fn connection_timeout(&self) -> Duration { self.settings.transactions.transaction_timeout }

    fn parse(
        &self,
        packet: &Packet<'_>,
        tuple: &FlowTuple,
        dir: Direction,
        state: Option<FlowState>,
    ) -> Result<FlowState> {
        let mut conn = self.ensure_connection(state);

        if let Err(err) = conn.feed(packet, tuple, dir) {
            tracing::warn!(error = %err, ?dir, "dropping TCP stream");
            self.on_drop_connection(&mut conn, &format!("connection dropped: {err}"));
            return Err(err);
        }
        Ok(FlowState::from_connection(conn))
    }

    fn received_fin(
        &self,
        _tuple: &FlowTuple,
        _dir: Direction,
        state: Option<FlowState>,
    ) -> Option<FlowState> {
        state
    }

    fn gap_in_stream(
        &self,
        _tuple: &FlowTuple,
        dir: Direction,
        nbytes: usize,
        state: Option<FlowState>,
    ) -> (Option<FlowState>, bool) {
        if let Some(mut conn) = self.get_connection(state) {
            tracing::debug!(nbytes, ?dir, "gap in stream");
            self.on_drop_connection(&mut conn, NOTE_GAP);
        }
        (None, true)
    }

    fn connection_lost(&self, _tuple: &FlowTuple, state: Option<FlowState>) {
        if let Some(mut conn) = self.get_connection(state) {
            Self::release_connection(&mut conn, NOTE_LOST);
        }
    }

    fn expire(&self, now: SystemTime, state: Option<FlowState>) -> Option<FlowState> {
        let mut conn = self.get_connection(state)?;
        conn.expire(now);
        Some(FlowState::from_connection(conn))
    }
}
