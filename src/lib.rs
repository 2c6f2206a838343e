#![doc(html_root_url = "https://docs.rs/flowframe/latest")]
//! Public API for the `flowframe` library.
//!
//! This crate provides the framing and correlation core of a passive
//! protocol analyzer: it rebuilds application messages from reassembled TCP
//! payloads, pairs requests with responses, and publishes the resulting
//! transactions as structured events.

pub mod analyzer;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod flow;
pub mod framing;
pub mod message;
pub mod metrics;
pub mod parser;
pub mod publish;
pub mod replay;
pub mod transaction;

pub use analyzer::{Analyzer, TcpAnalyzer};
pub use buffer::{BufferError, StreamBuffer};
pub use config::{AnalyzerConfig, ConfigError, FramingConfig};
pub use connection::{Connection, FlowState};
pub use correlator::{Correlator, TransactionConfig};
pub use error::{AnalyzerError, Result};
pub use flow::{Direction, Endpoint, FlowTuple, Packet};
pub use framing::{Classification, Framing, MarkerFraming};
pub use message::{Message, Role};
pub use parser::{Parser, ParserConfig};
pub use publish::{EndpointRecord, Event, EventSink, Publisher, Status};
pub use replay::{Record, ReplayError, Replayer};
pub use transaction::Transaction;
