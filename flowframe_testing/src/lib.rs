//! Test utilities for `flowframe`.
//!
//! Provides an event sink that records what the analyzer publishes, flow
//! fixtures, chunking helpers for feeding payloads in arbitrary splits,
//! serialised log capture, and metric snapshot helpers.
//!
//! ```rust
//! use flowframe::{Analyzer, AnalyzerConfig, Direction};
//! use flowframe_testing::{CollectingSink, at, client_server, feed_chunks};
//!
//! let sink = CollectingSink::new();
//! let analyzer = Analyzer::new(&AnalyzerConfig::default(), Some(sink.as_sink())).unwrap();
//! let state = feed_chunks(
//!     &analyzer,
//!     &client_server(),
//!     None,
//!     Direction::Forward,
//!     at(0),
//!     [b"> pi".as_slice(), b"ng\n".as_slice()],
//! )
//! .unwrap()
//! .expect("flow state");
//! assert_eq!(state.connection().map(|c| c.pending_requests()), Some(1));
//! assert!(sink.is_empty());
//! ```

pub mod flows;
pub mod logging;
pub mod metrics;
pub mod sink;

pub use flows::{at, client_server, feed_chunks, split_at, split_every};
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, debugging_recorder_setup};
pub use sink::{CollectingSink, collecting_sink};
