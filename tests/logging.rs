//! Tests for diagnostics emitted through the `log` facade.

use flowframe::{Analyzer, AnalyzerConfig, Direction, FlowState, Packet, TcpAnalyzer};
use flowframe_testing::{CollectingSink, LoggerHandle, at, client_server, logger};
use rstest::rstest;
use serial_test::serial;

fn analyzer(config: &AnalyzerConfig) -> Analyzer {
    Analyzer::new(config, Some(CollectingSink::new().as_sink())).expect("valid config")
}

#[rstest]
#[serial]
fn framed_units_are_logged_at_debug(mut logger: LoggerHandle) {
    let analyzer = analyzer(&AnalyzerConfig::default());
    analyzer
        .parse(
            &Packet::new(at(0), b"> hello\n"),
            &client_server(),
            Direction::Forward,
            None,
        )
        .expect("parse");

    assert!(logger.contains("framed request of 8 bytes"));
}

#[rstest]
#[serial]
fn mismatched_flow_state_is_warned(mut logger: LoggerHandle) {
    let analyzer = analyzer(&AnalyzerConfig::default());
    let state = analyzer
        .parse(
            &Packet::new(at(0), b"> a\n"),
            &client_server(),
            Direction::Forward,
            Some(FlowState::new("not a connection")),
        )
        .expect("parse");

    assert_eq!(state.connection().map(|c| c.pending_requests()), Some(1));
    assert!(logger.contains("flow state type mismatch"));
}

#[rstest]
#[serial]
fn dropped_stream_is_logged(mut logger: LoggerHandle) {
    let analyzer = analyzer(&AnalyzerConfig::default().max_bytes(4));
    let result = analyzer.parse(
        &Packet::new(at(0), b"> too long"),
        &client_server(),
        Direction::Forward,
        None,
    );

    assert!(result.is_err());
    let messages = logger.messages();
    assert!(
        messages.iter().any(|m| m.contains("dropping TCP stream")),
        "drop not logged: {messages:?}"
    );
}
