#![cfg(feature = "metrics")]
//! Tests for `flowframe` metrics helpers.
//!
//! Counters are observed through `metrics_util::debugging::DebuggingRecorder`
//! installed as a thread-local recorder.

use flowframe::{
    Analyzer,
    AnalyzerConfig,
    Direction,
    Role,
    Status,
    TcpAnalyzer,
    metrics::{self as ff_metrics, CONNECTIONS_DROPPED, MESSAGES_PARSED, TRANSACTIONS_PUBLISHED},
};
use flowframe_testing::{
    CollectingSink,
    at,
    client_server,
    counter_value,
    debugging_recorder_setup,
    feed_chunks,
};
use rstest::rstest;

#[rstest]
#[case(Role::Request, "request")]
#[case(Role::Response, "response")]
fn message_counter_is_labelled_by_role(#[case] role: Role, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || ff_metrics::inc_messages(role));

    assert_eq!(
        counter_value(&snapshotter, MESSAGES_PARSED, Some(("role", label))),
        Some(1)
    );
}

#[rstest]
#[case(Status::Ok, "OK")]
#[case(Status::Error, "Error")]
#[case(Status::Incomplete, "Incomplete")]
fn transaction_counter_is_labelled_by_status(#[case] status: Status, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || ff_metrics::inc_transactions(status));

    assert_eq!(
        counter_value(&snapshotter, TRANSACTIONS_PUBLISHED, Some(("status", label))),
        Some(1)
    );
}

#[test]
fn analyzer_records_messages_transactions_and_drops() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let sink = CollectingSink::new();
    let config = AnalyzerConfig::default().max_bytes(16);
    let analyzer = Analyzer::new(&config, Some(sink.as_sink())).expect("valid config");
    let tuple = client_server();

    metrics::with_local_recorder(&recorder, || {
        let state = feed_chunks(
            &analyzer,
            &tuple,
            None,
            Direction::Forward,
            at(0),
            [b"> a\n> b\n".as_slice()],
        )
        .expect("requests");
        let state = feed_chunks(
            &analyzer,
            &tuple,
            state,
            Direction::Reverse,
            at(1),
            [b"x\n".as_slice()],
        )
        .expect("response");
        let overflow = [b'z'; 32];
        let err = feed_chunks(
            &analyzer,
            &tuple,
            state,
            Direction::Reverse,
            at(2),
            [overflow.as_slice()],
        );
        assert!(err.is_err());
    });

    assert_eq!(
        counter_value(&snapshotter, MESSAGES_PARSED, Some(("role", "request"))),
        Some(2)
    );
    assert_eq!(
        counter_value(&snapshotter, MESSAGES_PARSED, Some(("role", "response"))),
        Some(1)
    );
    assert_eq!(
        counter_value(&snapshotter, TRANSACTIONS_PUBLISHED, Some(("status", "Error"))),
        Some(1)
    );
    assert_eq!(
        counter_value(&snapshotter, TRANSACTIONS_PUBLISHED, Some(("status", "Incomplete"))),
        Some(1)
    );
    assert_eq!(counter_value(&snapshotter, CONNECTIONS_DROPPED, None), Some(1));
    assert_eq!(sink.len(), 2);
}

#[test]
fn host_teardown_is_not_counted_as_drop() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let sink = CollectingSink::new();
    let analyzer =
        Analyzer::new(&AnalyzerConfig::default(), Some(sink.as_sink())).expect("valid config");
    let tuple = client_server();

    metrics::with_local_recorder(&recorder, || {
        let state = feed_chunks(
            &analyzer,
            &tuple,
            None,
            Direction::Forward,
            at(0),
            [b"> a\n".as_slice()],
        )
        .expect("request");
        analyzer.connection_lost(&tuple, state);

        let state = feed_chunks(
            &analyzer,
            &tuple,
            None,
            Direction::Forward,
            at(1),
            [b"> b\n".as_slice()],
        )
        .expect("request");
        let (_, drop) = analyzer.gap_in_stream(&tuple, Direction::Reverse, 4, state);
        assert!(drop);
    });

    assert_eq!(counter_value(&snapshotter, CONNECTIONS_DROPPED, None), Some(1));
    assert_eq!(sink.len(), 2);
}
