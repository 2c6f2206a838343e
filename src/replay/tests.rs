//! Tests for transcript parsing and replay.

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use rstest::rstest;

use super::{Record, ReplayError, Replayer, parse_line, unescape};
use crate::{
    analyzer::{Analyzer, NOTE_LOST},
    config::{AnalyzerConfig, FramingConfig},
    flow::Direction,
    publish::{Event, Status},
};

type Events = Arc<Mutex<Vec<Event>>>;

fn at(millis: u64) -> SystemTime { SystemTime::UNIX_EPOCH + Duration::from_millis(millis) }

fn with_responses(config: AnalyzerConfig) -> AnalyzerConfig {
    config.framing(FramingConfig {
        response_marker: Some('<'),
        ..FramingConfig::default()
    })
}

fn replayer(config: &AnalyzerConfig) -> (Replayer<Analyzer>, Events) {
    let events: Events = Arc::default();
    let sink = Arc::clone(&events);
    let analyzer = Analyzer::new(
        config,
        Some(Arc::new(move |event: Event| {
            sink.lock().expect("events lock").push(event);
        })),
    )
    .expect("valid config");
    (Replayer::new(analyzer), events)
}

#[rstest]
#[case("plain", b"plain".as_slice())]
#[case(r"a\nb", b"a\nb".as_slice())]
#[case(r"\r\t\\", b"\r\t\\".as_slice())]
#[case(r"\x3e\x00\xFF", b">\x00\xff".as_slice())]
#[case("", b"".as_slice())]
fn unescape_decodes_escapes(#[case] text: &str, #[case] expected: &[u8]) {
    assert_eq!(unescape(text).expect("valid escapes"), expected);
}

#[rstest]
#[case(r"\q")]
#[case(r"\x4")]
#[case(r"\xzz")]
#[case("trailing\\")]
fn unescape_rejects_bad_escapes(#[case] text: &str) {
    assert!(unescape(text).is_err());
}

#[test]
fn payload_line_keeps_spaces() {
    let record = parse_line(r"f1 c 15 > hello world\n")
        .expect("valid line")
        .expect("record");
    assert_eq!(
        record,
        Record::Payload {
            flow: "f1".to_owned(),
            dir: Direction::Forward,
            ts: at(15),
            payload: b"> hello world\n".to_vec(),
        }
    );
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("# comment")]
fn blank_and_comment_lines_are_skipped(#[case] line: &str) {
    assert_eq!(parse_line(line), Ok(None));
}

#[test]
fn end_line_closes_flow() {
    assert_eq!(
        parse_line("f1 end 30"),
        Ok(Some(Record::End {
            flow: "f1".to_owned(),
            ts: at(30),
        }))
    );
}

#[rstest]
#[case("f1")]
#[case("f1 c")]
#[case("f1 x 10 data")]
#[case("f1 c soon data")]
#[case("f1 end 10 extra")]
fn malformed_lines_are_rejected(#[case] line: &str) {
    assert!(parse_line(line).is_err());
}

#[test]
fn replays_interleaved_flows() {
    let config = with_responses(AnalyzerConfig::default().send_request(true));
    let (mut replayer, events) = replayer(&config);
    let transcript = "\
# two clients talking to one server
a c 0 > one\\n
b c 1 > two\\n
b s 4 <2\\n
a s 9 <1\\n
";
    let applied = replayer.run(Cursor::new(transcript)).expect("replay");
    assert_eq!(applied, 4);
    assert_eq!(replayer.open_flows(), 2);

    let events = events.lock().expect("lock");
    let seen: Vec<_> = events
        .iter()
        .map(|e| (e.request.as_deref(), e.response_time))
        .collect();
    assert_eq!(seen, vec![(Some("two"), Some(3)), (Some("one"), Some(9))]);
    assert_ne!(events[0].src, events[1].src);
    assert!(events.iter().all(|e| e.status == Status::Ok));
}

#[test]
fn finish_reports_pending_requests_as_lost() {
    let (mut replayer, events) = replayer(&AnalyzerConfig::default());
    replayer
        .run(Cursor::new("a c 0 > waiting\\n\n"))
        .expect("replay");
    replayer.finish();

    assert_eq!(replayer.open_flows(), 0);
    let events = events.lock().expect("lock");
    assert_eq!(events.len(), 1);
    assert!(events[0].notes.iter().any(|n| n == NOTE_LOST));
}

#[test]
fn oversized_flow_is_dropped_and_others_continue() {
    let config = with_responses(AnalyzerConfig::default().max_bytes(16));
    let (mut replayer, events) = replayer(&config);
    let transcript = "\
a c 0 > this request line never terminates
b c 1 > ok\\n
b s 2 <fine\\n
";
    replayer.run(Cursor::new(transcript)).expect("replay");

    assert_eq!(replayer.dropped(), 1);
    assert_eq!(replayer.open_flows(), 1);
    assert_eq!(events.lock().expect("lock").len(), 1);
}

#[test]
fn syntax_error_reports_line_number() {
    let (mut replayer, _) = replayer(&AnalyzerConfig::default());
    let err = replayer
        .run(Cursor::new("a c 0 > ok\\n\na q 1 nope\n"))
        .expect_err("bad direction");
    assert!(matches!(err, ReplayError::Syntax { line: 2, .. }));
    assert_eq!(err.to_string(), "line 2: unknown direction \"q\"");
}
