//! Helpers for asserting on `flowframe` counters.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Create a debugging recorder and the snapshotter observing it.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Value of counter `name`, optionally restricted to one `(key, value)`
/// label. Returns `None` when the counter was never registered.
#[must_use]
pub fn counter_value(
    snapshotter: &Snapshotter,
    name: &str,
    label: Option<(&str, &str)>,
) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| {
            let key = key.key();
            let labelled = label.is_none_or(|(k, v)| {
                key.labels().any(|l| l.key() == k && l.value() == v)
            });
            match value {
                DebugValue::Counter(count) if key.name() == name && labelled => Some(count),
                _ => None,
            }
        })
}
