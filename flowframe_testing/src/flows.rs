//! Flow fixtures and payload chunking helpers.

use std::{
    net::SocketAddr,
    time::{Duration, SystemTime},
};

use flowframe::{Direction, Endpoint, FlowState, FlowTuple, Packet, Result, TcpAnalyzer};
use rstest::fixture;

/// Timestamp `millis` after the Unix epoch.
#[must_use]
pub fn at(millis: u64) -> SystemTime { SystemTime::UNIX_EPOCH + Duration::from_millis(millis) }

/// Client on `10.0.0.1:40000` talking to a server on `10.0.0.2:7000`.
#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn client_server() -> FlowTuple {
    let client: SocketAddr = "10.0.0.1:40000".parse().expect("client addr");
    let server: SocketAddr = "10.0.0.2:7000".parse().expect("server addr");
    FlowTuple::new(
        Endpoint::new(client).with_process("client"),
        Endpoint::new(server).with_process("server"),
    )
}

/// Split `data` at the given offsets.
///
/// Offsets are clamped to the data length and sorted; duplicates yield
/// empty chunks.
#[must_use]
pub fn split_at<'a>(data: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut offsets: Vec<usize> = offsets.iter().map(|&o| o.min(data.len())).collect();
    offsets.sort_unstable();

    let mut chunks = Vec::with_capacity(offsets.len() + 1);
    let mut start = 0;
    for end in offsets {
        chunks.push(&data[start..end]);
        start = end;
    }
    chunks.push(&data[start..]);
    chunks
}

/// Split `data` into chunks of at most `size` bytes.
///
/// # Panics
///
/// Panics if `size` is zero.
#[must_use]
pub fn split_every(data: &[u8], size: usize) -> Vec<&[u8]> { data.chunks(size).collect() }

/// Feed `chunks` travelling in `dir` to `analyzer`, one `parse` call each,
/// all stamped with `ts`.
///
/// Returns the flow state after the last chunk, or `state` unchanged when
/// there are no chunks.
///
/// # Errors
///
/// Returns the first error reported by the analyzer.
pub fn feed_chunks<'a, A, I>(
    analyzer: &A,
    tuple: &FlowTuple,
    mut state: Option<FlowState>,
    dir: Direction,
    ts: SystemTime,
    chunks: I,
) -> Result<Option<FlowState>>
where
    A: TcpAnalyzer + ?Sized,
    I: IntoIterator<Item = &'a [u8]>,
{
    for chunk in chunks {
        state = Some(analyzer.parse(&Packet::new(ts, chunk), tuple, dir, state)?);
    }
    Ok(state)
}
