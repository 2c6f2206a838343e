//! Transcript replay for offline analysis.
//!
//! A transcript is a line-oriented text rendition of captured payloads:
//!
//! ```text
//! # flow side millis payload
//! a c 0 > hello\n
//! a s 12 >world\n
//! a end 20
//! ```
//!
//! [`Replayer`] acts as a minimal host: it keeps one [`FlowState`] per flow
//! label, drops flows whose parse fails, and reports every flow still open
//! at the end as lost.

use std::{
    collections::BTreeMap,
    io::BufRead,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::{Duration, SystemTime},
};

use log::{debug, warn};
use thiserror::Error;

use crate::{
    analyzer::TcpAnalyzer,
    connection::FlowState,
    flow::{Direction, Endpoint, FlowTuple, Packet},
};

/// Port used for the server side of synthesised flows when the analyzer
/// declares none.
pub const DEFAULT_SERVER_PORT: u16 = 7000;

const CLIENT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const SERVER_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));
const FIRST_CLIENT_PORT: u16 = 49152;

/// Errors raised while reading a transcript.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The transcript could not be read.
    #[error("failed to read transcript: {0}")]
    Io(#[from] std::io::Error),
    /// A line does not follow the transcript grammar.
    #[error("line {line}: {reason}")]
    Syntax {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// One meaningful transcript line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    /// Payload bytes travelling in one direction.
    Payload {
        /// Flow label.
        flow: String,
        /// `Forward` for client bytes, `Reverse` for server bytes.
        dir: Direction,
        /// Capture time.
        ts: SystemTime,
        /// Unescaped payload.
        payload: Vec<u8>,
    },
    /// The flow was closed by the host.
    End {
        /// Flow label.
        flow: String,
        /// Close time.
        ts: SystemTime,
    },
}

/// Parse one transcript line.
///
/// Returns `Ok(None)` for blank lines and comments.
///
/// # Errors
///
/// Returns a description of the problem when the line is malformed.
pub fn parse_line(line: &str) -> Result<Option<Record>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.splitn(4, ' ');
    let flow = fields.next().unwrap_or_default().to_owned();
    let kind = fields.next().ok_or("missing direction")?;
    let ts = fields
        .next()
        .ok_or("missing timestamp")
        .and_then(|ms| ms.parse::<u64>().map_err(|_| "timestamp is not a number"))
        .map(|ms| SystemTime::UNIX_EPOCH + Duration::from_millis(ms))?;
    let rest = fields.next().unwrap_or_default();

    let dir = match kind {
        "c" => Direction::Forward,
        "s" => Direction::Reverse,
        "end" if rest.is_empty() => return Ok(Some(Record::End { flow, ts })),
        "end" => return Err("unexpected data after end".to_owned()),
        other => return Err(format!("unknown direction {other:?}")),
    };
    Ok(Some(Record::Payload {
        flow,
        dir,
        ts,
        payload: unescape(rest)?,
    }))
}

/// Decode the payload escapes `\n`, `\r`, `\t`, `\\` and `\xHH`.
///
/// # Errors
///
/// Returns a description of the first invalid escape.
pub fn unescape(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(b'\\') => out.push(b'\\'),
            Some(b'x') => {
                let (Some(hi), Some(lo)) = (bytes.next(), bytes.next()) else {
                    return Err("truncated \\x escape".to_owned());
                };
                let digits = [hi, lo];
                let value = std::str::from_utf8(&digits)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or_else(|| {
                        format!(
                            "invalid \\x escape {:?}",
                            String::from_utf8_lossy(&digits)
                        )
                    })?;
                out.push(value);
            }
            Some(other) => return Err(format!("unknown escape \\{}", char::from(other))),
            None => return Err("dangling backslash".to_owned()),
        }
    }
    Ok(out)
}

#[derive(Debug)]
struct Flow {
    tuple: FlowTuple,
    state: Option<FlowState>,
}

/// Minimal host driving a [`TcpAnalyzer`] from transcript records.
#[derive(Debug)]
pub struct Replayer<A> {
    analyzer: A,
    server_port: u16,
    flows: BTreeMap<String, Flow>,
    next_client_port: u16,
    dropped: usize,
}

impl<A: TcpAnalyzer> Replayer<A> {
    /// Create a replayer; server endpoints use the analyzer's first port.
    pub fn new(analyzer: A) -> Self {
        let server_port = analyzer
            .ports()
            .first()
            .copied()
            .unwrap_or(DEFAULT_SERVER_PORT);
        Self {
            analyzer,
            server_port,
            flows: BTreeMap::new(),
            next_client_port: FIRST_CLIENT_PORT,
            dropped: 0,
        }
    }

    /// Apply one record.
    pub fn apply(&mut self, record: Record) {
        match record {
            Record::Payload {
                flow,
                dir,
                ts,
                payload,
            } => self.on_payload(flow, dir, ts, &payload),
            Record::End { flow, ts } => {
                if let Some(entry) = self.flows.remove(&flow) {
                    debug!("flow {flow} closed at {ts:?}");
                    self.analyzer.connection_lost(&entry.tuple, entry.state);
                }
            }
        }
    }

    /// Read and apply every record of `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError`] on the first unreadable or malformed line.
    /// Records before it have already been applied.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<usize, ReplayError> {
        let mut applied = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let record = parse_line(&line).map_err(|reason| ReplayError::Syntax {
                line: index + 1,
                reason,
            })?;
            if let Some(record) = record {
                self.apply(record);
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Report every flow still open as lost.
    pub fn finish(&mut self) {
        for (_, flow) in std::mem::take(&mut self.flows) {
            self.analyzer.connection_lost(&flow.tuple, flow.state);
        }
    }

    /// Number of flows dropped because the analyzer rejected their data.
    #[must_use]
    pub fn dropped(&self) -> usize { self.dropped }

    /// Number of flows currently tracked.
    #[must_use]
    pub fn open_flows(&self) -> usize { self.flows.len() }

    fn on_payload(&mut self, label: String, dir: Direction, ts: SystemTime, payload: &[u8]) {
        let next_port = &mut self.next_client_port;
        let server = SocketAddr::new(SERVER_ADDR, self.server_port);
        let flow = self.flows.entry(label.clone()).or_insert_with(|| {
            let client = SocketAddr::new(CLIENT_ADDR, *next_port);
            *next_port = next_port.checked_add(1).unwrap_or(FIRST_CLIENT_PORT);
            Flow {
                tuple: FlowTuple::new(Endpoint::new(client), Endpoint::new(server)),
                state: None,
            }
        });

        let packet = Packet::new(ts, payload);
        match self
            .analyzer
            .parse(&packet, &flow.tuple, dir, flow.state.take())
        {
            Ok(state) => flow.state = Some(state),
            Err(err) => {
                warn!("dropping flow {label}: {err}");
                self.flows.remove(&label);
                self.dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests;
