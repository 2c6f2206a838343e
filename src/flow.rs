//! Flow identity types supplied by the host pipeline.

use std::{net::SocketAddr, sync::Arc, time::SystemTime};

/// Side of a flow a packet travelled on, relative to its first packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Same direction as the packet that opened the flow.
    Forward,
    /// Opposite direction.
    Reverse,
}

impl Direction {
    /// Array index used for per-direction state.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }
}

/// One side of a flow, optionally labelled with the owning process.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Socket address of this side.
    pub addr: SocketAddr,
    /// Process label resolved by the host, if any.
    pub process: Option<Arc<str>>,
}

impl Endpoint {
    /// Endpoint without a process label.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self { Self { addr, process: None } }

    /// Attach a process label.
    #[must_use]
    pub fn with_process(mut self, process: impl Into<Arc<str>>) -> Self {
        self.process = Some(process.into());
        self
    }
}

/// Address pair identifying a flow, oriented from `src` to `dst`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    /// Sending side.
    pub src: Endpoint,
    /// Receiving side.
    pub dst: Endpoint,
}

impl FlowTuple {
    /// Build a tuple from two endpoints.
    #[must_use]
    pub fn new(src: Endpoint, dst: Endpoint) -> Self { Self { src, dst } }

    /// Tuple with both sides swapped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }

    /// Orient the flow tuple so that `src` is the sender of a packet
    /// travelling in `dir`.
    #[must_use]
    pub fn oriented(&self, dir: Direction) -> Self {
        match dir {
            Direction::Forward => self.clone(),
            Direction::Reverse => self.reversed(),
        }
    }
}

/// Reassembled payload chunk delivered by the host.
#[derive(Clone, Copy, Debug)]
pub struct Packet<'a> {
    /// Capture timestamp.
    pub ts: SystemTime,
    /// Ordered stream bytes.
    pub payload: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Build a packet.
    #[must_use]
    pub fn new(ts: SystemTime, payload: &'a [u8]) -> Self { Self { ts, payload } }
}
