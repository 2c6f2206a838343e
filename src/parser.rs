//! Incremental message parser for one stream direction.
//!
//! [`Parser`] appends each payload chunk to its [`StreamBuffer`] once and
//! then frames as many complete units as the buffer holds. A missing
//! delimiter is not an error: the parser keeps the partial unit and resumes
//! on the next [`feed`](Parser::feed).

use std::{num::NonZeroUsize, sync::Arc, time::SystemTime};

use log::debug;

use crate::{
    buffer::{BufferError, StreamBuffer},
    framing::{Framing, MarkerFraming},
    message::Message,
};

/// Settings shared by every parser of an analyzer instance.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Cap on unframed bytes per stream direction; `None` disables it.
    pub max_bytes: Option<NonZeroUsize>,
    /// Framing rule applied to every unit.
    pub framing: Arc<dyn Framing>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_bytes: None,
            framing: Arc::new(MarkerFraming::default()),
        }
    }
}

/// Per-direction framing state.
#[derive(Debug)]
pub struct Parser {
    buf: StreamBuffer,
    config: Arc<ParserConfig>,
    started_at: Option<SystemTime>,
}

impl Parser {
    /// Create a parser bound to a shared configuration.
    #[must_use]
    pub fn new(config: Arc<ParserConfig>) -> Self {
        Self {
            buf: StreamBuffer::new(config.max_bytes),
            config,
            started_at: None,
        }
    }

    /// Feed a payload chunk captured at `ts`.
    ///
    /// Every unit completed by this chunk is handed to `on_message` in
    /// stream order. A unit keeps the timestamp of the chunk that started
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::StreamTooLarge`] when the chunk would exceed
    /// the configured cap. The stream is out of sync after that and must be
    /// dropped.
    pub fn feed<F>(
        &mut self,
        ts: SystemTime,
        data: &[u8],
        mut on_message: F,
    ) -> Result<(), BufferError>
    where
        F: FnMut(Message),
    {
        self.buf.append(data)?;

        while !self.buf.is_empty() {
            if self.started_at.is_none() {
                self.started_at = Some(ts);
            }

            let Some(msg) = self.parse(ts) else {
                break; // wait for more data
            };

            self.buf.reset();
            self.started_at = None;
            on_message(msg);
        }

        Ok(())
    }

    /// Bytes buffered for the unit currently being framed.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buf.len() }

    /// Release buffered bytes and forget the partial unit.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.started_at = None;
    }

    fn parse(&mut self, ts: SystemTime) -> Option<Message> {
        let framing = &self.config.framing;
        let body = self.buf.collect_until(framing.delimiter())?;
        let class = framing.classify(&body);

        let mut msg = Message::new(self.started_at.unwrap_or(ts), class.role);
        msg.size = self.buf.consumed();
        msg.content = body.slice(class.skip.min(body.len())..);
        msg.complete = true;
        msg.failed = class.failed;
        if let Some(note) = class.note {
            msg.notes.push(note);
        }

        debug!(
            "framed {} of {} bytes (failed={})",
            msg.role.as_str(),
            msg.size,
            msg.failed
        );
        Some(msg)
    }
}
