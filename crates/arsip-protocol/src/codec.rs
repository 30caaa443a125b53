//! Incremental decoder for the `text/event-stream` format.
//!
//! The network hands us arbitrary byte chunks: a frame can be split in
//! the middle of a line, or even in the middle of a multi-byte UTF-8
//! character. [`SseDecoder`] buffers bytes until it has complete lines,
//! then applies the event-stream field rules:
//!
//! ```text
//! event: sidebar                 ← names the event
//! data: {"code_notif": 1,        ← data lines are joined with '\n'
//! data:  "unread_count": 4}
//! id: 17                         ← last event id
//! : keep-alive                   ← comment, ignored
//!                                ← blank line dispatches the event
//! ```

use std::collections::VecDeque;

use crate::ProtocolError;

/// One dispatched event-stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if the frame had one.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// The `id:` field, if the frame had one.
    pub id: Option<String>,
    /// The `retry:` field in milliseconds, if present and numeric.
    pub retry: Option<u64>,
}

/// Buffers raw bytes and yields complete [`SseEvent`]s.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_line_len: usize,
    max_event_len: usize,
    event: Option<String>,
    data: String,
    id: Option<String>,
    retry: Option<u64>,
    ready: VecDeque<SseEvent>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    /// Longest line accepted before the stream is considered broken.
    pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;
    /// Largest `data` payload one event may accumulate.
    pub const DEFAULT_MAX_EVENT_LEN: usize = 4 * 1024 * 1024;

    /// Creates a decoder with the default limits.
    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_MAX_LINE_LEN, Self::DEFAULT_MAX_EVENT_LEN)
    }

    /// Creates a decoder that rejects lines longer than `max_line_len`.
    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self::with_limits(max_line_len, Self::DEFAULT_MAX_EVENT_LEN)
    }

    /// Creates a decoder with explicit line and event size limits.
    pub fn with_limits(max_line_len: usize, max_event_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_len,
            max_event_len,
            event: None,
            data: String::new(),
            id: None,
            retry: None,
            ready: VecDeque::new(),
        }
    }

    /// Feeds a chunk of bytes into the decoder.
    ///
    /// Complete events become available through [`next_event`](Self::next_event).
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidFrame`] if a single line grows past
    /// the line limit without a terminator, or one event's data grows past
    /// the event limit without a dispatching blank line. Everything
    /// buffered is discarded in both cases.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        self.buffer.extend_from_slice(chunk);
        if let Err(e) = self.split_lines() {
            self.reset();
            return Err(e);
        }

        if self.buffer.len() > self.max_line_len {
            let len = self.buffer.len();
            self.reset();
            return Err(ProtocolError::InvalidFrame(format!(
                "line of {len} bytes exceeds limit of {}",
                self.max_line_len
            )));
        }
        Ok(())
    }

    fn split_lines(&mut self) -> Result<(), ProtocolError> {
        let mut start = 0;
        let mut i = 0;
        while i < self.buffer.len() {
            match self.buffer[i] {
                b'\n' => {
                    let line = self.buffer[start..i].to_vec();
                    self.process_line(&line)?;
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    // A trailing '\r' may be the first half of "\r\n".
                    if i + 1 == self.buffer.len() {
                        break;
                    }
                    let line = self.buffer[start..i].to_vec();
                    self.process_line(&line)?;
                    i += if self.buffer[i + 1] == b'\n' { 2 } else { 1 };
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buffer.drain(..start);
        Ok(())
    }

    /// Drops buffered bytes and the partially built event. Already
    /// dispatched events and the last event id are kept.
    fn reset(&mut self) {
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.retry = None;
    }

    /// Pops the next complete event, in arrival order.
    pub fn next_event(&mut self) -> Option<SseEvent> {
        self.ready.pop_front()
    }

    /// Number of bytes buffered that do not yet form a complete line.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<(), ProtocolError> {
        let line = String::from_utf8_lossy(raw);

        if line.is_empty() {
            self.dispatch();
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_ref(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                let len = self.data.len() + value.len() + 1;
                if len > self.max_event_len {
                    return Err(ProtocolError::InvalidFrame(format!(
                        "event data of {len} bytes exceeds limit of {}",
                        self.max_event_len
                    )));
                }
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self) {
        let event = self.event.take();
        let retry = self.retry.take();
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        self.ready.push_back(SseEvent {
            event,
            data,
            // The last event id persists across frames.
            id: self.id.clone(),
            retry,
        });
    }
}
