//! Prompt-driven console I/O over a [`ConsolePort`].
//!
//! Firmware output arrives split across arbitrarily short reads, so a
//! prompt can easily straddle a read boundary. [`Console`] therefore keeps
//! a rolling text buffer and matches patterns against the *whole*
//! accumulated buffer after every read, never just the newest chunk.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};
use crate::events::{EventSink, Severity};
use crate::port::ConsolePort;

/// Sub-timeout for a single poll inside a longer prompt wait.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Cap on the rolling buffer; older text is discarded from the front.
const MAX_BUFFER: usize = 64 * 1024;

/// Buffered, prompt-aware view of a serial console.
pub struct Console<P: ConsolePort> {
    port: P,
    buffer: String,
    pending: Vec<u8>,
    sink: Option<Arc<dyn EventSink>>,
}

impl<P: ConsolePort> Console<P> {
    /// Wrap an open port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            buffer: String::new(),
            pending: Vec::new(),
            sink: None,
        }
    }

    /// Forward every received line to `sink` with [`Severity::Serial`].
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the sink on an existing console.
    pub fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    /// The accumulated response buffer.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Take the accumulated buffer, leaving it empty.
    pub fn take_buffer(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Drop the accumulated buffer.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Discard both the local buffer and the port's pending I/O.
    pub fn clear_io(&mut self) -> Result<()> {
        self.buffer.clear();
        self.pending.clear();
        self.port.clear_buffers()
    }

    /// Access the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the console and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Poll the port once, appending decoded text to the rolling buffer.
    ///
    /// Returns the newly decoded text (possibly empty). Invalid UTF-8 is
    /// replaced; an incomplete trailing sequence is held back until the
    /// next read completes it.
    pub fn poll(&mut self, wait: Duration) -> Result<String> {
        let bytes = self.port.read_available(wait)?;
        if bytes.is_empty() && self.pending.is_empty() {
            return Ok(String::new());
        }
        self.pending.extend_from_slice(&bytes);

        let chunk = drain_utf8_lossy(&mut self.pending);
        if !chunk.is_empty() {
            trace!("console rx: {chunk:?}");
            if let Some(sink) = &self.sink {
                for line in chunk.lines() {
                    let line = line.trim();
                    if !line.is_empty() {
                        sink.log_line(line, Severity::Serial);
                    }
                }
            }
            self.buffer.push_str(&chunk);
            if self.buffer.len() > MAX_BUFFER {
                let cut = self.buffer.len() - MAX_BUFFER;
                // Keep the tail; any prompt worth matching is recent.
                let cut = self
                    .buffer
                    .char_indices()
                    .map(|(i, _)| i)
                    .find(|i| *i >= cut)
                    .unwrap_or(0);
                self.buffer.drain(..cut);
            }
        }
        Ok(chunk)
    }

    /// Wait until `pattern` matches the accumulated buffer.
    ///
    /// The pattern is a case-insensitive regex tested against the whole
    /// buffer after every poll, so text already received counts. On
    /// success returns a snapshot of the buffer. On deadline expiry
    /// returns [`Error::PromptTimeout`] carrying the pattern and the
    /// buffer seen so far.
    pub fn wait_for(&mut self, pattern: &str, timeout: Duration) -> Result<String> {
        let re = compile_pattern(pattern)?;
        debug!("waiting for {pattern:?} (timeout {timeout:?})");

        let deadline = Instant::now() + timeout;
        loop {
            if re.is_match(&self.buffer) {
                debug!("prompt matched: {pattern:?}");
                return Ok(self.buffer.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("timeout waiting for {pattern:?}");
                return Err(Error::PromptTimeout {
                    pattern: pattern.to_string(),
                    buffer: self.buffer.clone(),
                });
            }
            let wait = POLL_INTERVAL.min(deadline - now);
            self.poll(wait)?;
        }
    }

    /// Send an answer one keystroke at a time.
    ///
    /// The firmware's input parser desynchronizes when a whole string
    /// arrives in one write, so each character goes out as its own write
    /// with `delay` between characters.
    pub fn send_keys(&mut self, keys: &str, delay: Duration) -> Result<()> {
        debug!("sending keys {keys:?}");
        let mut utf8 = [0u8; 4];
        for (i, ch) in keys.chars().enumerate() {
            if i > 0 && !delay.is_zero() {
                thread::sleep(delay);
            }
            self.port.write_bytes(ch.encode_utf8(&mut utf8).as_bytes())?;
        }
        Ok(())
    }

    /// Send a carriage-return/line-feed pair (the Enter key).
    pub fn send_enter(&mut self) -> Result<()> {
        self.port.write_bytes(b"\r\n")
    }
}

/// Compile a case-insensitive pattern, mapping bad patterns to I/O-free
/// validation errors rather than panicking.
fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::validation("pattern", e.to_string()))
}

/// Drain buffered bytes into text without stalling on invalid bytes.
///
/// Valid UTF-8 is emitted as-is, invalid sequences become the replacement
/// char, and an incomplete suffix stays in `buffer` for the next read.
fn drain_utf8_lossy(buffer: &mut Vec<u8>) -> String {
    let mut output = String::new();

    loop {
        match std::str::from_utf8(buffer) {
            Ok(valid) => {
                output.push_str(valid);
                buffer.clear();
                break;
            },
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if valid_up_to > 0 {
                    if let Ok(valid) = std::str::from_utf8(&buffer[..valid_up_to]) {
                        output.push_str(valid);
                    }
                }

                match err.error_len() {
                    Some(invalid_len) => {
                        output.push('\u{FFFD}');
                        let drain_to = valid_up_to.saturating_add(invalid_len).min(buffer.len());
                        buffer.drain(..drain_to);
                    },
                    None => {
                        if valid_up_to > 0 {
                            buffer.drain(..valid_up_to);
                        }
                        break;
                    },
                }
            },
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedPort;

    fn console_with(chunks: &[&str]) -> Console<ScriptedPort> {
        Console::new(ScriptedPort::with_text(chunks))
    }

    // ---- drain_utf8_lossy ----

    #[test]
    fn test_drain_utf8_lossy_replaces_invalid_bytes_and_continues() {
        let mut buf = vec![0xFF, b'A', 0xFE, b'B'];
        let out = drain_utf8_lossy(&mut buf);
        assert_eq!(out, "\u{FFFD}A\u{FFFD}B");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_drain_utf8_lossy_keeps_incomplete_suffix() {
        let mut buf = vec![0xE4, 0xBD]; // incomplete 3-byte sequence
        let out = drain_utf8_lossy(&mut buf);
        assert_eq!(out, "");
        assert_eq!(buf, vec![0xE4, 0xBD]);

        buf.push(0xA0);
        let out2 = drain_utf8_lossy(&mut buf);
        assert_eq!(out2, "\u{4F60}".to_string());
        assert!(buf.is_empty());
    }

    // ---- wait_for ----

    #[test]
    fn test_wait_for_matches_single_chunk() {
        let mut console = console_with(&["boot ok\r\nPlease Hit number key:"]);
        let buffer = console
            .wait_for("Please Hit number key", Duration::from_millis(200))
            .unwrap();
        assert!(buffer.contains("boot ok"));
    }

    #[test]
    fn test_wait_for_matches_prompt_split_across_reads() {
        // The prompt straddles a read boundary; only whole-buffer
        // matching can see it.
        let mut console = console_with(&["...Training", " ", "Complete 7\n"]);
        console
            .wait_for("Training Complete 7", Duration::from_millis(200))
            .unwrap();
    }

    #[test]
    fn test_wait_for_is_case_insensitive() {
        let mut console = console_with(&["pll lock acquired\r\n"]);
        console
            .wait_for("PLL LOCK", Duration::from_millis(200))
            .unwrap();
    }

    #[test]
    fn test_wait_for_matches_text_already_in_buffer() {
        let mut console = console_with(&["select test mode\r\nleftover"]);
        console
            .wait_for("select test mode", Duration::from_millis(200))
            .unwrap();
        // A second wait for text received earlier succeeds without new reads.
        console
            .wait_for("leftover", Duration::from_millis(200))
            .unwrap();
    }

    #[test]
    fn test_wait_for_timeout_carries_pattern_and_buffer() {
        let mut console = console_with(&["unrelated noise"]);
        let err = console
            .wait_for("Repeat memory tests", Duration::from_millis(50))
            .unwrap_err();
        match err {
            Error::PromptTimeout { pattern, buffer } => {
                assert_eq!(pattern, "Repeat memory tests");
                assert!(buffer.contains("unrelated noise"));
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    // ---- send_keys ----

    #[test]
    fn test_send_keys_writes_one_byte_per_character() {
        let mut console = console_with(&[]);
        console.send_keys("15", Duration::ZERO).unwrap();
        assert_eq!(console.port_mut().writes(), vec![b"1".to_vec(), b"5".to_vec()]);
    }

    #[test]
    fn test_send_enter_writes_crlf() {
        let mut console = console_with(&[]);
        console.send_enter().unwrap();
        assert_eq!(console.port_mut().writes(), vec![b"\r\n".to_vec()]);
    }

    // ---- buffer management ----

    #[test]
    fn test_take_buffer_empties_buffer() {
        let mut console = console_with(&["PASS\r\n"]);
        console.poll(Duration::ZERO).unwrap();
        let text = console.take_buffer();
        assert!(text.contains("PASS"));
        assert!(console.buffer().is_empty());
    }

    #[test]
    fn test_clear_io_discards_pending_input() {
        let mut console = console_with(&["stale"]);
        console.poll(Duration::ZERO).unwrap();
        console.clear_io().unwrap();
        assert!(console.buffer().is_empty());
    }

    #[test]
    fn test_rolling_buffer_is_capped() {
        let big = "x".repeat(40 * 1024);
        let mut console = console_with(&[big.as_str(), big.as_str(), "PLL LOCK\r\n"]);
        console.poll(Duration::ZERO).unwrap();
        console.poll(Duration::ZERO).unwrap();
        console.poll(Duration::ZERO).unwrap();
        assert!(console.buffer().len() <= MAX_BUFFER);
        // Recent text survives the trim.
        assert!(console.buffer().contains("PLL LOCK"));
    }
}
