//! Callback surface between the core and its listeners.
//!
//! The sequencer reports progress through an [`EventSink`]: one line-based
//! log channel with a severity, and a coarse "current step" status string.
//! Front ends (GUI, CLI, test harnesses) implement the trait or consume
//! the channel-backed variant; the core never assumes a listener exists.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected but survivable.
    Warning,
    /// A failure.
    Error,
    /// Raw console traffic (received lines and echoed keystrokes).
    Serial,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Serial => "SERIAL",
        };
        f.write_str(s)
    }
}

/// Listener interface for sequencer progress.
///
/// Both methods default to no-ops so a listener may implement only the
/// channel it cares about.
pub trait EventSink: Send + Sync {
    /// A human-readable log line.
    fn log_line(&self, _text: &str, _severity: Severity) {}

    /// The sequencer moved to a new step.
    fn status_change(&self, _description: &str) {}
}

/// A sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {}

/// An event as carried over the channel sink.
#[derive(Debug, Clone)]
pub enum SequenceEvent {
    /// A log line with its severity.
    Log {
        /// The log text.
        text: String,
        /// Severity of the line.
        severity: Severity,
    },
    /// A status (current step) change.
    Status(String),
}

/// A sink that forwards events over an mpsc channel.
///
/// Send failures are ignored: a listener that went away must not take the
/// test run down with it.
pub struct ChannelSink {
    tx: Sender<SequenceEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the listener.
    pub fn new() -> (Self, Receiver<SequenceEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn log_line(&self, text: &str, severity: Severity) {
        let _ = self.tx.send(SequenceEvent::Log {
            text: text.to_string(),
            severity,
        });
    }

    fn status_change(&self, description: &str) {
        let _ = self.tx.send(SequenceEvent::Status(description.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_log_lines() {
        let (sink, rx) = ChannelSink::new();
        sink.log_line("hello", Severity::Info);

        match rx.try_recv().unwrap() {
            SequenceEvent::Log { text, severity } => {
                assert_eq!(text, "hello");
                assert_eq!(severity, Severity::Info);
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_channel_sink_forwards_status() {
        let (sink, rx) = ChannelSink::new();
        sink.status_change("memory test");

        match rx.try_recv().unwrap() {
            SequenceEvent::Status(s) => assert_eq!(s, "memory test"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        // Must not panic
        sink.log_line("into the void", Severity::Warning);
        sink.status_change("gone");
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Info.to_string(), "INFO");
        assert_eq!(Severity::Serial.to_string(), "SERIAL");
    }
}
