//! Serial link abstraction.
//!
//! The firmware's console is a plain serial line; everything above this
//! module works in terms of the [`ConsolePort`] trait so that the test
//! sequencer can be driven against a scripted port in tests just as well
//! as against real hardware.
//!
//! Retry policy deliberately does not live here: a port either performs
//! the requested operation or reports the error, and the sequencer
//! decides what to do about it.

pub mod native;

use std::time::Duration;

use crate::error::Result;

/// Serial link settings.
///
/// The board console is 8N1 with no flow control; only the port name,
/// baud rate and per-read timeout vary.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Default per-read timeout.
    pub timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl LinkSettings {
    /// Create settings for the given port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the per-read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information, as reported by the host.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// A serial link to the board console.
///
/// Implementations must never block past the deadline handed to
/// [`ConsolePort::read_available`].
pub trait ConsolePort: Send {
    /// Write raw bytes, blocking until complete.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Poll for incoming bytes.
    ///
    /// Waits at most `wait` for data and returns whatever arrived, which
    /// may be empty. An expired read deadline is not an error.
    fn read_available(&mut self, wait: Duration) -> Result<Vec<u8>>;

    /// Discard any pending input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Close the port and release resources.
    ///
    /// Idempotent; safe to call on a port that was never opened.
    fn close(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;
}

// Re-export the native implementation
pub use native::{NativePort, list_ports};
