//! Board power control over a secondary channel.
//!
//! The controller only drives the power channel. Tearing down and
//! rebuilding the console link after a cycle is the sequencer's job —
//! recovery is a full reconnect, not an in-place repair.

use std::thread;
use std::time::Duration;

use log::info;

use crate::error::{Error, Result};
use crate::port::ConsolePort;

/// Command that switches board power off.
pub const POWER_OFF_CMD: &[u8] = b"POWER_OFF\n";

/// Command that switches board power on.
pub const POWER_ON_CMD: &[u8] = b"POWER_ON\n";

/// Settle time after power-off.
pub const POWER_OFF_DELAY: Duration = Duration::from_secs(2);

/// Boot time after power-on.
pub const POWER_ON_DELAY: Duration = Duration::from_secs(3);

/// Grace period before reopening the console link.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Power controller on a secondary serial channel.
pub struct PowerController<P: ConsolePort> {
    port: P,
    off_delay: Duration,
    on_delay: Duration,
}

impl<P: ConsolePort> PowerController<P> {
    /// Wrap an open power-control channel.
    pub fn new(port: P) -> Self {
        Self {
            port,
            off_delay: POWER_OFF_DELAY,
            on_delay: POWER_ON_DELAY,
        }
    }

    /// Override the settle delays (tests use short ones).
    #[must_use]
    pub fn with_delays(mut self, off_delay: Duration, on_delay: Duration) -> Self {
        self.off_delay = off_delay;
        self.on_delay = on_delay;
        self
    }

    /// Cycle board power: off, settle, on, settle.
    ///
    /// The console link is dead afterwards; the caller must reopen it and
    /// re-run the handshake.
    pub fn cycle(&mut self) -> Result<()> {
        self.port
            .write_bytes(POWER_OFF_CMD)
            .map_err(|e| Error::PowerControl(format!("power off failed: {e}")))?;
        info!("power OFF command sent");
        thread::sleep(self.off_delay);

        self.port
            .write_bytes(POWER_ON_CMD)
            .map_err(|e| Error::PowerControl(format!("power on failed: {e}")))?;
        info!("power ON command sent");
        thread::sleep(self.on_delay);

        Ok(())
    }

    /// Close the control channel.
    pub fn close(&mut self) -> Result<()> {
        self.port.close()
    }
}
