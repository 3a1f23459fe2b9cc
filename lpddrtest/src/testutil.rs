//! Scripted console port for driving the sequencers in tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::port::ConsolePort;

/// A port that replays a fixed script of incoming chunks.
///
/// Each [`ConsolePort::read_available`] call pops the next chunk
/// (returning immediately, so waits are governed purely by the caller's
/// deadlines), and every write is recorded for assertions. Clearing
/// buffers does not consume the script: scripted chunks model *future*
/// firmware output, not pending bytes.
pub(crate) struct ScriptedPort {
    chunks: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    fail_writes: bool,
}

impl ScriptedPort {
    /// A port that will emit the given text chunks, one per read.
    pub(crate) fn with_text(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    /// Make every write fail with a broken pipe.
    #[must_use]
    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Every write performed, in order.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.clone()
    }

    /// All written bytes concatenated and decoded.
    pub(crate) fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.writes.concat()).into_owned()
    }
}

impl ConsolePort for ScriptedPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        self.writes.push(data.to_vec());
        Ok(())
    }

    fn read_available(&mut self, _wait: Duration) -> Result<Vec<u8>> {
        Ok(self.chunks.pop_front().unwrap_or_default())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
