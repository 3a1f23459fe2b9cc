//! Background execution of a full test sequence.
//!
//! A run occupies a dedicated worker thread so a caller's UI or shell
//! thread is never blocked on serial I/O. The worker talks back through
//! a one-directional event channel; the core stays listener-agnostic.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{ChannelSink, SequenceEvent};
use crate::result::{EyePatternResult, TestResult, Verdict};
use crate::sequencer::TestSequencer;

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Final aggregate judgment.
    pub verdict: Verdict,
    /// The ordered result log.
    pub results: Vec<TestResult>,
    /// Eye-pattern results, when any were run.
    pub eye_results: Vec<EyePatternResult>,
}

/// Handle to a running background sequence.
pub struct RunHandle {
    events: Receiver<SequenceEvent>,
    handle: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    /// The event stream for this run.
    ///
    /// The channel closes when the run finishes.
    pub fn events(&self) -> &Receiver<SequenceEvent> {
        &self.events
    }

    /// Wait for the worker to finish and return its summary.
    pub fn join(self) -> Result<RunSummary> {
        self.handle
            .join()
            .map_err(|_| Error::Io(std::io::Error::other("worker thread panicked")))?
    }
}

/// Start a full sequence on a background thread.
///
/// The configuration is validated up front so obviously bad input fails
/// fast on the caller's thread; the port is opened on the worker so that
/// connection errors flow through the run result.
pub fn spawn(config: Config) -> Result<RunHandle> {
    config.validate()?;

    let (sink, events) = ChannelSink::new();
    let handle = thread::spawn(move || {
        let mut sequencer = TestSequencer::open(config)?.with_sink(Arc::new(sink));
        let verdict = sequencer.run_full_sequence()?;
        Ok(RunSummary {
            verdict,
            results: sequencer.results().to_vec(),
            eye_results: sequencer.eye_results().to_vec(),
        })
    });

    Ok(RunHandle { events, handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_rejects_invalid_config_synchronously() {
        let config = Config::new("");
        assert!(matches!(
            spawn(config),
            Err(Error::Validation { field: "port", .. })
        ));
    }
}
