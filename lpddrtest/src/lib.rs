//! # lpddrtest
//!
//! A library for automating LPDDR4 memory bring-up tests over a board
//! firmware's interactive serial console.
//!
//! The firmware exposes a text menu (frequency selection, training,
//! memory-access patterns, diagnostics, eye-pattern sweeps) meant for a
//! human with a terminal. This crate plays that human: it sends
//! keystrokes one at a time, waits for prompts, classifies the free-text
//! responses, and decides what to run next. It provides:
//!
//! - A serial link abstraction with a scripted test double
//! - Whole-buffer prompt matching that survives split reads
//! - PASS/FAIL/UNKNOWN classification and heuristic quality scoring
//! - The menu-walking test sequencer and eye-pattern sub-sequencer
//! - A pure judgment engine over the accumulated result log
//! - Optional board power cycling on a secondary channel
//!
//! ## Example
//!
//! ```rust,no_run
//! use lpddrtest::{Config, runner};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("/dev/ttyUSB0");
//!     let run = runner::spawn(config)?;
//!
//!     for event in run.events() {
//!         println!("{event:?}");
//!     }
//!
//!     let summary = run.join()?;
//!     println!("verdict: {}", summary.verdict);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod classify;
pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod eye;
pub mod firmware;
pub mod judgment;
pub mod port;
pub mod power;
pub mod result;
pub mod runner;
pub mod sequencer;

#[cfg(test)]
pub(crate) mod testutil;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker polled between sequence steps.
///
/// The checker should return `true` when the current run should stop
/// (for example after receiving Ctrl-C in CLI applications). Cancellation
/// is cooperative: the flag is polled between discrete steps, never
/// inside a single prompt wait, so latency is bounded by the current
/// wait's timeout.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupt_requested() -> bool {
    INTERRUPT_CHECKER.get().is_some_and(|checker| checker())
}

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

// Re-exports for convenience
pub use {
    classify::{Outcome, classify, extract_timing, score_quality},
    config::{Config, DiagMode, EyeConfig, EyeTestMode, PowerSettings},
    console::Console,
    error::{Error, Result},
    events::{ChannelSink, EventSink, NullSink, SequenceEvent, Severity},
    eye::EyePatternSequencer,
    judgment::{next_step, overall},
    port::{ConsolePort, LinkSettings, NativePort, PortInfo, list_ports},
    power::PowerController,
    result::{EyeDirection, EyePatternResult, TestResult, TestStep, Verdict},
    runner::{RunHandle, RunSummary},
    sequencer::{TestSequencer, Timeouts},
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_checker_default_false() {
        test_set_interrupted(false);
        assert!(!is_interrupt_requested());
    }

    #[test]
    fn test_interrupt_checker_toggle_true_false() {
        test_set_interrupted(true);
        assert!(is_interrupt_requested());

        test_set_interrupted(false);
        assert!(!is_interrupt_requested());
    }
}
