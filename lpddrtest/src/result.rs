//! Result records produced by the sequencers.
//!
//! Every record is created once at the conclusion of a leaf test and then
//! only ever read — the result log is append-only and safe to snapshot
//! between steps.

use std::fmt;
use std::time::SystemTime;

use crate::classify::Outcome;

/// Which phase of the sequence produced a result.
///
/// A descriptive tag on results and the judgment engine's routing value;
/// the live sequencer state is implicit in its control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestStep {
    /// Frequency menu selection.
    FrequencySelect,
    /// 2D training.
    Training,
    /// Memory-access pattern test.
    MemoryTest,
    /// Simple write/read diagnostics.
    Diagnostics,
    /// Per-lane/per-bit eye-pattern diagnostics.
    EyePattern,
    /// Power cycle and retry.
    PowerCycle,
    /// Sequence finished.
    Complete,
}

impl fmt::Display for TestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FrequencySelect => "frequency_select",
            Self::Training => "training",
            Self::MemoryTest => "memory_test",
            Self::Diagnostics => "diagnostics",
            Self::EyePattern => "eye_pattern",
            Self::PowerCycle => "power_cycle",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Outcome of one leaf test.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestResult {
    /// Phase that produced this result.
    pub step: TestStep,
    /// Frequency under test in MHz (0 when not applicable).
    pub frequency: u32,
    /// Pattern id (0 when not applicable).
    pub pattern: u8,
    /// Classified outcome.
    pub outcome: Outcome,
    /// Free-text response the outcome was derived from.
    pub message: String,
    /// When the result was recorded.
    pub timestamp: SystemTime,
}

impl TestResult {
    /// Record a result now.
    pub fn new(
        step: TestStep,
        frequency: u32,
        pattern: u8,
        outcome: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step,
            frequency,
            pattern,
            outcome,
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Direction of an eye-pattern diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EyeDirection {
    /// Transmit-side eye.
    Tx,
    /// Receive-side eye.
    Rx,
}

impl fmt::Display for EyeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tx => "tx",
            Self::Rx => "rx",
        })
    }
}

/// One lane × bit × direction eye-pattern execution.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EyePatternResult {
    /// Data lane.
    pub lane: u8,
    /// Bit within the lane.
    pub bit: u8,
    /// TX or RX.
    pub direction: EyeDirection,
    /// Classified outcome.
    pub outcome: Outcome,
    /// Extracted timing value (0.0 when absent).
    pub timing: f64,
    /// Heuristic signal-quality score in `[0, 1]`.
    pub quality: f64,
    /// When the result was recorded.
    pub timestamp: SystemTime,
    /// Raw report text.
    pub raw_response: String,
}

/// Aggregate judgment over a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verdict {
    /// At least one memory test passed.
    Functional,
    /// Memory tests failed but diagnostics passed.
    Unstable,
    /// Nothing passed.
    NotFunctional,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Functional => "memory functional",
            Self::Unstable => "memory unstable",
            Self::NotFunctional => "memory not functional",
        })
    }
}
