//! Judgment over the accumulated result log.
//!
//! Pure functions only: the same log always yields the same answer, with
//! no side effects, so callers may re-evaluate at any point.

use crate::classify::Outcome;
use crate::result::{TestResult, TestStep, Verdict};

/// Frequency/pattern combinations whose PASS is diagnostically
/// interesting: the memory works at least partially, so a deeper
/// signal-quality look (eye pattern) is worthwhile.
const INTERESTING_PASSES: [(u32, u8); 4] = [(800, 1), (800, 15), (666, 1), (666, 15)];

/// Decide the next high-level step from the memory-test history.
///
/// No memory-test results at all means the memory loop never produced
/// anything to reason about; run diagnostics. A PASS on any interesting
/// frequency/pattern combination routes to eye-pattern analysis. All
/// other histories (including all-FAIL) route to diagnostics.
pub fn next_step(results: &[TestResult]) -> TestStep {
    let memory_results: Vec<&TestResult> = results
        .iter()
        .filter(|r| r.step == TestStep::MemoryTest)
        .collect();

    if memory_results.is_empty() {
        return TestStep::Diagnostics;
    }

    for result in &memory_results {
        if result.outcome == Outcome::Pass
            && INTERESTING_PASSES.contains(&(result.frequency, result.pattern))
        {
            return TestStep::EyePattern;
        }
    }

    TestStep::Diagnostics
}

/// Aggregate verdict over a completed run.
///
/// Any memory-test PASS makes the memory functional; failing memory with
/// passing diagnostics means unstable; nothing passing means the memory
/// is not functional.
pub fn overall(results: &[TestResult]) -> Verdict {
    let passed = |step: TestStep| {
        results
            .iter()
            .any(|r| r.step == step && r.outcome == Outcome::Pass)
    };

    if passed(TestStep::MemoryTest) {
        Verdict::Functional
    } else if passed(TestStep::Diagnostics) {
        Verdict::Unstable
    } else {
        Verdict::NotFunctional
    }
}
