//! Free-text response classification and signal-quality scoring.
//!
//! The firmware reports results as human-readable prose, not a structured
//! format. [`classify`] maps a response to PASS/FAIL/UNKNOWN by ordered
//! keyword search; [`score_quality`] condenses an eye-pattern report into
//! a continuous score; [`extract_timing`] digs a timing figure out of the
//! text when one is present. All three are deterministic pure functions.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Tri-state outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// A PASS keyword was found.
    Pass,
    /// A FAIL keyword was found (and no PASS keyword).
    Fail,
    /// Neither keyword matched, or the wait timed out.
    ///
    /// Never coerced to [`Outcome::Fail`]; an unreadable result is not a
    /// failed one.
    Unknown,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// PASS keywords, most specific first. Checked before any FAIL keyword:
/// the firmware's own messages put the specific verdict ahead of generic
/// wording, so a PASS phrase anywhere wins even alongside FAIL tokens.
const PASS_PATTERNS: [&str; 3] = ["MEMORY ACCESS TEST PASS", "TEST PASS", "PASS"];

/// FAIL keywords, most specific first.
const FAIL_PATTERNS: [&str; 3] = ["MEMORY ACCESS TEST FAIL", "TEST FAIL", "FAIL"];

/// Keywords that raise the quality score.
const SUCCESS_KEYWORDS: [&str; 6] = [
    "successfully",
    "pass",
    "complete",
    "eye pattern",
    "timing",
    "margin",
];

/// Keywords that lower the quality score.
const ERROR_KEYWORDS: [&str; 6] = [
    "error",
    "fail",
    "timeout",
    "invalid",
    "abort",
    "below threshold",
];

/// Lower bound of a plausible timing figure.
const TIMING_MIN: f64 = 0.1;

/// Upper bound of a plausible timing figure.
const TIMING_MAX: f64 = 1_000_000.0;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("invalid number regex"));

static LABELED_TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:timing|latency|delay)\s*[:=]?\s*(\d+(?:\.\d+)?)")
        .expect("invalid labeled timing regex")
});

static UNIT_TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:ns|us|ms)\b").expect("invalid unit timing regex")
});

/// Classify a response as PASS, FAIL or UNKNOWN.
///
/// An empty response is a contract violation ([`Error::EmptyResponse`]),
/// not an UNKNOWN result.
pub fn classify(text: &str) -> Result<Outcome> {
    if text.is_empty() {
        return Err(Error::EmptyResponse);
    }

    let upper = text.to_uppercase();

    for pattern in PASS_PATTERNS {
        if upper.contains(pattern) {
            return Ok(Outcome::Pass);
        }
    }

    for pattern in FAIL_PATTERNS {
        if upper.contains(pattern) {
            return Ok(Outcome::Fail);
        }
    }

    Ok(Outcome::Unknown)
}

/// Scan a buffer for a verdict without treating its absence as final.
///
/// Used by the pattern loop to classify mid-stream: `None` means no
/// verdict keyword has arrived yet.
pub fn scan_outcome(text: &str) -> Option<Outcome> {
    match classify(text) {
        Ok(Outcome::Unknown) | Err(_) => None,
        Ok(outcome) => Some(outcome),
    }
}

/// Heuristic signal-quality score in `[0, 1]` for an eye-pattern report.
///
/// A weighted keyword sum, with a bonus for a plausible timing number and
/// for a substantive payload length. Necessarily fuzzy; consumers that
/// need a boolean apply a 0.5 threshold.
pub fn score_quality(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let lower = text.to_lowercase();
    let mut score: f64 = 0.5;

    for keyword in SUCCESS_KEYWORDS {
        if lower.contains(keyword) {
            score += 0.1;
        }
    }

    for keyword in ERROR_KEYWORDS {
        if lower.contains(keyword) {
            score -= 0.15;
        }
    }

    if numeric_tokens(text).any(|v| (TIMING_MIN..=TIMING_MAX).contains(&v)) {
        score += 0.1;
    }

    if text.len() > 100 {
        score += 0.05;
    } else if text.len() < 20 {
        score -= 0.1;
    }

    score.clamp(0.0, 1.0)
}

/// Extract a timing figure from a report.
///
/// Priority order: a labeled field (`timing:`, `latency:`, `delay:`), a
/// unit-suffixed number (ns/us/ms), then the first bare number in the
/// plausible range. Returns 0.0 when nothing qualifies.
pub fn extract_timing(text: &str) -> f64 {
    for re in [&*LABELED_TIMING_RE, &*UNIT_TIMING_RE] {
        if let Some(caps) = re.captures(text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                return value;
            }
        }
    }

    numeric_tokens(text)
        .find(|v| (TIMING_MIN..=TIMING_MAX).contains(v))
        .unwrap_or(0.0)
}

fn numeric_tokens(text: &str) -> impl Iterator<Item = f64> + '_ {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
}
