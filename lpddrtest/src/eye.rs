//! Per-lane/per-bit eye-pattern diagnostics.
//!
//! A nested sub-protocol reached from the firmware's test-mode menu:
//! diagnostics → TX/RX sub-mode → lane → bit → low address → report.
//! The report is free text; it is classified and scored heuristically
//! rather than parsed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::classify::{self, Outcome};
use crate::config::{DiagMode, EyeConfig, EyeTestMode};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::events::{EventSink, Severity};
use crate::firmware::{self, keys, prompts};
use crate::port::ConsolePort;
use crate::result::{EyeDirection, EyePatternResult};
use crate::sequencer::Timeouts;

/// Sub-timeout for one poll while capturing a report.
const CAPTURE_POLL: Duration = Duration::from_millis(1000);

/// Drives eye-pattern diagnostics over a console borrowed from the main
/// sequencer.
pub struct EyePatternSequencer<'a, P: ConsolePort> {
    console: &'a mut Console<P>,
    eye: &'a EyeConfig,
    timeouts: &'a Timeouts,
    sink: Arc<dyn EventSink>,
}

impl<'a, P: ConsolePort> EyePatternSequencer<'a, P> {
    /// Borrow the console and configuration for one eye-pattern pass.
    pub fn new(
        console: &'a mut Console<P>,
        eye: &'a EyeConfig,
        timeouts: &'a Timeouts,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            console,
            eye,
            timeouts,
            sink,
        }
    }

    /// Run the configured directions at the default lane and bit.
    ///
    /// A direction that fails on a menu prompt is logged and skipped so
    /// the complementary direction still gets its chance.
    pub fn run(&mut self) -> Result<Vec<EyePatternResult>> {
        let directions: &[EyeDirection] = match self.eye.test_mode {
            EyeTestMode::TxOnly => &[EyeDirection::Tx],
            EyeTestMode::RxOnly => &[EyeDirection::Rx],
            EyeTestMode::Both => {
                if self.eye.chain_tx_to_rx {
                    &[EyeDirection::Tx, EyeDirection::Rx]
                } else {
                    &[EyeDirection::Tx]
                }
            },
        };

        let mut results = Vec::new();
        for direction in directions {
            if crate::is_interrupt_requested() {
                return Err(Error::Cancelled);
            }
            match self.run_single(*direction, self.eye.default_lane, self.eye.default_bit) {
                Ok(result) => results.push(result),
                Err(Error::PromptTimeout { pattern, .. }) => {
                    let text =
                        format!("{direction} eye pattern skipped: prompt {pattern:?} not observed");
                    warn!("{text}");
                    self.sink.log_line(&text, Severity::Warning);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Run one direction × lane × bit eye-pattern test.
    pub fn run_single(
        &mut self,
        direction: EyeDirection,
        lane: u8,
        bit: u8,
    ) -> Result<EyePatternResult> {
        let label = format!("{direction} eye pattern lane {lane} bit {bit}");
        info!("starting {label}");
        self.sink.status_change(&label);

        self.console
            .wait_for(prompts::SELECT_TEST_MODE, self.timeouts.prompt)?;
        self.send_answer(keys::DIAGNOSTICS_TEST)?;

        self.console
            .wait_for(prompts::MODE_SELECT, self.timeouts.prompt)?;
        let mode_key = match (self.eye.diag_mode, direction) {
            (DiagMode::Simple, _) => keys::SIMPLE_WRITE_READ,
            (_, EyeDirection::Tx) => keys::TX_EYE_PATTERN,
            (_, EyeDirection::Rx) => keys::RX_EYE_PATTERN,
        };
        self.send_answer(mode_key)?;

        self.console
            .wait_for(prompts::SELECT_LANE, self.timeouts.prompt)?;
        self.send_answer(&format!("{lane:02}"))?;

        self.console
            .wait_for(prompts::SELECT_BIT, self.timeouts.prompt)?;
        self.send_answer(&format!("{bit:02}"))?;

        self.console
            .wait_for(prompts::SET_DIAG_ADDR_LOW, self.timeouts.prompt)?;
        self.console.clear_buffer();
        self.send_answer(&self.eye.addr_low.clone())?;

        // Capture everything up to a known completion phrase as the raw
        // report.
        let deadline = Instant::now() + self.timeouts.eye_pattern;
        let mut timed_out = false;
        loop {
            if report_complete(self.console.buffer()) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break;
            }
            self.console.poll(CAPTURE_POLL.min(deadline - now))?;
        }

        let raw = self.console.take_buffer();
        if raw.trim().is_empty() {
            // Nothing arrived at all: a hard failure, not a poor result.
            return Err(Error::PromptTimeout {
                pattern: "eye pattern report".to_string(),
                buffer: raw,
            });
        }
        if timed_out {
            let text = format!("{label}: report incomplete, scoring partial data");
            warn!("{text}");
            self.sink.log_line(&text, Severity::Warning);
        }

        let outcome = classify::classify(&raw).unwrap_or(Outcome::Unknown);
        let quality = classify::score_quality(&raw);
        let timing = classify::extract_timing(&raw);

        let text = format!("{label}: {outcome} (quality {quality:.2}, timing {timing})");
        info!("{text}");
        self.sink.log_line(&text, Severity::Info);

        // Leave the diagnostics menu so the next run starts from the
        // test-mode prompt.
        match self
            .console
            .wait_for(prompts::REPEAT_DIAGNOSTICS, self.timeouts.prompt)
        {
            Ok(_) => self.send_answer(keys::END_TEST)?,
            Err(Error::PromptTimeout { .. }) => {
                debug!("repeat diagnostics prompt not observed after {label}");
            },
            Err(e) => return Err(e),
        }

        Ok(EyePatternResult {
            lane,
            bit,
            direction,
            outcome,
            timing,
            quality,
            timestamp: std::time::SystemTime::now(),
            raw_response: raw,
        })
    }

    fn send_answer(&mut self, answer: &str) -> Result<()> {
        self.console.send_keys(answer, self.timeouts.key_delay)?;
        self.sink.log_line(
            &format!("{}:{answer}", prompts::READY),
            Severity::Serial,
        );
        Ok(())
    }
}

/// Whether the buffer contains any known end-of-report phrase.
fn report_complete(buffer: &str) -> bool {
    let lower = buffer.to_lowercase();
    firmware::EYE_COMPLETION_PHRASES
        .iter()
        .any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::testutil::ScriptedPort;

    fn fast_timeouts() -> Timeouts {
        Timeouts {
            prompt: Duration::from_millis(50),
            eye_pattern: Duration::from_millis(50),
            key_delay: Duration::ZERO,
            ..Timeouts::default()
        }
    }

    fn run_eye(
        eye: &EyeConfig,
        chunks: &[&str],
    ) -> (Result<Vec<EyePatternResult>>, Console<ScriptedPort>) {
        let mut console = Console::new(ScriptedPort::with_text(chunks));
        let timeouts = fast_timeouts();
        let result = EyePatternSequencer::new(&mut console, eye, &timeouts, Arc::new(NullSink))
            .run();
        (result, console)
    }

    fn tx_script() -> Vec<&'static str> {
        vec![
            "select test mode\r\n",
            "ModeSelect 1:TX 2:RX 0:Simple\r\n",
            "Selectlane\r\n",
            "Selectbit\r\n",
            "Set DiagAddrLow\r\n",
            "Eye pattern test complete. Timing: 3.1ns TEST PASS\r\n",
            "Repeat diagnostics? :\r\n",
        ]
    }

    #[test]
    fn test_tx_only_runs_one_direction() {
        let eye = EyeConfig {
            test_mode: EyeTestMode::TxOnly,
            ..EyeConfig::default()
        };
        let (result, _) = run_eye(&eye, &tx_script());
        let results = result.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].direction, EyeDirection::Tx);
        assert_eq!(results[0].outcome, Outcome::Pass);
        assert!((results[0].timing - 3.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_both_without_chaining_stops_after_tx() {
        let eye = EyeConfig {
            test_mode: EyeTestMode::Both,
            chain_tx_to_rx: false,
            ..EyeConfig::default()
        };
        let (result, _) = run_eye(&eye, &tx_script());
        let results = result.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].direction, EyeDirection::Tx);
    }

    #[test]
    fn test_chained_run_covers_tx_then_rx() {
        let eye = EyeConfig::default(); // Both + chaining
        let mut script = tx_script();
        script.extend([
            "select test mode\r\n",
            "ModeSelect 1:TX 2:RX 0:Simple\r\n",
            "Selectlane\r\n",
            "Selectbit\r\n",
            "Set DiagAddrLow\r\n",
            "Eye pattern test complete. TEST FAIL below threshold\r\n",
            "Repeat diagnostics? :\r\n",
        ]);
        let (result, _) = run_eye(&eye, &script);
        let results = result.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].direction, EyeDirection::Tx);
        assert_eq!(results[1].direction, EyeDirection::Rx);
        assert_eq!(results[1].outcome, Outcome::Fail);
        assert!(results[1].quality < results[0].quality);
    }

    #[test]
    fn test_partial_report_is_scored_best_effort() {
        // The report never reaches a completion phrase, but data did
        // arrive: score it rather than fail.
        let eye = EyeConfig {
            test_mode: EyeTestMode::TxOnly,
            ..EyeConfig::default()
        };
        let script = vec![
            "select test mode\r\n",
            "ModeSelect\r\n",
            "Selectlane\r\n",
            "Selectbit\r\n",
            "Set DiagAddrLow\r\n",
            "lane data 0.42 0.58 margin\r\n",
        ];
        let (result, _) = run_eye(&eye, &script);
        let results = result.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, Outcome::Unknown);
        assert!(results[0].quality > 0.0);
    }

    #[test]
    fn test_menu_timeout_skips_direction() {
        // No prompts at all: the direction is skipped, not fatal.
        let eye = EyeConfig {
            test_mode: EyeTestMode::TxOnly,
            ..EyeConfig::default()
        };
        let (result, _) = run_eye(&eye, &["noise"]);
        let results = result.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_keystrokes_sent_for_lane_bit_and_address() {
        let eye = EyeConfig {
            test_mode: EyeTestMode::TxOnly,
            default_lane: 2,
            default_bit: 5,
            ..EyeConfig::default()
        };
        let (result, mut console) = run_eye(&eye, &tx_script());
        result.unwrap();

        let written = console.port_mut().written_string();
        // diag menu, TX sub-mode, lane 02, bit 05, address, end test
        assert_eq!(written, "01020500000");
    }

    #[test]
    fn test_report_complete_phrases() {
        assert!(report_complete("... Eye Pattern Test Complete ..."));
        assert!(report_complete("Repeat diagnostics?"));
        assert!(report_complete("MEMORY ACCESS TEST PASS"));
        assert!(!report_complete("still sweeping lane 3"));
    }
}
