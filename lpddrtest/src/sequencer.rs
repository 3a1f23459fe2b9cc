//! The main test sequencer.
//!
//! [`TestSequencer`] walks the firmware's menu tree as a scripted
//! operator: frequency selection, optional 2D training, the memory
//! pattern loop (or delegation to the eye-pattern sequencer), the simple
//! write/read diagnostics, and the final judgment. One sequencer owns
//! the console link exclusively for the duration of a run.
//!
//! Transitions are strictly forward except for the explicit
//! repeat-pattern loop; the live state is this module's control flow,
//! while [`TestStep`] tags results descriptively.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::classify::{self, Outcome};
use crate::config::{Config, DiagMode};
use crate::console::Console;
use crate::error::{Error, Result};
use crate::events::{EventSink, NullSink, Severity};
use crate::eye::EyePatternSequencer;
use crate::firmware::{self, keys, prompts};
use crate::judgment;
use crate::port::ConsolePort;
use crate::result::{EyePatternResult, TestResult, TestStep, Verdict};

/// Sub-timeout for one poll while draining an acknowledgement.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Sub-timeout for one poll while waiting for a pattern result.
const RESULT_POLL: Duration = Duration::from_millis(1000);

/// Per-operation deadlines, defaulting to the firmware constants.
///
/// Caller-overridable; tests drive the sequencer with millisecond
/// deadlines against a scripted port.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Connection handshake window.
    pub handshake: Duration,
    /// Generic prompt wait.
    pub prompt: Duration,
    /// Memory-pattern completion wait.
    pub command: Duration,
    /// Eye-pattern report wait.
    pub eye_pattern: Duration,
    /// Simple write/read diagnostics result wait.
    pub diagnostics: Duration,
    /// Drain window after the byte-count entry.
    pub byte_count_drain: Duration,
    /// Drain window for a pattern's input echo.
    pub pattern_echo: Duration,
    /// Delay between keystrokes.
    pub key_delay: Duration,
    /// Settle delay before/after menu entries that need one.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: firmware::HANDSHAKE_TIMEOUT,
            prompt: firmware::PROMPT_TIMEOUT,
            command: firmware::COMMAND_TIMEOUT,
            eye_pattern: firmware::EYE_PATTERN_TIMEOUT,
            diagnostics: firmware::DIAGNOSTICS_TIMEOUT,
            byte_count_drain: firmware::BYTE_COUNT_DRAIN,
            pattern_echo: firmware::PATTERN_ECHO_TIMEOUT,
            key_delay: firmware::INTER_KEY_DELAY,
            settle: Duration::from_secs(1),
        }
    }
}

/// Drives one full test sequence over a console link.
pub struct TestSequencer<P: ConsolePort> {
    config: Config,
    timeouts: Timeouts,
    console: Console<P>,
    sink: Arc<dyn EventSink>,
    results: Vec<TestResult>,
    eye_results: Vec<EyePatternResult>,
}

impl<P: ConsolePort> TestSequencer<P> {
    /// Create a sequencer over an open port.
    ///
    /// The configuration is validated here; an invalid one never reaches
    /// the firmware.
    pub fn new(config: Config, port: P) -> Result<Self> {
        config.validate()?;
        let timeouts = Timeouts {
            prompt: config.timeout,
            ..Timeouts::default()
        };
        Ok(Self {
            config,
            timeouts,
            console: Console::new(port),
            sink: Arc::new(NullSink),
            results: Vec::new(),
            eye_results: Vec::new(),
        })
    }

    /// Attach an event sink for log lines and status changes.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.console.set_sink(sink.clone());
        self.sink = sink;
        self
    }

    /// Override the per-operation deadlines.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// The append-only result log, safe to snapshot between steps.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Eye-pattern results recorded so far.
    pub fn eye_results(&self) -> &[EyePatternResult] {
        &self.eye_results
    }

    /// The configuration this sequencer runs with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Establish the console handshake.
    ///
    /// Flushes the link, sends Enter, and waits for the firmware's
    /// frequency-selection prompt. Failure here aborts the entire run.
    pub fn connect(&mut self) -> Result<()> {
        self.status("connecting");
        self.emit(
            Severity::Info,
            &format!("connecting to {}", self.console_name()),
        );

        self.console.clear_io()?;
        self.console.send_enter()?;

        match self
            .console
            .wait_for(prompts::READY, self.timeouts.handshake)
        {
            Ok(_) => {
                self.emit(Severity::Info, "connection established, firmware is ready");
                Ok(())
            },
            Err(Error::PromptTimeout { .. }) => Err(Error::Connection(format!(
                "no ready prompt from {} within {:?}",
                self.console_name(),
                self.timeouts.handshake
            ))),
            Err(e) => Err(e),
        }
    }

    /// Run the complete sequence: every configured frequency, the
    /// diagnostics pass, the judgment-driven follow-up, and the final
    /// verdict.
    pub fn run_full_sequence(&mut self) -> Result<Verdict> {
        self.connect()?;

        let frequencies = self.config.frequencies.clone();
        for (index, frequency) in frequencies.iter().enumerate() {
            self.check_cancelled()?;
            self.run_frequency(*frequency, index == 0)?;
        }

        self.check_cancelled()?;
        self.run_diagnostics()?;

        match judgment::next_step(&self.results) {
            TestStep::EyePattern => {
                self.emit(
                    Severity::Info,
                    "interesting PASS found, routing to eye-pattern analysis",
                );
                self.run_eye_analysis()?;
            },
            next => {
                debug!("judgment selected {next}, nothing further to run");
            },
        }

        let verdict = judgment::overall(&self.results);
        self.emit(Severity::Info, &format!("overall result: {verdict}"));
        self.status("complete");
        Ok(verdict)
    }

    /// Run the menu sequence for one frequency.
    fn run_frequency(&mut self, frequency: u32, first: bool) -> Result<()> {
        self.status(&format!("frequency {frequency} MHz"));
        self.emit(
            Severity::Info,
            &format!("starting frequency test at {frequency} MHz"),
        );

        // After the first frequency the firmware re-enters selection with
        // its menu banner; its exact timing is not predictable, so the
        // wait is best-effort.
        if !first {
            self.wait_optional(prompts::FREQUENCY_SELECT, "frequency banner")?;
        }

        let key = firmware::frequency_key(frequency).ok_or_else(|| {
            Error::validation("frequencies", format!("unsupported frequency {frequency}"))
        })?;
        self.console.clear_buffer();
        self.send_answer(&key.to_string())?;

        self.console
            .wait_for(prompts::PLL_LOCK, self.timeouts.prompt)?;
        debug!("PLL locked at {frequency} MHz");

        match self.select_training() {
            Ok(()) => {},
            Err(Error::PromptTimeout { .. }) => {
                self.emit(Severity::Warning, "2D training prompt not observed, continuing");
            },
            Err(e) => return Err(e),
        }

        self.console
            .wait_for(prompts::SELECT_TEST_MODE, self.timeouts.prompt)?;

        if self.config.enable_eye_pattern {
            return self.run_eye_delegate();
        }

        self.send_answer(keys::MEMORY_ACCESS_TEST)?;
        self.wait_optional(
            &format!("{}1", prompts::INPUT_ECHO),
            "memory test selection echo",
        )?;

        self.enter_byte_count()?;

        let patterns = self.config.test_patterns.clone();
        for pattern in &patterns {
            self.check_cancelled()?;
            let (outcome, message) = match self.run_pattern(frequency, *pattern, &patterns) {
                Ok(pair) => pair,
                Err(Error::PromptTimeout { buffer, .. }) => {
                    self.emit(
                        Severity::Warning,
                        &format!("pattern {pattern:02} timed out, recording UNKNOWN"),
                    );
                    (Outcome::Unknown, buffer)
                },
                Err(Error::EmptyResponse) => {
                    self.emit(
                        Severity::Warning,
                        &format!("pattern {pattern:02} produced no output, recording UNKNOWN"),
                    );
                    (Outcome::Unknown, String::new())
                },
                Err(e) => return Err(e),
            };
            self.results.push(TestResult::new(
                TestStep::MemoryTest,
                frequency,
                *pattern,
                outcome,
                message,
            ));
        }

        self.emit(
            Severity::Info,
            &format!("frequency {frequency} MHz test completed"),
        );
        Ok(())
    }

    /// Answer the 2D training menu.
    ///
    /// Enabled: request training and wait for its completion banner.
    /// Disabled: decline; the firmware emits no completion in that case.
    fn select_training(&mut self) -> Result<()> {
        self.console
            .wait_for(prompts::SELECT_2D_TRAINING, self.timeouts.prompt)?;

        if self.config.enable_2d_training {
            self.send_answer(keys::ENABLE_2D_TRAINING)?;
            self.emit(Severity::Info, "2D training enabled");
            self.console
                .wait_for(prompts::TRAINING_2D_COMPLETE, self.timeouts.prompt)?;
        } else {
            self.send_answer(keys::DISABLE_2D_TRAINING)?;
            self.emit(Severity::Info, "2D training disabled");
        }

        self.console
            .wait_for(&format!("{}0", prompts::INPUT_ECHO), self.timeouts.prompt)?;
        Ok(())
    }

    /// Enter the maximum test byte count and drain the firmware's
    /// acknowledgement, accepting either the echoed value or the
    /// test-start banner.
    fn enter_byte_count(&mut self) -> Result<()> {
        self.console
            .wait_for(prompts::SELECT_TEST_NUM, self.timeouts.prompt)?;
        self.console
            .wait_for(prompts::READY, self.timeouts.prompt)?;

        // The firmware needs a beat after printing the prompt before it
        // will accept input.
        thread::sleep(self.timeouts.settle);
        self.console.clear_io()?;

        let byte_count = firmware::MAX_TEST_BYTES.to_string();
        self.send_answer(&byte_count)?;

        let echo = format!("{}{}", prompts::INPUT_ECHO, firmware::MAX_TEST_BYTES);
        let deadline = Instant::now() + self.timeouts.byte_count_drain;
        loop {
            let buffer = self.console.buffer();
            if buffer.contains(&echo) || buffer.contains(prompts::START_MEMORY_TEST) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                self.emit(
                    Severity::Warning,
                    "timeout waiting for byte count acknowledgement",
                );
                break;
            }
            self.console.poll(DRAIN_POLL.min(deadline - now))?;
        }
        Ok(())
    }

    /// Run one memory pattern: entry, echo, result wait, classification,
    /// and the repeat/finish menu.
    fn run_pattern(
        &mut self,
        frequency: u32,
        pattern: u8,
        patterns: &[u8],
    ) -> Result<(Outcome, String)> {
        self.status(&format!("frequency {frequency} MHz pattern {pattern:02}"));
        self.emit(
            Severity::Info,
            &format!("frequency {frequency} MHz pattern {pattern:02} start"),
        );

        self.console.clear_buffer();
        self.send_answer(&format!("{pattern:02}"))?;

        // Input echo carries the decimal value, without zero padding.
        let echo = format!("{}{}", prompts::INPUT_ECHO, pattern);
        let deadline = Instant::now() + self.timeouts.pattern_echo;
        loop {
            if self.console.buffer().contains(&echo) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                self.emit(
                    Severity::Warning,
                    &format!("no input echo for pattern {pattern:02}"),
                );
                break;
            }
            self.console.poll(DRAIN_POLL.min(deadline - now))?;
        }

        // Wait for the verdict, classifying the accumulated buffer as
        // soon as a PASS/FAIL keyword shows up. Classification is logged
        // once; the loop still runs on to the repeat prompt, which is the
        // de-facto end-of-test signal.
        let mut classified: Option<Outcome> = None;
        let mut menu_seen = false;
        let deadline = Instant::now() + self.timeouts.command;
        loop {
            if classified.is_none() {
                if let Some(outcome) = classify::scan_outcome(self.console.buffer()) {
                    classified = Some(outcome);
                    self.emit(
                        Severity::Info,
                        &format!(
                            "frequency {frequency} MHz pattern {pattern:02} completed: {outcome}"
                        ),
                    );
                }
            }
            let buffer = self.console.buffer();
            if buffer.contains(prompts::REPEAT_MEMORY_TESTS)
                || buffer.contains(prompts::FINISH_MEMORY_TEST)
            {
                menu_seen = true;
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.console.poll(RESULT_POLL.min(deadline - now))?;
        }
        if !menu_seen {
            self.emit(
                Severity::Warning,
                &format!("timeout waiting for end-of-test menu for pattern {pattern:02}"),
            );
        }

        let message = self.console.buffer().to_string();
        let outcome = classify::classify(&message)?;

        // Repeat when any numerically greater configured id is still
        // pending, finish otherwise. This intentionally preserves the
        // firmware driver's historical behavior: the comparison is on id
        // value, not list position, so out-of-order pattern lists repeat
        // oddly. Kept as-is pending a decision from the board team.
        let remaining = patterns.iter().any(|p| *p > pattern);
        if remaining {
            self.send_answer(keys::REPEAT_TEST)?;
            thread::sleep(self.timeouts.settle);
            if !self.console.buffer().contains(prompts::READY) {
                self.wait_optional(prompts::READY, "next pattern prompt")?;
            }
        } else {
            self.send_answer(keys::END_TEST)?;
            thread::sleep(self.timeouts.settle);
            if self.wait_optional(prompts::TURN_OFF, "end-of-frequency prompt")? {
                self.console.send_enter()?;
                debug!("acknowledged end of frequency");
            }
        }

        Ok((outcome, message))
    }

    /// Run the simple write/read diagnostics and record its result.
    fn run_diagnostics(&mut self) -> Result<()> {
        self.check_cancelled()?;
        self.status("diagnostics");
        self.emit(Severity::Info, "starting simple write/read diagnostics");

        self.console
            .wait_for(prompts::SELECT_TEST_MODE, self.timeouts.prompt)?;
        self.send_answer(keys::DIAGNOSTICS_TEST)?;

        self.console
            .wait_for(prompts::MODE_SELECT, self.timeouts.prompt)?;
        self.send_answer(keys::SIMPLE_WRITE_READ)?;

        self.console
            .wait_for(prompts::SET_DIAG_ADDR_LOW, self.timeouts.prompt)?;
        self.send_answer(firmware::DIAG_ADDR_LOW)?;

        self.console
            .wait_for(prompts::SET_DIAG_ADDR_HIGH, self.timeouts.prompt)?;
        self.send_answer(firmware::DIAG_ADDR_HIGH)?;

        self.console
            .wait_for(prompts::SET_LOOP_COUNT, self.timeouts.prompt)?;
        self.console.clear_buffer();
        self.send_answer(firmware::DIAG_LOOP_COUNT)?;

        let deadline = Instant::now() + self.timeouts.diagnostics;
        loop {
            if self.console.buffer().contains(prompts::REPEAT_DIAGNOSTICS) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.console.poll(RESULT_POLL.min(deadline - now))?;
        }

        let message = self.console.buffer().to_string();
        let outcome = match classify::classify(&message) {
            Ok(outcome) => outcome,
            Err(Error::EmptyResponse) => {
                self.emit(Severity::Warning, "diagnostics produced no output");
                Outcome::Unknown
            },
            Err(e) => return Err(e),
        };
        self.emit(Severity::Info, &format!("diagnostics result: {outcome}"));
        self.results.push(TestResult::new(
            TestStep::Diagnostics,
            0,
            0,
            outcome,
            message,
        ));

        if self.console.buffer().contains(prompts::REPEAT_DIAGNOSTICS)
            || self.wait_optional(prompts::REPEAT_DIAGNOSTICS, "diagnostics menu")?
        {
            self.send_answer(keys::END_TEST)?;
        }
        Ok(())
    }

    /// Delegate the remainder of a frequency's work to the eye-pattern
    /// sequencer (or the simple diagnostic when so configured).
    fn run_eye_delegate(&mut self) -> Result<()> {
        if self.config.eye.diag_mode == DiagMode::Simple {
            return self.run_diagnostics();
        }

        let results = EyePatternSequencer::new(
            &mut self.console,
            &self.config.eye,
            &self.timeouts,
            self.sink.clone(),
        )
        .run()?;
        self.eye_results.extend(results);
        Ok(())
    }

    /// Judgment-driven eye-pattern follow-up after the diagnostics pass.
    fn run_eye_analysis(&mut self) -> Result<()> {
        if !self.config.enable_eye_pattern {
            self.emit(Severity::Info, "eye pattern disabled in configuration");
            return Ok(());
        }
        self.status("eye pattern analysis");
        let results = EyePatternSequencer::new(
            &mut self.console,
            &self.config.eye,
            &self.timeouts,
            self.sink.clone(),
        )
        .run()?;
        self.emit(
            Severity::Info,
            &format!("eye pattern analysis completed: {} tests", results.len()),
        );
        self.eye_results.extend(results);
        Ok(())
    }

    /// Send a numeric answer keystroke-at-a-time and echo it to the sink
    /// the way the firmware's own prompt displays it.
    fn send_answer(&mut self, answer: &str) -> Result<()> {
        self.console.send_keys(answer, self.timeouts.key_delay)?;
        self.sink.log_line(
            &format!("{}:{answer}", prompts::READY),
            Severity::Serial,
        );
        Ok(())
    }

    /// Wait for a prompt whose exact timing the firmware does not
    /// guarantee. A timeout is logged as a warning and reported as
    /// `false`; I/O errors still propagate.
    fn wait_optional(&mut self, pattern: &str, context: &str) -> Result<bool> {
        match self.console.wait_for(pattern, self.timeouts.prompt) {
            Ok(_) => Ok(true),
            Err(Error::PromptTimeout { .. }) => {
                self.emit(
                    Severity::Warning,
                    &format!("{context}: prompt {pattern:?} not observed"),
                );
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if crate::is_interrupt_requested() {
            self.emit(Severity::Warning, "run cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn console_name(&self) -> String {
        self.config.port.clone()
    }

    fn emit(&self, severity: Severity, text: &str) {
        match severity {
            Severity::Debug => debug!("{text}"),
            Severity::Info => info!("{text}"),
            Severity::Warning => warn!("{text}"),
            Severity::Error => error!("{text}"),
            Severity::Serial => trace!("{text}"),
        }
        self.sink.log_line(text, severity);
    }

    fn status(&self, description: &str) {
        debug!("step: {description}");
        self.sink.status_change(description);
    }
}

// Native-specific recovery: a power cycle kills the console link, so the
// rebuild needs to reopen a real port.
mod native_impl {
    use super::{Error, Result, TestSequencer, thread};
    use crate::console::Console;
    use crate::port::{LinkSettings, NativePort};
    use crate::power::{PowerController, RECONNECT_DELAY};

    impl TestSequencer<NativePort> {
        /// Open the console port named by `config` and build a sequencer.
        pub fn open(config: crate::config::Config) -> Result<Self> {
            config.validate()?;
            let settings = LinkSettings::new(&config.port, config.baud_rate);
            let port = NativePort::open(&settings)?;
            Self::new(config, port)
        }

        /// Cycle board power and rebuild the console link from scratch.
        ///
        /// Only invoked on explicit request; requires power control to be
        /// configured.
        pub fn power_cycle_and_reconnect(&mut self) -> Result<()> {
            let settings = self
                .config
                .power_control
                .clone()
                .ok_or_else(|| Error::PowerControl("power control is not configured".into()))?;

            self.status("power cycle");
            let power_port = NativePort::open_simple(&settings.port, settings.baud_rate)
                .map_err(|e| {
                    Error::PowerControl(format!("cannot open control channel: {e}"))
                })?;
            let mut controller = PowerController::new(power_port);
            controller.cycle()?;
            controller.close()?;

            // Full teardown and rebuild, never in-place repair.
            use crate::port::ConsolePort as _;
            self.console.port_mut().close()?;
            thread::sleep(RECONNECT_DELAY);

            let link = LinkSettings::new(&self.config.port, self.config.baud_rate);
            let port = NativePort::open(&link)?;
            let mut console = Console::new(port);
            console.set_sink(self.sink.clone());
            self.console = console;
            self.connect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EyeTestMode;
    use crate::testutil::ScriptedPort;

    fn fast_timeouts() -> Timeouts {
        Timeouts {
            handshake: Duration::from_millis(100),
            prompt: Duration::from_millis(50),
            command: Duration::from_millis(100),
            eye_pattern: Duration::from_millis(50),
            diagnostics: Duration::from_millis(50),
            byte_count_drain: Duration::from_millis(50),
            pattern_echo: Duration::from_millis(50),
            key_delay: Duration::ZERO,
            settle: Duration::from_millis(1),
        }
    }

    fn sequencer(config: Config, chunks: &[&str]) -> TestSequencer<ScriptedPort> {
        TestSequencer::new(config, ScriptedPort::with_text(chunks))
            .unwrap()
            .with_timeouts(fast_timeouts())
    }

    /// Script of a complete single-frequency run: patterns 01 (PASS) and
    /// 15 (FAIL), then a passing simple write/read diagnostic.
    fn happy_path_script() -> Vec<&'static str> {
        vec![
            // handshake
            "LPDDR4 bring-up\r\nPlease Hit number key:",
            // frequency selection
            "PLL LOCK 800MHz\r\n",
            "select 2D training mode\r\n",
            "input out_value : dec:0\r\n",
            // test mode
            "select test mode\r\n",
            "input out_value : dec:1\r\n",
            // byte count
            "select test_num\r\n",
            "Please Hit number key:",
            "input out_value : dec:2147483648\r\nStart Memory Access test\r\n",
            // pattern 01
            "input out_value : dec:1\r\n",
            "Memory Access Test PASS\r\n",
            "Repeat memory tests? 1:Repeat 0:Finish\r\n",
            "Please Hit number key:",
            // pattern 15
            "input out_value : dec:15\r\n",
            "Memory Access Test FAIL\r\nRepeat memory tests? 1:Repeat 0:Finish\r\n",
            "Finish Memory Access test\r\n#### Please Turn-OFF SW1-1, and Hit Enter Key:",
            // diagnostics
            "select test mode\r\n",
            "ModeSelect 1:TX 2:RX 0:Simple\r\n",
            "Set DiagAddrLow\r\n",
            "Set DiagAddrHigh\r\n",
            "Set the loop count\r\n",
            "Simple Write Read TEST PASS\r\nRepeat diagnostics? :\r\n",
        ]
    }

    #[test]
    fn test_full_sequence_happy_path() {
        let config = Config::new("scripted").with_frequencies(vec![800]);
        let mut seq = sequencer(config, &happy_path_script());

        let verdict = seq.run_full_sequence().unwrap();
        assert_eq!(verdict, Verdict::Functional);

        // Exactly one result per pattern, in order, plus the diagnostic.
        let results = seq.results();
        assert_eq!(results.len(), 3);
        assert_eq!(
            (results[0].frequency, results[0].pattern, results[0].outcome),
            (800, 1, Outcome::Pass)
        );
        assert_eq!(
            (results[1].frequency, results[1].pattern, results[1].outcome),
            (800, 15, Outcome::Fail)
        );
        assert_eq!(results[2].step, TestStep::Diagnostics);
        assert_eq!(results[2].outcome, Outcome::Pass);
    }

    #[test]
    fn test_full_sequence_sends_expected_keystrokes() {
        let config = Config::new("scripted").with_frequencies(vec![800]);
        let mut seq = sequencer(config, &happy_path_script());
        seq.run_full_sequence().unwrap();

        let written = seq.console.port_mut().written_string();
        // Handshake Enter, then frequency 800 as menu key 4; byte count
        // and both patterns go out as individual keystrokes, so the full
        // digit strings appear in order.
        assert!(written.starts_with("\r\n4"));
        assert!(written.contains("2147483648"));
        assert!(written.contains("01"));
        assert!(written.contains("15"));
        // Diagnostics addresses and loop count follow the patterns.
        assert!(written.contains("0000"));
        assert!(written.contains("03ff"));
        // The run ends by leaving the diagnostics menu.
        assert!(written.ends_with('0'));
    }

    #[test]
    fn test_pattern_timeout_records_unknown_and_continues() {
        let config = Config::new("scripted")
            .with_frequencies(vec![800])
            .with_patterns(vec![1]);
        // Script stops after the pattern echo: no verdict, no menus.
        let script = vec![
            "Please Hit number key:",
            "PLL LOCK 800MHz\r\n",
            "select 2D training mode\r\n",
            "input out_value : dec:0\r\n",
            "select test mode\r\n",
            "input out_value : dec:1\r\n",
            "select test_num\r\n",
            "Please Hit number key:",
            "input out_value : dec:2147483648\r\n",
            "input out_value : dec:1\r\n",
        ];
        let mut seq = sequencer(config, &script);

        // Diagnostics can never start, so the run ultimately fails, but
        // the timed-out pattern must still be on record as UNKNOWN.
        let err = seq.run_full_sequence().unwrap_err();
        assert!(matches!(err, Error::PromptTimeout { .. }));

        let results = seq.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pattern, 1);
        assert_eq!(results[0].outcome, Outcome::Unknown);
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        let config = Config::new("scripted");
        let mut seq = sequencer(config, &["no prompt here"]);
        let err = seq.connect().unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_connect_succeeds_on_ready_prompt() {
        let config = Config::new("scripted");
        let mut seq = sequencer(config, &["boot\r\nPlease Hit number key:"]);
        seq.connect().unwrap();
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = Config::new("scripted").with_patterns(vec![]);
        match TestSequencer::new(config, ScriptedPort::with_text(&[])) {
            Ok(_) => panic!("expected a validation error"),
            Err(err) => assert!(matches!(err, Error::Validation { .. })),
        }
    }

    #[test]
    fn test_eye_pattern_delegation_skips_memory_loop() {
        let mut config = Config::new("scripted").with_frequencies(vec![800]);
        config.enable_eye_pattern = true;
        config.eye.test_mode = EyeTestMode::TxOnly;

        let script = vec![
            "Please Hit number key:",
            "PLL LOCK 800MHz\r\n",
            "select 2D training mode\r\n",
            "input out_value : dec:0\r\n",
            "select test mode\r\n",
            // eye pattern sub-protocol (TX only)
            "ModeSelect 1:TX 2:RX 0:Simple\r\n",
            "Selectlane\r\n",
            "Selectbit\r\n",
            "Set DiagAddrLow\r\n",
            "Eye pattern test complete. Timing: 2.5ns margin ok TEST PASS\r\n",
            "Repeat diagnostics? :\r\n",
            // post-frequency diagnostics pass
            "select test mode\r\n",
            "ModeSelect 1:TX 2:RX 0:Simple\r\n",
            "Set DiagAddrLow\r\n",
            "Set DiagAddrHigh\r\n",
            "Set the loop count\r\n",
            "Simple Write Read TEST FAIL\r\nRepeat diagnostics? :\r\n",
        ];
        let mut seq = sequencer(config, &script);
        seq.run_full_sequence().unwrap();

        // No memory-test results; one eye result instead.
        assert!(seq.results().iter().all(|r| r.step != TestStep::MemoryTest));
        assert_eq!(seq.eye_results().len(), 1);
        let eye = &seq.eye_results()[0];
        assert_eq!(eye.outcome, Outcome::Pass);
        assert!(eye.quality > 0.5);
        assert!((eye.timing - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_training_enabled_waits_for_completion() {
        let mut config = Config::new("scripted")
            .with_frequencies(vec![666])
            .with_patterns(vec![1]);
        config.enable_2d_training = true;

        let script = vec![
            "Please Hit number key:",
            "PLL LOCK 666MHz\r\n",
            "select 2D training mode\r\n",
            "2D Training Complete\r\ninput out_value : dec:0\r\n",
            "select test mode\r\n",
            "input out_value : dec:1\r\n",
            "select test_num\r\n",
            "Please Hit number key:",
            "Start Memory Access test\r\n",
            "input out_value : dec:1\r\n",
            "Memory Access Test PASS\r\nRepeat memory tests?\r\n",
            "Finish Memory Access test\r\n#### Please Turn-OFF SW1-1, and Hit Enter Key:",
            "select test mode\r\n",
            "ModeSelect\r\n",
            "Set DiagAddrLow\r\n",
            "Set DiagAddrHigh\r\n",
            "Set the loop count\r\n",
            "TEST PASS\r\nRepeat diagnostics?\r\n",
        ];
        let mut seq = sequencer(config, &script);
        let verdict = seq.run_full_sequence().unwrap();
        assert_eq!(verdict, Verdict::Functional);

        // The training-enable keystroke went out.
        let written = seq.console.port_mut().written_string();
        assert!(written.contains('1'));
    }
}
