//! Test run configuration.
//!
//! A [`Config`] is fully populated with defaults at construction and
//! checked once by [`Config::validate`] before a sequencer will accept
//! it. There are no runtime fallbacks: an illegal value is a
//! [`crate::Error::Validation`] naming the field, not a silent default.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::firmware;

/// Diagnostics sub-mode for eye-pattern runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagMode {
    /// Transmit-side eye pattern.
    #[default]
    Tx,
    /// Receive-side eye pattern.
    Rx,
    /// Simple write/read instead of an eye pattern.
    Simple,
}

/// Which directions an eye-pattern run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EyeTestMode {
    /// TX only.
    TxOnly,
    /// RX only.
    RxOnly,
    /// TX, then RX (subject to the chaining policy).
    #[default]
    Both,
}

/// Eye-pattern diagnostic settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EyeConfig {
    /// Default data lane.
    pub default_lane: u8,
    /// Default bit within the lane.
    pub default_bit: u8,
    /// Low diagnostic address, 4 hex digits.
    pub addr_low: String,
    /// Diagnostics sub-mode.
    pub diag_mode: DiagMode,
    /// Whether a TX run chains into the complementary RX run.
    pub chain_tx_to_rx: bool,
    /// Overall direction coverage.
    pub test_mode: EyeTestMode,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            default_lane: 0,
            default_bit: 0,
            addr_low: firmware::DIAG_ADDR_LOW.to_string(),
            diag_mode: DiagMode::default(),
            chain_tx_to_rx: true,
            test_mode: EyeTestMode::default(),
        }
    }
}

/// Power-control channel settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerSettings {
    /// Serial port of the power controller.
    pub port: String,
    /// Baud rate of the power controller (typically 9600).
    pub baud_rate: u32,
}

impl PowerSettings {
    /// Settings for a controller on `port` at the conventional 9600 baud.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 9600,
        }
    }
}

/// Configuration for one full test sequence.
///
/// Owned by the caller and read-only to the sequencer for the duration
/// of a run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Serial port of the board console.
    pub port: String,
    /// Console baud rate.
    pub baud_rate: u32,
    /// Generic prompt-wait timeout.
    pub timeout: Duration,
    /// Frequencies to test, in order, in MHz.
    pub frequencies: Vec<u32>,
    /// Pattern ids to run at each frequency.
    pub test_patterns: Vec<u8>,
    /// Run 2D training after frequency selection.
    pub enable_2d_training: bool,
    /// Run eye-pattern diagnostics instead of the memory-pattern loop.
    pub enable_eye_pattern: bool,
    /// Power controller on a secondary channel, when present.
    pub power_control: Option<PowerSettings>,
    /// Eye-pattern settings.
    pub eye: EyeConfig,
}

impl Config {
    /// Configuration with defaults for the given console port.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 115200,
            timeout: firmware::PROMPT_TIMEOUT,
            frequencies: vec![800, 666],
            test_patterns: vec![1, 15],
            enable_2d_training: false,
            enable_eye_pattern: false,
            power_control: None,
            eye: EyeConfig::default(),
        }
    }

    /// Set the frequencies to test.
    #[must_use]
    pub fn with_frequencies(mut self, frequencies: Vec<u32>) -> Self {
        self.frequencies = frequencies;
        self
    }

    /// Set the pattern ids to run.
    #[must_use]
    pub fn with_patterns(mut self, patterns: Vec<u8>) -> Self {
        self.test_patterns = patterns;
        self
    }

    /// Check every field once; returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(Error::validation("port", "port name is empty"));
        }

        if !firmware::SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(Error::validation(
                "baud_rate",
                format!(
                    "unsupported baud rate {} (supported: {:?})",
                    self.baud_rate,
                    firmware::SUPPORTED_BAUD_RATES
                ),
            ));
        }

        if self.timeout.is_zero() {
            return Err(Error::validation("timeout", "timeout must be positive"));
        }

        if self.frequencies.is_empty() {
            return Err(Error::validation("frequencies", "frequency list is empty"));
        }
        for freq in &self.frequencies {
            if firmware::frequency_key(*freq).is_none() {
                return Err(Error::validation(
                    "frequencies",
                    format!("unsupported frequency {freq} MHz"),
                ));
            }
        }

        if self.test_patterns.is_empty() {
            return Err(Error::validation("test_patterns", "pattern list is empty"));
        }
        for pattern in &self.test_patterns {
            if *pattern > 99 {
                return Err(Error::validation(
                    "test_patterns",
                    format!("pattern id {pattern} out of range 0..=99"),
                ));
            }
        }

        if let Some(power) = &self.power_control {
            if power.port.trim().is_empty() {
                return Err(Error::validation(
                    "power_control.port",
                    "power control port name is empty",
                ));
            }
        }

        self.eye.validate()
    }
}

impl EyeConfig {
    fn validate(&self) -> Result<()> {
        if self.default_lane >= firmware::MAX_LANES {
            return Err(Error::validation(
                "eye.default_lane",
                format!(
                    "lane {} out of range 0..{}",
                    self.default_lane,
                    firmware::MAX_LANES
                ),
            ));
        }

        if self.default_bit >= firmware::MAX_BITS {
            return Err(Error::validation(
                "eye.default_bit",
                format!(
                    "bit {} out of range 0..{}",
                    self.default_bit,
                    firmware::MAX_BITS
                ),
            ));
        }

        if self.addr_low.len() != 4 || !self.addr_low.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::validation(
                "eye.addr_low",
                format!("address {:?} is not 4 hex digits", self.addr_low),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn assert_validation_field(result: Result<()>, expected: &str) {
        match result {
            Err(Error::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected validation error for {expected}, got {other:?}"),
        }
    }

    // ---- defaults ----

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::new("/dev/ttyUSB0");
        config.validate().unwrap();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.frequencies, vec![800, 666]);
        assert_eq!(config.test_patterns, vec![1, 15]);
        assert!(!config.enable_2d_training);
        assert!(!config.enable_eye_pattern);
        assert!(config.power_control.is_none());
    }

    #[test]
    fn test_default_eye_config() {
        let eye = EyeConfig::default();
        assert_eq!(eye.default_lane, 0);
        assert_eq!(eye.default_bit, 0);
        assert_eq!(eye.addr_low, "0000");
        assert_eq!(eye.diag_mode, DiagMode::Tx);
        assert!(eye.chain_tx_to_rx);
        assert_eq!(eye.test_mode, EyeTestMode::Both);
    }

    // ---- validation ----

    #[test]
    fn test_empty_port_rejected() {
        let config = Config::new("  ");
        assert_validation_field(config.validate(), "port");
    }

    #[test]
    fn test_unsupported_baud_rejected() {
        let mut config = Config::new("/dev/ttyUSB0");
        config.baud_rate = 123456;
        assert_validation_field(config.validate(), "baud_rate");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::new("/dev/ttyUSB0");
        config.timeout = Duration::ZERO;
        assert_validation_field(config.validate(), "timeout");
    }

    #[test]
    fn test_empty_frequencies_rejected() {
        let config = Config::new("/dev/ttyUSB0").with_frequencies(vec![]);
        assert_validation_field(config.validate(), "frequencies");
    }

    #[test]
    fn test_unsupported_frequency_rejected() {
        let config = Config::new("/dev/ttyUSB0").with_frequencies(vec![800, 1234]);
        assert_validation_field(config.validate(), "frequencies");
    }

    #[test]
    fn test_empty_patterns_rejected() {
        let config = Config::new("/dev/ttyUSB0").with_patterns(vec![]);
        assert_validation_field(config.validate(), "test_patterns");
    }

    #[test]
    fn test_pattern_out_of_range_rejected() {
        let config = Config::new("/dev/ttyUSB0").with_patterns(vec![1, 100]);
        assert_validation_field(config.validate(), "test_patterns");
    }

    #[test]
    fn test_bad_eye_lane_rejected() {
        let mut config = Config::new("/dev/ttyUSB0");
        config.eye.default_lane = 4;
        assert_validation_field(config.validate(), "eye.default_lane");
    }

    #[test]
    fn test_bad_eye_addr_rejected() {
        let mut config = Config::new("/dev/ttyUSB0");
        config.eye.addr_low = "00zz".to_string();
        assert_validation_field(config.validate(), "eye.addr_low");

        config.eye.addr_low = "00000".to_string();
        assert_validation_field(config.validate(), "eye.addr_low");
    }

    #[test]
    fn test_empty_power_port_rejected() {
        let mut config = Config::new("/dev/ttyUSB0");
        config.power_control = Some(PowerSettings::new(""));
        assert_validation_field(config.validate(), "power_control.port");
    }

    #[test]
    fn test_power_settings_default_baud() {
        let power = PowerSettings::new("/dev/ttyUSB1");
        assert_eq!(power.baud_rate, 9600);
    }
}
