//! Configuration file support for the lpddrtest CLI.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (LPDDRTEST_*)
//! 3. Local config file (./lpddrtest.toml)
//! 4. Global config file (~/.config/lpddrtest/config.toml)
//!
//! The file layers are merged here and then converted into the library's
//! validated [`lpddrtest::Config`]; validation happens exactly once, at
//! that conversion.

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred console serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Console baud rate.
    pub baud: Option<u32>,
    /// Generic prompt timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Test sequence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Frequencies to test in MHz, in order.
    pub frequencies: Option<Vec<u32>>,
    /// Pattern ids to run at each frequency.
    pub patterns: Option<Vec<u8>>,
    /// Enable 2D training.
    #[serde(default)]
    pub enable_2d_training: bool,
    /// Run eye-pattern diagnostics instead of the memory pattern loop.
    #[serde(default)]
    pub enable_eye_pattern: bool,
}

/// Eye-pattern settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EyeFileConfig {
    /// Default data lane.
    pub lane: Option<u8>,
    /// Default bit within the lane.
    pub bit: Option<u8>,
    /// Low diagnostic address (4 hex digits).
    pub addr_low: Option<String>,
    /// Direction coverage: "tx-only", "rx-only" or "both".
    pub mode: Option<String>,
    /// Diagnostics sub-mode: "tx", "rx" or "simple".
    pub diag_mode: Option<String>,
    /// Chain a TX run into the complementary RX run.
    pub chain_tx_to_rx: Option<bool>,
}

/// Power control settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerFileConfig {
    /// Serial port of the power controller.
    pub port: Option<String>,
    /// Baud rate of the power controller.
    pub baud: Option<u32>,
}

/// Main configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Test sequence settings.
    #[serde(default)]
    pub test: TestConfig,
    /// Eye-pattern settings.
    #[serde(default)]
    pub eye: EyeFileConfig,
    /// Power control settings.
    #[serde(default)]
    pub power: PowerFileConfig,
}

impl FileConfig {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("lpddrtest.toml")) {
            debug!("Loaded local config from lpddrtest.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lpddrtest").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one (the other wins).
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
        if other.connection.timeout_secs.is_some() {
            self.connection.timeout_secs = other.connection.timeout_secs;
        }

        if other.test.frequencies.is_some() {
            self.test.frequencies = other.test.frequencies;
        }
        if other.test.patterns.is_some() {
            self.test.patterns = other.test.patterns;
        }
        if other.test.enable_2d_training {
            self.test.enable_2d_training = true;
        }
        if other.test.enable_eye_pattern {
            self.test.enable_eye_pattern = true;
        }

        if other.eye.lane.is_some() {
            self.eye.lane = other.eye.lane;
        }
        if other.eye.bit.is_some() {
            self.eye.bit = other.eye.bit;
        }
        if other.eye.addr_low.is_some() {
            self.eye.addr_low = other.eye.addr_low;
        }
        if other.eye.mode.is_some() {
            self.eye.mode = other.eye.mode;
        }
        if other.eye.diag_mode.is_some() {
            self.eye.diag_mode = other.eye.diag_mode;
        }
        if other.eye.chain_tx_to_rx.is_some() {
            self.eye.chain_tx_to_rx = other.eye.chain_tx_to_rx;
        }

        if other.power.port.is_some() {
            self.power.port = other.power.port;
        }
        if other.power.baud.is_some() {
            self.power.baud = other.power.baud;
        }
    }

    /// Build the library configuration for a run on `port`.
    ///
    /// File values apply first; `None` fields keep the library defaults.
    /// The result is unvalidated — [`lpddrtest::Config::validate`] runs
    /// when the sequencer is constructed.
    pub fn to_run_config(&self, port: &str, baud: u32) -> anyhow::Result<lpddrtest::Config> {
        let mut config = lpddrtest::Config::new(port);
        config.baud_rate = self.connection.baud.unwrap_or(baud);

        if let Some(secs) = self.connection.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(frequencies) = &self.test.frequencies {
            config.frequencies = frequencies.clone();
        }
        if let Some(patterns) = &self.test.patterns {
            config.test_patterns = patterns.clone();
        }
        config.enable_2d_training = self.test.enable_2d_training;
        config.enable_eye_pattern = self.test.enable_eye_pattern;

        if let Some(lane) = self.eye.lane {
            config.eye.default_lane = lane;
        }
        if let Some(bit) = self.eye.bit {
            config.eye.default_bit = bit;
        }
        if let Some(addr) = &self.eye.addr_low {
            config.eye.addr_low = addr.clone();
        }
        if let Some(mode) = &self.eye.mode {
            config.eye.test_mode = parse_eye_mode(mode)?;
        }
        if let Some(diag) = &self.eye.diag_mode {
            config.eye.diag_mode = parse_diag_mode(diag)?;
        }
        if let Some(chain) = self.eye.chain_tx_to_rx {
            config.eye.chain_tx_to_rx = chain;
        }

        if let Some(power_port) = &self.power.port {
            let mut power = lpddrtest::PowerSettings::new(power_port);
            if let Some(power_baud) = self.power.baud {
                power.baud_rate = power_baud;
            }
            config.power_control = Some(power);
        }

        Ok(config)
    }
}

fn parse_eye_mode(value: &str) -> anyhow::Result<lpddrtest::EyeTestMode> {
    match value.to_lowercase().as_str() {
        "tx-only" | "tx" => Ok(lpddrtest::EyeTestMode::TxOnly),
        "rx-only" | "rx" => Ok(lpddrtest::EyeTestMode::RxOnly),
        "both" => Ok(lpddrtest::EyeTestMode::Both),
        other => anyhow::bail!("unknown eye mode {other:?} (expected tx-only, rx-only or both)"),
    }
}

fn parse_diag_mode(value: &str) -> anyhow::Result<lpddrtest::DiagMode> {
    match value.to_lowercase().as_str() {
        "tx" => Ok(lpddrtest::DiagMode::Tx),
        "rx" => Ok(lpddrtest::DiagMode::Rx),
        "simple" => Ok(lpddrtest::DiagMode::Simple),
        other => anyhow::bail!("unknown diag mode {other:?} (expected tx, rx or simple)"),
    }
}
