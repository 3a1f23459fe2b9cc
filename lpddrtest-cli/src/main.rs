//! lpddrtest CLI - Command-line tool for automated LPDDR4 bring-up testing.
//!
//! ## Features
//!
//! - Runs the full frequency/pattern test sequence against a board console
//! - Streams firmware traffic and progress to the terminal
//! - Interactive serial port selection
//! - TOML configuration files with CLI-flag override
//! - Shell completion generation
//! - Environment variable support

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;

mod commands;
mod config;
mod serial;

use commands::completions::cmd_completions;
use commands::ports::cmd_list_ports;
use commands::run::cmd_run;
use config::FileConfig;
use serial::{SerialOptions, select_serial_port};

/// Ctrl-C flag, polled by the library between sequence steps.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// User-facing failure classes mapped to exit codes.
///
/// 0 = success, 1 = runtime failure, 2 = usage/setup error, 130 = cancelled.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Bad invocation or environment; fix the command line or setup.
    #[error("{0}")]
    Usage(String),
    /// The user cancelled the operation.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Cancelled(_) => 130,
        }
    }
}

/// lpddrtest - automated LPDDR4 memory bring-up testing.
///
/// Environment variables:
///   LPDDRTEST_PORT              - Default console serial port
///   LPDDRTEST_BAUD              - Default baud rate (default: 115200)
///   LPDDRTEST_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "lpddrtest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port of the board console (selected interactively if not
    /// specified).
    #[arg(short, long, global = true, env = "LPDDRTEST_PORT")]
    port: Option<String>,

    /// Console baud rate.
    #[arg(
        short,
        long,
        global = true,
        default_value = "115200",
        env = "LPDDRTEST_BAUD"
    )]
    baud: u32,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "LPDDRTEST_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the full test sequence.
    Run {
        /// Frequencies to test in MHz (comma-separated, in order).
        #[arg(long, value_delimiter = ',')]
        frequencies: Option<Vec<u32>>,

        /// Pattern ids to run at each frequency (comma-separated).
        #[arg(long, value_delimiter = ',')]
        patterns: Option<Vec<u8>>,

        /// Enable 2D training after frequency selection.
        #[arg(long)]
        enable_2d_training: bool,

        /// Run eye-pattern diagnostics instead of the memory pattern loop.
        #[arg(long)]
        eye_pattern: bool,

        /// Serial port of the power controller (enables power control).
        #[arg(long)]
        power_port: Option<String>,

        /// Generic prompt timeout in seconds (default 30).
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the result log as JSON to stdout when the run ends.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    if env::var("NO_COLOR").is_ok() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    debug!(
        "lpddrtest v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Wire Ctrl-C to the library's cooperative interrupt checker.
    let _ = ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::Relaxed);
        eprintln!("\ninterrupt requested, stopping after the current step...");
    });
    lpddrtest::set_interrupt_checker(was_interrupted);

    match dispatch(&cli) {
        Ok(()) => {},
        Err(err) => {
            if let Some(cli_err) = err.downcast_ref::<CliError>() {
                eprintln!("{} {cli_err}", style("Error:").red().bold());
                std::process::exit(cli_err.exit_code());
            }
            eprintln!("{} {err:#}", style("Error:").red().bold());
            std::process::exit(1);
        },
    }
}

fn dispatch(cli: &Cli) -> Result<()> {
    // Load configuration
    let file_config = if let Some(ref path) = cli.config_path {
        FileConfig::load_from_path(path)
    } else {
        FileConfig::load()
    };

    match &cli.command {
        Commands::Run {
            frequencies,
            patterns,
            enable_2d_training,
            eye_pattern,
            power_port,
            timeout,
            json,
        } => cmd_run(
            cli,
            &file_config,
            &commands::run::RunOptions {
                frequencies: frequencies.clone(),
                patterns: patterns.clone(),
                enable_2d_training: *enable_2d_training,
                eye_pattern: *eye_pattern,
                power_port: power_port.clone(),
                timeout_secs: *timeout,
                json: *json,
            },
        ),
        Commands::ListPorts { json } => cmd_list_ports(*json),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Get the console serial port from CLI args, config, or selection.
fn get_port(cli: &Cli, config: &FileConfig) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone().or_else(|| config.connection.port.clone()),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options)
}
