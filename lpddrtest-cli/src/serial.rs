//! Interactive serial port selection.
//!
//! Selection order: explicit `--port`/config value, a single detected
//! port, then an interactive picker. Non-interactive mode never prompts
//! and treats ambiguity as a usage error.

use std::cmp::Ordering;
use std::io::IsTerminal;

use anyhow::Result;
use console::style;
use dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme};
use log::info;
use lpddrtest::{PortInfo, list_ports};

use crate::CliError;

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port from CLI or config file.
    pub port: Option<String>,
    /// Non-interactive mode (fail if ambiguous).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    // Usage-class failures map to exit code 2 so scripts can branch on them.
    CliError::Usage(message.to_string()).into()
}

/// Select the console serial port.
pub fn select_serial_port(options: &SerialOptions) -> Result<String> {
    // If port explicitly specified, use it as given; the open will fail
    // loudly if it does not exist.
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    let ports = list_ports()?;

    if options.non_interactive {
        return select_non_interactive_port(ports);
    }

    match ports.len().cmp(&1) {
        Ordering::Equal => {
            let port = &ports[0];
            info!("Auto-selected port: {}", port.name);
            Ok(port.name.clone())
        },
        Ordering::Greater => {
            ensure_interactive_terminal()?;
            select_port_interactive(ports)
        },
        Ordering::Less => Err(usage_err("no serial ports found")),
    }
}

fn select_non_interactive_port(ports: Vec<PortInfo>) -> Result<String> {
    // Non-interactive mode must be deterministic and never prompt.
    match ports.len().cmp(&1) {
        Ordering::Equal => Ok(ports.into_iter().next().expect("one port").name),
        Ordering::Greater => Err(usage_err(
            "multiple serial ports found; specify one with --port",
        )),
        Ordering::Less => Err(usage_err("no serial ports found")),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "interactive port selection requires a terminal; use --port",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("port selection cancelled".to_string()).into()
            } else {
                CliError::Usage("port selection prompt failed".to_string()).into()
            }
        },
    }
}

/// Interactive port selection.
fn select_port_interactive(ports: Vec<PortInfo>) -> Result<String> {
    eprintln!(
        "{} detected {} serial ports",
        style("\u{2139}").blue(),
        ports.len()
    );

    let labels: Vec<String> = ports.iter().map(port_label).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the board console port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => Ok(ports
            .into_iter()
            .nth(index)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}"))?
            .name),
        None => Err(CliError::Cancelled("port selection cancelled".to_string()).into()),
    }
}

fn port_label(port: &PortInfo) -> String {
    let device_info = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };

    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{device_info}{product}", port.name)
}
