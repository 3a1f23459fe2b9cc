//! The `run` subcommand: a full test sequence with live output.

use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use lpddrtest::{
    Outcome, PowerSettings, RunSummary, SequenceEvent, Severity, Verdict, runner,
};
use serde_json::json;

use crate::config::FileConfig;
use crate::{Cli, CliError};

/// CLI-level options for a run, layered over the config file.
pub(crate) struct RunOptions {
    pub frequencies: Option<Vec<u32>>,
    pub patterns: Option<Vec<u8>>,
    pub enable_2d_training: bool,
    pub eye_pattern: bool,
    pub power_port: Option<String>,
    pub timeout_secs: Option<u64>,
    pub json: bool,
}

/// Run the full test sequence.
pub(crate) fn cmd_run(cli: &Cli, file: &FileConfig, opts: &RunOptions) -> Result<()> {
    let port = crate::get_port(cli, file)?;
    let mut config = file.to_run_config(&port, cli.baud)?;

    // Command-line flags override file values.
    if let Some(frequencies) = &opts.frequencies {
        config.frequencies = frequencies.clone();
    }
    if let Some(patterns) = &opts.patterns {
        config.test_patterns = patterns.clone();
    }
    if opts.enable_2d_training {
        config.enable_2d_training = true;
    }
    if opts.eye_pattern {
        config.enable_eye_pattern = true;
    }
    if let Some(power_port) = &opts.power_port {
        config.power_control = Some(PowerSettings::new(power_port));
    }
    if let Some(secs) = opts.timeout_secs {
        config.timeout = Duration::from_secs(secs);
    }

    // Reject bad input before touching the hardware; these are usage
    // errors, not runtime failures.
    config
        .validate()
        .map_err(|e| CliError::Usage(e.to_string()))?;

    if !cli.quiet {
        eprintln!(
            "{} console {} at {} baud",
            style("\u{1F50C}").cyan(),
            style(&config.port).green(),
            config.baud_rate
        );
        eprintln!(
            "{} frequencies {:?} MHz, patterns {:?}",
            style("\u{2139}").blue(),
            config.frequencies,
            config.test_patterns
        );
    }

    let run = runner::spawn(config).context("failed to start test run")?;

    let spinner = if cli.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid spinner template"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    for event in run.events() {
        match event {
            SequenceEvent::Status(step) => {
                if let Some(pb) = &spinner {
                    pb.set_message(step);
                }
            },
            SequenceEvent::Log { text, severity } => {
                if cli.quiet && !matches!(severity, Severity::Warning | Severity::Error) {
                    continue;
                }
                let line = match severity {
                    Severity::Serial => style(text).dim().to_string(),
                    Severity::Warning => format!("{} {text}", style("\u{26A0}").yellow()),
                    Severity::Error => format!("{} {text}", style("\u{2717}").red()),
                    Severity::Info => text,
                    Severity::Debug => style(text).dim().to_string(),
                };
                match &spinner {
                    Some(pb) => pb.println(line),
                    None => eprintln!("{line}"),
                }
            },
        }
    }

    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }

    let summary = run.join()?;
    report(cli, opts, &summary)?;
    Ok(())
}

/// Print the final report.
fn report(cli: &Cli, opts: &RunOptions, summary: &RunSummary) -> Result<()> {
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(summary))?);
    } else if !cli.quiet {
        eprintln!();
        eprintln!("{}", style("=== LPDDR test report ===").bold());
        for result in &summary.results {
            eprintln!(
                "  {} {:>4} MHz pattern {:02}: {}",
                result.step,
                result.frequency,
                result.pattern,
                styled_outcome(result.outcome)
            );
        }
        for eye in &summary.eye_results {
            eprintln!(
                "  eye {} lane {} bit {}: {} (quality {:.2})",
                eye.direction,
                eye.lane,
                eye.bit,
                styled_outcome(eye.outcome),
                eye.quality
            );
        }
    }

    let verdict_line = match summary.verdict {
        Verdict::Functional => style(summary.verdict.to_string()).green().bold(),
        Verdict::Unstable => style(summary.verdict.to_string()).yellow().bold(),
        Verdict::NotFunctional => style(summary.verdict.to_string()).red().bold(),
    };
    eprintln!("{} {verdict_line}", style("Overall:").bold());
    Ok(())
}

fn styled_outcome(outcome: Outcome) -> console::StyledObject<String> {
    let text = outcome.to_string();
    match outcome {
        Outcome::Pass => style(text).green(),
        Outcome::Fail => style(text).red(),
        Outcome::Unknown => style(text).yellow(),
    }
}

/// JSON shape of a run summary for scripting consumers.
fn summary_json(summary: &RunSummary) -> serde_json::Value {
    json!({
        "verdict": summary.verdict.to_string(),
        "results": summary.results.iter().map(|r| {
            json!({
                "step": r.step.to_string(),
                "frequency": r.frequency,
                "pattern": r.pattern,
                "outcome": r.outcome.to_string(),
                "message": r.message,
            })
        }).collect::<Vec<_>>(),
        "eye_results": summary.eye_results.iter().map(|e| {
            json!({
                "lane": e.lane,
                "bit": e.bit,
                "direction": e.direction.to_string(),
                "outcome": e.outcome.to_string(),
                "timing": e.timing,
                "quality": e.quality,
            })
        }).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpddrtest::{EyeDirection, EyePatternResult, TestResult, TestStep};
    use std::time::SystemTime;

    #[test]
    fn test_summary_json_shape() {
        let summary = RunSummary {
            verdict: Verdict::Functional,
            results: vec![TestResult::new(
                TestStep::MemoryTest,
                800,
                1,
                Outcome::Pass,
                "Memory Access Test PASS",
            )],
            eye_results: vec![EyePatternResult {
                lane: 0,
                bit: 3,
                direction: EyeDirection::Tx,
                outcome: Outcome::Pass,
                timing: 2.5,
                quality: 0.9,
                timestamp: SystemTime::now(),
                raw_response: String::new(),
            }],
        };

        let value = summary_json(&summary);
        assert_eq!(value["verdict"], "memory functional");
        assert_eq!(value["results"][0]["frequency"], 800);
        assert_eq!(value["results"][0]["outcome"], "PASS");
        assert_eq!(value["eye_results"][0]["direction"], "tx");
        assert_eq!(value["eye_results"][0]["bit"], 3);
    }
}
