use crate::cli::{Cli, Commands, RunArgs};
use anyhow::{Context, Result};
use blog_doctor::diagnostics::{standard_steps, Remediation};
use blog_doctor::{
    format_report, CheckStatus, DiagnosticConfig, DiagnosticReport, DiagnosticRunner,
    PostgrestClient, ReportOptions,
};
use console::style;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => handle_run(cli.config.as_deref(), args).await,
        Commands::List => handle_list(cli.config.as_deref()),
    }
}

fn handle_list(config_path: Option<&Path>) -> Result<ExitCode> {
    let config =
        DiagnosticConfig::resolve(config_path).context("Failed to read configuration")?;
    for step in standard_steps(&config) {
        println!("{}", step.name());
    }
    Ok(ExitCode::SUCCESS)
}

/// Apply command-line overrides on top of file and environment configuration
fn apply_overrides(config: &mut DiagnosticConfig, args: &RunArgs) {
    if let Some(ms) = args.timeout_ms {
        config.step_timeout_ms = ms;
    }
    if args.no_write {
        config.write_probe = false;
    }
}

async fn handle_run(config_path: Option<&Path>, args: RunArgs) -> Result<ExitCode> {
    let mut config =
        DiagnosticConfig::resolve(config_path).context("Failed to read configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let client = PostgrestClient::from_config(&config).context("Failed to build Supabase client")?;
    let runner = DiagnosticRunner::standard(Arc::new(client), &config)?;

    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());

    let run = if args.only.is_empty() {
        runner.run(&cancel).await
    } else {
        runner.run_selected(args.only.as_slice(), &cancel).await?
    };
    watcher.abort();

    let report = DiagnosticReport::from_run(&run);
    let options = ReportOptions {
        verbose: args.verbose,
        json: args.json,
    };
    let rendered = format_report(&report, &options);
    if args.json {
        println!("{}", rendered);
    } else {
        println!("{}", colorize(&rendered));
        if args.remediation {
            print_remediations(&report.remediations);
        }
    }

    info!(
        overall = %report.overall_status,
        elapsed_ms = report.elapsed_ms,
        "diagnostic finished"
    );
    Ok(ExitCode::from(exit_status(report.overall_status)))
}

/// The step in flight is aborted too; only write probe cleanup runs to completion
const INTERRUPT_NOTICE: &str = "Interrupted, cancelling remaining checks...";

/// Cancel the run on Ctrl-C
fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling the diagnostic run");
            eprintln!("{}", style(INTERRUPT_NOTICE).yellow());
            cancel.cancel();
        }
    })
}

/// 0 unless the overall status is error
fn exit_status(status: CheckStatus) -> u8 {
    match status {
        CheckStatus::Error => 1,
        CheckStatus::Success | CheckStatus::Warning => 0,
    }
}

/// Color result lines by their status icon
fn colorize(report: &str) -> String {
    report
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with(CheckStatus::Error.icon()) {
                style(line).red().to_string()
            } else if trimmed.starts_with(CheckStatus::Warning.icon()) {
                style(line).yellow().to_string()
            } else if trimmed.starts_with(CheckStatus::Success.icon()) {
                style(line).green().to_string()
            } else if trimmed.starts_with("Summary:") {
                style(line).bold().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_remediations(remediations: &[Remediation]) {
    if remediations.is_empty() {
        println!("\n{}", style("No remediation scripts apply to these results.").dim());
        return;
    }
    for remediation in remediations {
        println!();
        println!(
            "{} {} ({})",
            style("--").dim(),
            style(remediation.key()).cyan().bold(),
            remediation.component
        );
        println!("{} {}", style("--").dim(), remediation.title);
        println!("{}", remediation.script.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_status(CheckStatus::Success), 0);
        assert_eq!(exit_status(CheckStatus::Warning), 0);
        assert_eq!(exit_status(CheckStatus::Error), 1);
    }

    #[test]
    fn test_overrides() {
        let mut config = DiagnosticConfig::default();
        let args = RunArgs {
            timeout_ms: Some(1500),
            no_write: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.step_timeout_ms, 1500);
        assert!(!config.write_probe);
    }

    #[test]
    fn test_overrides_keep_config_values() {
        let mut config = DiagnosticConfig {
            step_timeout_ms: 4000,
            ..Default::default()
        };
        apply_overrides(&mut config, &RunArgs::default());
        assert_eq!(config.step_timeout_ms, 4000);
        assert!(config.write_probe);
    }

    #[test]
    fn test_interrupt_notice_does_not_promise_completion() {
        assert!(INTERRUPT_NOTICE.contains("cancelling"));
        assert!(!INTERRUPT_NOTICE.contains("finishing"));
    }

    #[test]
    fn test_colorize_keeps_text() {
        console::set_colors_enabled(false);
        let text = "  ✗ connection: down\n  plain\n  Summary: 0 success";
        assert_eq!(colorize(text), text);
    }
}
