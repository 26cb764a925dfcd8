use blog_doctor::logging::LogOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "blog-doctor")]
#[command(about = "Health diagnostics for the Supabase-backed blog feature", long_about = None)]
#[command(version)]
pub struct Cli {
    /// YAML config file (defaults to ~/.config/blog-doctor/config.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the diagnostic and print the report
    Run(RunArgs),

    /// List the check steps in declaration order
    List,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Only run the named steps (repeatable), e.g. --only connection --only write:blog_posts
    #[arg(long = "only", value_name = "STEP")]
    pub only: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Include details and underlying errors
    #[arg(short, long)]
    pub verbose: bool,

    /// Per-step timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Skip the write-capability probe
    #[arg(long)]
    pub no_write: bool,

    /// Print suggested remediation SQL
    #[arg(long)]
    pub remediation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "blog-doctor",
            "run",
            "--only",
            "connection",
            "--only",
            "write:blog_posts",
            "--timeout-ms",
            "2500",
            "--no-write",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.only, vec!["connection", "write:blog_posts"]);
                assert_eq!(args.timeout_ms, Some(2500));
                assert!(args.no_write);
                assert!(args.json);
                assert!(!args.remediation);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blog-doctor",
            "list",
            "--config",
            "/etc/blog-doctor.yaml",
            "--log-level",
            "debug",
            "--log-json",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::List));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/blog-doctor.yaml")));
        let options = cli.log_options();
        assert_eq!(options.level, "debug");
        assert!(options.json);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["blog-doctor", "run"]).unwrap();
        assert_eq!(cli.log_level, "warn");
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["blog-doctor", "run", "--timeout-ms", "soon"]).is_err());
    }
}
