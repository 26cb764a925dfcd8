mod cli;
mod commands;

use blog_doctor::logging::init_logging;
use clap::Parser;
use cli::Cli;
use console::style;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; SUPABASE_* may come from the real environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_options()) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match commands::dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::from(1)
        }
    }
}
