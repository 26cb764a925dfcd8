//! blog-doctor - Supabase blog feature diagnostics
//!
//! This crate runs an ordered set of health checks against the remote data
//! store behind the blog feature and turns the outcomes into a report.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;

pub use client::{ClientError, ClientErrorKind, PostgrestClient, RemoteDataClient};
pub use config::DiagnosticConfig;
pub use diagnostics::{
    format_report, print_summary, run_full_diagnostic, suggest_remediations, CheckResult,
    CheckStatus, Component, DiagnosticReport, DiagnosticRun, DiagnosticRunner, FailureKind,
    ReportOptions, Summary,
};
pub use error::{DiagnosticError, Result};
