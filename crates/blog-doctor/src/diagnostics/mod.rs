//! 博客后端诊断系统
//!
//! 依次执行一组检查步骤，把每个步骤的结果（包括失败、超时和 panic）
//! 收集成有序的 `CheckResult` 列表，再汇总成报告与修复建议。

mod check;
mod classify;
mod deadline;
mod health;
mod remediation;
mod report;
mod runner;
pub mod steps;

pub use check::{CheckResult, CheckStatus, Component, DetailValue, Details};
pub use classify::{classify, failure_result, failure_result_on, FailureKind};
pub use deadline::{with_deadline, with_timeout, Interrupted, TimeoutError, DEFAULT_STEP_TIMEOUT};
pub use health::{HealthStatus, HealthSummary};
pub use remediation::{suggest_remediations, Remediation};
pub use report::{
    format_report, overall_status, print_summary, DiagnosticReport, MemorySink, ReportOptions,
    ReportSink, Summary, TracingSink, WriterSink,
};
pub use runner::{
    run_full_diagnostic, standard_steps, DiagnosticRun, DiagnosticRunner, RunObserver, RunPhase,
};
