//! 诊断报告
//!
//! 汇总计数、按严重程度排序的文本报告、JSON 输出，以及可注入的输出目标。

use super::check::{CheckResult, CheckStatus};
use super::health::HealthSummary;
use super::remediation::{suggest_remediations, Remediation};
use super::runner::DiagnosticRun;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::{error, info, warn};

/// 结果计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    pub total: usize,
}

impl Summary {
    pub fn from_results(results: &[CheckResult]) -> Self {
        let mut summary = Summary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                CheckStatus::Success => summary.success += 1,
                CheckStatus::Warning => summary.warning += 1,
                CheckStatus::Error => summary.error += 1,
            }
        }
        summary
    }

    /// 出现过的最高严重程度
    pub fn overall_status(&self) -> CheckStatus {
        if self.error > 0 {
            CheckStatus::Error
        } else if self.warning > 0 {
            CheckStatus::Warning
        } else {
            CheckStatus::Success
        }
    }

    /// 没有错误即可继续
    pub fn is_healthy(&self) -> bool {
        self.error == 0
    }
}

/// 结果列表的整体状态
pub fn overall_status(results: &[CheckResult]) -> CheckStatus {
    results
        .iter()
        .map(|r| r.status)
        .max()
        .unwrap_or(CheckStatus::Success)
}

/// 报告选项
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// 详细模式
    pub verbose: bool,
    /// JSON 输出
    pub json: bool,
}

/// 诊断报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    /// 时间戳
    pub timestamp: i64,
    /// 版本
    pub version: String,
    /// 运行耗时
    pub elapsed_ms: u64,
    /// 运行是否被取消
    pub cancelled: bool,
    /// 检查结果（声明顺序）
    pub results: Vec<CheckResult>,
    /// 摘要
    pub summary: Summary,
    pub overall_status: CheckStatus,
    pub health: HealthSummary,
    /// 修复建议
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remediations: Vec<Remediation>,
}

impl DiagnosticReport {
    /// 从一次运行生成报告
    pub fn from_run(run: &DiagnosticRun) -> Self {
        let mut report = Self::from_results(run.results.clone());
        report.timestamp = run.finished_at.timestamp();
        report.elapsed_ms = run.elapsed_ms;
        report.cancelled = run.cancelled;
        report
    }

    /// 从结果列表生成报告
    pub fn from_results(results: Vec<CheckResult>) -> Self {
        let summary = Summary::from_results(&results);
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            elapsed_ms: 0,
            cancelled: false,
            overall_status: summary.overall_status(),
            health: HealthSummary::from_results(&results),
            remediations: suggest_remediations(&results),
            summary,
            results,
        }
    }
}

fn summary_line(summary: &Summary) -> String {
    format!(
        "Summary: {} success, {} warning, {} error (total {}) - overall: {}",
        summary.success,
        summary.warning,
        summary.error,
        summary.total,
        summary.overall_status()
    )
}

/// 按严重程度排序（错误在前），同级保持声明顺序
fn by_severity(results: &[CheckResult]) -> Vec<&CheckResult> {
    let mut sorted: Vec<&CheckResult> = results.iter().collect();
    sorted.sort_by(|a, b| b.status.cmp(&a.status));
    sorted
}

fn result_lines(result: &CheckResult, verbose: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "  {} {}: {}",
        result.status.icon(),
        result.component,
        result.message
    )];

    if verbose {
        if let Some(kind) = result.kind {
            lines.push(format!("    └─ kind: {}", kind));
        }
        for (key, value) in &result.details {
            lines.push(format!("    └─ {}: {}", key, value));
        }
        if let Some(ref cause) = result.cause {
            lines.push(format!("    └─ cause: {}", cause));
        }
    }
    lines
}

/// 格式化诊断报告
pub fn format_report(report: &DiagnosticReport, options: &ReportOptions) -> String {
    if options.json {
        return serde_json::to_string_pretty(report).unwrap_or_default();
    }

    let mut lines = Vec::new();

    lines.push("╭─────────────────────────────────────────────╮".to_string());
    lines.push("│        Blog Doctor Diagnostic Report        │".to_string());
    lines.push("╰─────────────────────────────────────────────╯".to_string());
    lines.push(String::new());
    lines.push(format!("  Version:  {}", report.version));
    lines.push(format!("  Elapsed:  {} ms", report.elapsed_ms));
    lines.push(format!(
        "  Health:   {} ({}/100)",
        report.health.status, report.health.score
    ));
    if report.cancelled {
        lines.push("  Run was cancelled before all checks finished".to_string());
    }

    lines.push(String::new());
    lines.push("─────────────────────────────────────────────".to_string());
    lines.push(String::new());

    for result in by_severity(&report.results) {
        lines.extend(result_lines(result, options.verbose));
    }

    if !report.remediations.is_empty() {
        lines.push(String::new());
        lines.push("  Suggested remediations:".to_string());
        for remediation in &report.remediations {
            lines.push(format!("    💡 {}: {}", remediation.key(), remediation.title));
        }
    }

    lines.push(String::new());
    lines.push("─────────────────────────────────────────────".to_string());
    lines.push(String::new());
    lines.push(format!("  {}", summary_line(&report.summary)));

    lines.join("\n")
}

/// 报告输出目标
pub trait ReportSink {
    fn write_line(&mut self, status: CheckStatus, line: &str) -> io::Result<()>;
}

/// 通过 tracing 输出，级别跟随状态
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn write_line(&mut self, status: CheckStatus, line: &str) -> io::Result<()> {
        match status {
            CheckStatus::Success => info!(target: "blog_doctor::report", "{}", line),
            CheckStatus::Warning => warn!(target: "blog_doctor::report", "{}", line),
            CheckStatus::Error => error!(target: "blog_doctor::report", "{}", line),
        }
        Ok(())
    }
}

/// 写入任意 `Write`
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for WriterSink<W> {
    fn write_line(&mut self, _status: CheckStatus, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)
    }
}

/// 收集到内存
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<(CheckStatus, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[(CheckStatus, String)] {
        &self.lines
    }

    pub fn text(&self) -> Vec<&str> {
        self.lines.iter().map(|(_, l)| l.as_str()).collect()
    }
}

impl ReportSink for MemorySink {
    fn write_line(&mut self, status: CheckStatus, line: &str) -> io::Result<()> {
        self.lines.push((status, line.to_string()));
        Ok(())
    }
}

/// 把结果摘要写入输出目标
///
/// 每个结果一行，错误在前；最后一行是计数摘要，级别为整体状态。
pub fn print_summary(results: &[CheckResult], sink: &mut dyn ReportSink) -> io::Result<()> {
    for result in by_severity(results) {
        let line = format!(
            "{} {}: {}",
            result.status.icon(),
            result.component,
            result.message
        );
        sink.write_line(result.status, &line)?;
    }
    let summary = Summary::from_results(results);
    sink.write_line(summary.overall_status(), &summary_line(&summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::diagnostics::check::Component;
    use crate::diagnostics::classify::failure_result;

    fn sample() -> Vec<CheckResult> {
        vec![
            CheckResult::success(Component::Connection, "Connected"),
            CheckResult::warning(Component::Session, "Anonymous session"),
            failure_result(
                Component::Table("blog_posts".into()),
                &ClientError::api(Some(404), Some("42P01".into()), "relation does not exist"),
            ),
            CheckResult::success(Component::Rpc("f".into()), "Callable"),
        ]
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_results(&sample());
        assert_eq!(
            summary,
            Summary {
                success: 2,
                warning: 1,
                error: 1,
                total: 4
            }
        );
        assert_eq!(summary.overall_status(), CheckStatus::Error);
        assert!(!summary.is_healthy());
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(&[]), CheckStatus::Success);
        let warn_only = vec![
            CheckResult::success(Component::Connection, "ok"),
            CheckResult::warning(Component::Session, "anon"),
        ];
        assert_eq!(overall_status(&warn_only), CheckStatus::Warning);
        assert_eq!(overall_status(&sample()), CheckStatus::Error);
    }

    #[test]
    fn test_text_report_orders_by_severity() {
        let report = DiagnosticReport::from_results(sample());
        let text = format_report(&report, &ReportOptions::default());

        let error_at = text.find("table:blog_posts").unwrap();
        let warning_at = text.find("session:").unwrap();
        let connection_at = text.find("connection:").unwrap();
        let rpc_at = text.find("rpc:f:").unwrap();
        assert!(error_at < warning_at);
        assert!(warning_at < connection_at);
        assert!(connection_at < rpc_at);

        assert_eq!(
            text.lines().last().unwrap().trim(),
            "Summary: 2 success, 1 warning, 1 error (total 4) - overall: error"
        );
        assert!(text.contains("create-blog-posts-table@1"));
        assert!(!text.contains("raw_message"));
    }

    #[test]
    fn test_verbose_report_includes_details() {
        let report = DiagnosticReport::from_results(sample());
        let text = format_report(
            &report,
            &ReportOptions {
                verbose: true,
                json: false,
            },
        );
        assert!(text.contains("└─ kind: structural_missing"));
        assert!(text.contains("└─ raw_message: relation does not exist"));
        assert!(text.contains("└─ cause: [42P01] relation does not exist"));
    }

    #[test]
    fn test_json_report() {
        let report = DiagnosticReport::from_results(sample());
        let json = format_report(
            &report,
            &ReportOptions {
                verbose: false,
                json: true,
            },
        );
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["overall_status"], "error");
        assert_eq!(value["summary"]["total"], 4);
        assert_eq!(value["results"][2]["component"], "table:blog_posts");
        assert_eq!(value["results"][2]["kind"], "structural_missing");
        assert_eq!(value["remediations"][0]["id"], "create-blog-posts-table");
    }

    #[test]
    fn test_print_summary_to_memory() {
        let mut sink = MemorySink::new();
        print_summary(&sample(), &mut sink).unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].0, CheckStatus::Error);
        assert_eq!(lines[4].0, CheckStatus::Error);
        assert!(sink.text()[4].starts_with("Summary: 2 success"));
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new());
        print_summary(&[CheckResult::success(Component::Connection, "ok")], &mut sink).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "✓ connection: ok\nSummary: 1 success, 0 warning, 0 error (total 1) - overall: success\n"
        );
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let mut sink = TracingSink;
        assert!(print_summary(&sample(), &mut sink).is_ok());
    }
}
