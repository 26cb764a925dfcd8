//! 健康评分
//!
//! 把一次诊断的结果压缩成 0-100 的评分和一个健康等级。
//! 扣分按失败类型加权：缺表缺函数需要改库，比一次超时严重得多；
//! 后端不可达或凭据被拒时，其余检查结果都不可信，直接判为不健康。

use super::check::{CheckResult, CheckStatus};
use super::classify::FailureKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 健康
    Healthy,
    /// 降级
    Degraded,
    /// 不健康
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// 健康摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    /// 状态
    pub status: HealthStatus,
    /// 健康评分 (0-100)
    pub score: u8,
    /// 后端不可达或凭据被拒
    pub blocked: bool,
    /// 关键问题，需要改库的排在前面
    pub critical_issues: Vec<String>,
}

/// 单个结果的扣分权重
fn penalty(result: &CheckResult) -> f64 {
    if result.status == CheckStatus::Success {
        return 0.0;
    }
    match result.kind {
        Some(FailureKind::StructuralMissing)
        | Some(FailureKind::ConnectivityFailure)
        | Some(FailureKind::InvalidCredentials) => 1.0,
        Some(FailureKind::Unclassified) => 0.75,
        Some(FailureKind::PolicyDenied) => 0.5,
        Some(FailureKind::TransientTimeout) => 0.25,
        // 被取消的检查没有提供任何信号
        Some(FailureKind::Cancelled) => 0.0,
        None if result.status == CheckStatus::Error => 1.0,
        None => 0.25,
    }
}

fn is_blocking(result: &CheckResult) -> bool {
    matches!(
        result.kind,
        Some(FailureKind::ConnectivityFailure) | Some(FailureKind::InvalidCredentials)
    )
}

impl HealthSummary {
    /// 从检查结果生成健康摘要
    pub fn from_results(results: &[CheckResult]) -> Self {
        let total = results.len();
        let score = if total > 0 {
            let penalty: f64 = results.iter().map(penalty).sum();
            let raw_score = ((total as f64 - penalty) / total as f64) * 100.0;
            raw_score.clamp(0.0, 100.0).round() as u8
        } else {
            100
        };

        let blocked = results.iter().any(is_blocking);
        let status = if blocked || score < 70 {
            HealthStatus::Unhealthy
        } else if score < 90 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let mut errors: Vec<&CheckResult> = results
            .iter()
            .filter(|r| r.status == CheckStatus::Error)
            .collect();
        errors.sort_by_key(|r| r.kind != Some(FailureKind::StructuralMissing));
        let critical_issues = errors
            .into_iter()
            .map(|r| format!("{}: {}", r.component, r.message))
            .collect();

        Self {
            status,
            score,
            blocked,
            critical_issues,
        }
    }
}
