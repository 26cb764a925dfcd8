//! 写入能力检查
//!
//! 创建一条带唯一标记的探测记录，随后删除并确认已不存在。
//! 插入之后的清理阶段不受取消令牌影响，只受超时约束，
//! 因此中途取消也不会留下探测记录。

use super::{CheckStep, StepContext};
use crate::client::{ClientError, ClientErrorKind, QueryOptions, RemoteDataClient};
use crate::diagnostics::check::{CheckResult, Component};
use crate::diagnostics::classify::{
    cancelled_result, classify, failure_result, timeout_result, FailureKind,
};
use crate::diagnostics::deadline::{with_deadline, with_timeout, Interrupted};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// 探测记录 slug 前缀
pub const PROBE_MARKER_PREFIX: &str = "blog-doctor-probe";

/// 生成唯一的探测标记
pub fn probe_marker() -> String {
    format!(
        "{}-{}-{}",
        PROBE_MARKER_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

/// 按标记清理的结果
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sweep {
    /// 没有残留
    Clean,
    /// 删除了若干残留记录
    Removed(usize),
    /// 清理失败
    Failed(String),
}

impl Sweep {
    fn describe(&self) -> String {
        match self {
            Sweep::Clean => "no probe record left".to_string(),
            Sweep::Removed(n) => format!("removed {} probe record(s)", n),
            Sweep::Failed(reason) => format!("cleanup failed: {}", reason),
        }
    }
}

/// 写入能力检查步骤
pub struct WriteProbe {
    table: String,
}

impl WriteProbe {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    fn probe_record(marker: &str) -> Value {
        json!({
            "title": "blog-doctor write probe",
            "slug": marker,
            "content": "Temporary record created by blog-doctor. It is deleted immediately.",
            "target_url": "https://example.com/blog-doctor",
            "status": "draft",
            "is_trial_post": true,
        })
    }

    /// 后端明确拒绝了插入，不可能留下记录
    fn insert_rejected(error: &ClientError) -> bool {
        error.kind == ClientErrorKind::Api
            && error.status.is_some_and(|status| (400..500).contains(&status))
    }

    fn record_id(row: &Value) -> Option<String> {
        match row.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 查找带标记的记录 id
    async fn find_marked(
        &self,
        client: &dyn RemoteDataClient,
        marker: &str,
    ) -> Result<Vec<String>, ClientError> {
        let response = client
            .query(&self.table, QueryOptions::new().select("id").eq("slug", marker))
            .await?;
        Ok(response.rows.iter().filter_map(Self::record_id).collect())
    }

    /// 删除所有带标记的记录
    async fn sweep(&self, ctx: &StepContext, marker: &str) -> Sweep {
        let client = ctx.client.as_ref();
        let ids = match with_timeout(self.find_marked(client, marker), ctx.timeout).await {
            Ok(Ok(ids)) => ids,
            Ok(Err(e)) => return Sweep::Failed(e.to_string()),
            Err(e) => return Sweep::Failed(e.to_string()),
        };
        if ids.is_empty() {
            return Sweep::Clean;
        }
        for id in &ids {
            match with_timeout(client.delete(&self.table, id), ctx.timeout).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Sweep::Failed(format!("record {}: {}", id, e)),
                Err(e) => return Sweep::Failed(format!("record {}: {}", id, e)),
            }
        }
        Sweep::Removed(ids.len())
    }

    /// 创建成功之后：删除并确认
    async fn delete_and_verify(&self, ctx: &StepContext, id: &str, marker: &str) -> CheckResult {
        let component = self.component();
        let client = ctx.client.as_ref();

        let deleted = match with_timeout(client.delete(&self.table, id), ctx.timeout).await {
            Ok(result) => result,
            Err(e) => Err(ClientError::timeout(e.to_string())),
        };
        if let Err(e) = deleted {
            warn!(table = %self.table, record_id = id, error = %e, "probe record left behind");
            let kind = classify(&e);
            let mut result = CheckResult::error(
                component,
                format!(
                    "Probe record {} was created in {} but could not be deleted ({}); remove it manually",
                    id, self.table, kind
                ),
            )
            .with_kind(kind);
            result.status = kind.status();
            return result
                .with_detail("phase", "delete")
                .with_detail("record_id", id)
                .with_detail("marker", marker)
                .with_detail("raw_message", e.message.clone())
                .with_cause(e);
        }

        match with_timeout(self.find_marked(client, marker), ctx.timeout).await {
            Ok(Ok(remaining)) if remaining.is_empty() => CheckResult::success(
                component,
                format!("Write access to {} verified (probe record created and deleted)", self.table),
            )
            .with_detail("record_id", id),
            Ok(Ok(remaining)) => CheckResult::error(
                component,
                format!(
                    "Probe record is still present in {} after deletion",
                    self.table
                ),
            )
            .with_kind(FailureKind::Unclassified)
            .with_detail("phase", "verify")
            .with_detail("record_id", id)
            .with_detail("remaining", remaining),
            Ok(Err(e)) => failure_result(component, &e)
                .with_detail("phase", "verify")
                .with_detail("record_id", id),
            Err(e) => timeout_result(component, e.0)
                .with_detail("phase", "verify")
                .with_detail("record_id", id),
        }
    }
}

#[async_trait]
impl CheckStep for WriteProbe {
    fn component(&self) -> Component {
        Component::Write(self.table.clone())
    }

    fn manages_deadline(&self) -> bool {
        true
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        let component = self.component();
        if ctx.cancel.is_cancelled() {
            return Ok(cancelled_result(component).with_detail("phase", "create"));
        }
        let marker = probe_marker();
        debug!(table = %self.table, marker = %marker, "creating probe record");

        let created = with_deadline(
            ctx.client.insert(&self.table, Self::probe_record(&marker)),
            ctx.timeout,
            &ctx.cancel,
        )
        .await;

        let result = match created {
            Ok(Ok(row)) => match Self::record_id(&row) {
                Some(id) => self.delete_and_verify(ctx, &id, &marker).await,
                None => {
                    let sweep = self.sweep(ctx, &marker).await;
                    CheckResult::error(
                        component,
                        format!("Insert into {} returned a row without an id", self.table),
                    )
                    .with_kind(FailureKind::Unclassified)
                    .with_detail("phase", "create")
                    .with_detail("cleanup", sweep.describe())
                }
            },
            Ok(Err(e)) => {
                let mut result = failure_result(component, &e).with_detail("phase", "create");
                // 只有 4xx 表示后端确定拒绝了插入；其余情况可能已写入，按标记兜底清理
                if !Self::insert_rejected(&e) {
                    result = result.with_detail("cleanup", self.sweep(ctx, &marker).await.describe());
                }
                result
            }
            Err(Interrupted::TimedOut(t)) => {
                let sweep = self.sweep(ctx, &marker).await;
                timeout_result(component, t.0)
                    .with_detail("phase", "create")
                    .with_detail("cleanup", sweep.describe())
            }
            Err(Interrupted::Cancelled) => {
                let sweep = self.sweep(ctx, &marker).await;
                cancelled_result(component)
                    .with_detail("phase", "create")
                    .with_detail("cleanup", sweep.describe())
            }
        };
        Ok(result)
    }
}
