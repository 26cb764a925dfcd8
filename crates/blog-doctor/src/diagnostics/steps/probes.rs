//! 只读探测步骤

use super::{CheckStep, StepContext};
use crate::client::{ClientError, QueryOptions};
use crate::diagnostics::check::{CheckResult, Component};
use crate::diagnostics::classify::{failure_result_on, FailureKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Instant;

/// 博客表必需的列
pub const REQUIRED_BLOG_COLUMNS: &[&str] = &["id", "title", "slug", "content", "status", "created_at"];

/// 基础连通性检查
pub struct ConnectionProbe {
    table: String,
}

impl ConnectionProbe {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl CheckStep for ConnectionProbe {
    fn component(&self) -> Component {
        Component::Connection
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        let started = Instant::now();
        let result = match ctx
            .client
            .query(&self.table, QueryOptions::new().select("id").limit(1))
            .await
        {
            Ok(_) => CheckResult::success(self.component(), "Connected to the Supabase backend")
                .with_detail("latency_ms", started.elapsed()),
            // 连接检查经由博客表完成，失败时指明该表
            Err(e) => failure_result_on(self.component(), Some(self.table.as_str()), &e),
        };
        Ok(result.with_detail("table", self.table.as_str()))
    }
}

/// 会话检查
pub struct SessionProbe;

#[async_trait]
impl CheckStep for SessionProbe {
    fn component(&self) -> Component {
        Component::Session
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        match ctx.client.get_session().await? {
            Some(session) => {
                let mut result = CheckResult::success(
                    self.component(),
                    format!("Authenticated session for user {}", session.user_id),
                )
                .with_detail("user_id", session.user_id);
                if let Some(email) = session.email {
                    result = result.with_detail("email", email);
                }
                if let Some(role) = session.role {
                    result = result.with_detail("role", role);
                }
                Ok(result)
            }
            None => Ok(CheckResult::warning(
                self.component(),
                "No authenticated session; running with the anonymous key, \
                 writes may be rejected by row-level security",
            )
            .with_detail("anonymous", true)),
        }
    }
}

/// 表存在性与可读性检查
pub struct TableProbe {
    table: String,
    sample_limit: usize,
}

impl TableProbe {
    pub fn new(table: impl Into<String>, sample_limit: usize) -> Self {
        Self {
            table: table.into(),
            sample_limit,
        }
    }
}

#[async_trait]
impl CheckStep for TableProbe {
    fn component(&self) -> Component {
        Component::Table(self.table.clone())
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        let response = ctx
            .client
            .query(
                &self.table,
                QueryOptions::new()
                    .select("*")
                    .limit(self.sample_limit)
                    .with_count(),
            )
            .await?;

        let message = match response.count {
            Some(count) => format!("Table {} is readable ({} rows)", self.table, count),
            None => format!("Table {} is readable", self.table),
        };
        let mut result = CheckResult::success(self.component(), message)
            .with_detail("sample_size", response.rows.len());
        if let Some(count) = response.count {
            result = result.with_detail("row_count", count);
        }
        Ok(result)
    }
}

/// 表结构检查：采样行中是否包含必需列
pub struct SchemaProbe {
    table: String,
    required: Vec<String>,
    sample_limit: usize,
}

impl SchemaProbe {
    pub fn new(table: impl Into<String>, required: &[&str], sample_limit: usize) -> Self {
        Self {
            table: table.into(),
            required: required.iter().map(|c| c.to_string()).collect(),
            sample_limit: sample_limit.max(1),
        }
    }

    /// 博客表的标准结构检查
    pub fn blog(table: impl Into<String>, sample_limit: usize) -> Self {
        Self::new(table, REQUIRED_BLOG_COLUMNS, sample_limit)
    }
}

#[async_trait]
impl CheckStep for SchemaProbe {
    fn component(&self) -> Component {
        Component::Schema(self.table.clone())
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        let response = ctx
            .client
            .query(&self.table, QueryOptions::new().limit(self.sample_limit))
            .await?;

        if response.rows.is_empty() {
            return Ok(CheckResult::warning(
                self.component(),
                format!(
                    "Table {} is empty; its columns could not be verified",
                    self.table
                ),
            )
            .with_detail("sample_size", 0usize));
        }

        let present: BTreeSet<&str> = response
            .rows
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|c| !present.contains(c.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(CheckResult::success(
                self.component(),
                format!("Table {} has all required columns", self.table),
            )
            .with_detail("sample_size", response.rows.len()))
        } else {
            Ok(CheckResult::error(
                self.component(),
                format!(
                    "Table {} is missing required columns: {}",
                    self.table,
                    missing.join(", ")
                ),
            )
            .with_kind(FailureKind::StructuralMissing)
            .with_detail("missing_columns", missing))
        }
    }
}

/// 远程过程检查
pub struct RpcProbe {
    function: String,
}

impl RpcProbe {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
        }
    }
}

#[async_trait]
impl CheckStep for RpcProbe {
    fn component(&self) -> Component {
        Component::Rpc(self.function.clone())
    }

    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError> {
        let value = ctx.client.call_rpc(&self.function, json!({})).await?;
        Ok(CheckResult::success(
            self.component(),
            format!("Remote procedure {} is callable", self.function),
        )
        .with_detail("returned_null", value.is_null()))
    }
}
