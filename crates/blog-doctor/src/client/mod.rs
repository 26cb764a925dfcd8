//! 远程数据客户端
//!
//! 诊断核心只依赖 `RemoteDataClient` 这一抽象，不关心具体后端。
//! 默认实现 `PostgrestClient` 通过 Supabase 的 REST/Auth 接口访问数据。

mod error;
mod postgrest;

pub use error::{ClientError, ClientErrorKind};
pub use postgrest::PostgrestClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 查询选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// 选择的列（PostgREST `select` 语法），为空时使用 `*`
    pub select: Option<String>,
    /// 最大返回行数
    pub limit: Option<usize>,
    /// 等值过滤条件 (列, 值)
    pub filters: Vec<(String, String)>,
    /// 是否请求精确总数
    pub count: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选择的列
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    /// 设置最大行数
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 添加等值过滤
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    /// 请求总行数
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// 查询响应
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// 返回的行
    pub rows: Vec<Value>,
    /// 总行数（仅在请求计数时存在）
    pub count: Option<u64>,
}

/// 当前会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// 远程数据客户端 trait
///
/// 所有方法都返回结构化的 `ClientError`，由诊断步骤负责分类。
/// 实现必须可以在多个检查步骤之间共享（`Arc<dyn RemoteDataClient>`）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteDataClient: Send + Sync {
    /// 查询集合
    async fn query(
        &self,
        collection: &str,
        options: QueryOptions,
    ) -> Result<QueryResponse, ClientError>;

    /// 插入记录，返回插入后的行
    async fn insert(&self, collection: &str, record: Value) -> Result<Value, ClientError>;

    /// 按 id 删除记录
    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError>;

    /// 获取当前会话，`None` 表示匿名访问
    async fn get_session(&self) -> Result<Option<Session>, ClientError>;

    /// 调用远程过程
    async fn call_rpc(&self, function: &str, args: Value) -> Result<Value, ClientError>;
}
