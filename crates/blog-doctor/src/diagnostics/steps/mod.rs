//! 检查步骤
//!
//! 每个步骤针对远程数据客户端执行一次探测，并产出一个 `CheckResult`。
//! 客户端错误以 `Err` 返回，由运行器统一分类；步骤自己能判断的
//! 结果（例如缺少列、探测记录未删除）直接以 `Ok` 返回。

mod probes;
mod write;

pub use probes::{ConnectionProbe, RpcProbe, SchemaProbe, SessionProbe, TableProbe};
pub use write::{probe_marker, WriteProbe, PROBE_MARKER_PREFIX};

use super::check::{CheckResult, Component};
use crate::client::{ClientError, RemoteDataClient};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 步骤执行上下文
#[derive(Clone)]
pub struct StepContext {
    /// 共享的远程数据客户端
    pub client: Arc<dyn RemoteDataClient>,
    /// 单步超时
    pub timeout: Duration,
    /// 取消令牌
    pub cancel: CancellationToken,
}

impl StepContext {
    pub fn new(
        client: Arc<dyn RemoteDataClient>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            timeout,
            cancel,
        }
    }
}

/// 检查步骤 trait
#[async_trait]
pub trait CheckStep: Send + Sync {
    /// 被检查的组件，其标签同时是步骤名
    fn component(&self) -> Component;

    /// 步骤名（用于选择性重检）
    fn name(&self) -> String {
        self.component().to_string()
    }

    /// 是否自行处理超时与取消
    ///
    /// 返回 `true` 的步骤不会被运行器包裹在外层超时里，
    /// 必须自己保证在有限时间内结束。
    fn manages_deadline(&self) -> bool {
        false
    }

    /// 执行探测
    async fn probe(&self, ctx: &StepContext) -> Result<CheckResult, ClientError>;
}
