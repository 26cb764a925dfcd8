//! 诊断运行器
//!
//! 按声明顺序依次执行检查步骤。单个步骤的失败、超时甚至 panic
//! 都只会变成该步骤的 `CheckResult`，不会中断后续步骤。

use super::check::{CheckResult, CheckStatus, Component};
use super::classify::{cancelled_result, failure_result, skipped_result, timeout_result, FailureKind};
use super::deadline::{with_deadline, Interrupted, DEFAULT_STEP_TIMEOUT};
use super::report::Summary;
use super::steps::{
    CheckStep, ConnectionProbe, RpcProbe, SchemaProbe, SessionProbe, StepContext, TableProbe,
    WriteProbe,
};
use crate::client::RemoteDataClient;
use crate::config::DiagnosticConfig;
use crate::error::{DiagnosticError, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 单次运行的阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    NotStarted,
    Running,
    Completed,
}

/// 运行观察者
///
/// 用于进度展示或调试；替代把结果挂到全局状态上的做法。
pub trait RunObserver: Send + Sync {
    fn on_phase(&self, _phase: RunPhase) {}

    fn on_result(&self, _index: usize, _result: &CheckResult) {}
}

/// 一次诊断运行的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRun {
    /// 按声明顺序排列的检查结果
    pub results: Vec<CheckResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// 运行期间是否被取消
    pub cancelled: bool,
}

impl DiagnosticRun {
    pub fn summary(&self) -> Summary {
        Summary::from_results(&self.results)
    }

    pub fn overall_status(&self) -> CheckStatus {
        self.summary().overall_status()
    }
}

/// 诊断运行器
pub struct DiagnosticRunner {
    client: Arc<dyn RemoteDataClient>,
    steps: Vec<Box<dyn CheckStep>>,
    step_timeout: Duration,
    observer: Option<Arc<dyn RunObserver>>,
}

impl DiagnosticRunner {
    /// 创建运行器
    ///
    /// 步骤列表为空或步骤名重复时返回错误。
    pub fn new(client: Arc<dyn RemoteDataClient>, steps: Vec<Box<dyn CheckStep>>) -> Result<Self> {
        if steps.is_empty() {
            return Err(DiagnosticError::EmptyStepList);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            let name = step.name();
            if !seen.insert(name.clone()) {
                return Err(DiagnosticError::duplicate_step(name));
            }
        }
        Ok(Self {
            client,
            steps,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            observer: None,
        })
    }

    /// 按配置构建标准检查序列
    pub fn standard(client: Arc<dyn RemoteDataClient>, config: &DiagnosticConfig) -> Result<Self> {
        Ok(Self::new(client, standard_steps(config))?
            .with_step_timeout(Duration::from_millis(config.step_timeout_ms)))
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// 声明顺序的步骤名
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// 运行全部步骤
    pub async fn run(&self, cancel: &CancellationToken) -> DiagnosticRun {
        let steps: Vec<&dyn CheckStep> = self.steps.iter().map(|s| s.as_ref()).collect();
        self.execute(steps, cancel).await
    }

    /// 只运行指定的步骤，保持声明顺序
    pub async fn run_selected<S: AsRef<str>>(
        &self,
        names: &[S],
        cancel: &CancellationToken,
    ) -> Result<DiagnosticRun> {
        let declared: HashSet<String> = self.steps.iter().map(|s| s.name()).collect();
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        if let Some(unknown) = wanted.iter().find(|n| !declared.contains(**n)) {
            return Err(DiagnosticError::unknown_step(*unknown));
        }
        if wanted.is_empty() {
            return Err(DiagnosticError::EmptyStepList);
        }

        let steps: Vec<&dyn CheckStep> = self
            .steps
            .iter()
            .filter(|s| wanted.contains(s.name().as_str()))
            .map(|s| s.as_ref())
            .collect();
        Ok(self.execute(steps, cancel).await)
    }

    async fn execute(&self, steps: Vec<&dyn CheckStep>, cancel: &CancellationToken) -> DiagnosticRun {
        let started_at = Utc::now();
        let started = Instant::now();
        self.notify_phase(RunPhase::Running);
        info!(steps = steps.len(), "diagnostic run started");

        let ctx = StepContext::new(self.client.clone(), self.step_timeout, cancel.clone());
        let mut results = Vec::with_capacity(steps.len());

        for (index, step) in steps.into_iter().enumerate() {
            let component = step.component();
            let result = if cancel.is_cancelled() {
                skipped_result(component)
            } else {
                let step_started = Instant::now();
                debug!(component = %component, "running check step");
                let mut result = self.run_step(step, &ctx).await;
                result.component = component;
                log_result(&result, step_started.elapsed());
                result
            };

            if let Some(observer) = &self.observer {
                observer.on_result(index, &result);
            }
            results.push(result);
        }

        let summary = Summary::from_results(&results);
        info!(
            success = summary.success,
            warning = summary.warning,
            error = summary.error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "diagnostic run completed"
        );
        self.notify_phase(RunPhase::Completed);

        DiagnosticRun {
            results,
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            cancelled: cancel.is_cancelled(),
        }
    }

    async fn run_step(&self, step: &dyn CheckStep, ctx: &StepContext) -> CheckResult {
        let component = step.component();
        let guarded = AssertUnwindSafe(step.probe(ctx)).catch_unwind();

        let outcome = if step.manages_deadline() {
            Ok(guarded.await)
        } else {
            with_deadline(guarded, ctx.timeout, &ctx.cancel).await
        };

        match outcome {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => failure_result(component, &e),
            Ok(Err(panic)) => panic_result(component, panic),
            Err(Interrupted::TimedOut(t)) => timeout_result(component, t.0),
            Err(Interrupted::Cancelled) => cancelled_result(component),
        }
    }

    fn notify_phase(&self, phase: RunPhase) {
        if let Some(observer) = &self.observer {
            observer.on_phase(phase);
        }
    }
}

/// 标准检查序列
///
/// 连接、会话、各表、结构、远程过程，最后是写入探测。
pub fn standard_steps(config: &DiagnosticConfig) -> Vec<Box<dyn CheckStep>> {
    let table = config.blog_table.as_str();
    let mut steps: Vec<Box<dyn CheckStep>> = vec![
        Box::new(ConnectionProbe::new(table)),
        Box::new(SessionProbe),
        Box::new(TableProbe::new(table, config.sample_limit)),
    ];
    for extra in &config.extra_tables {
        steps.push(Box::new(TableProbe::new(extra.as_str(), config.sample_limit)));
    }
    steps.push(Box::new(SchemaProbe::blog(table, config.sample_limit)));
    for function in &config.rpc_functions {
        steps.push(Box::new(RpcProbe::new(function.as_str())));
    }
    if config.write_probe {
        steps.push(Box::new(WriteProbe::new(table)));
    }
    steps
}

fn panic_result(component: Component, panic: Box<dyn Any + Send>) -> CheckResult {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());

    CheckResult::error(
        component.clone(),
        format!("Unexpected error while checking {}", component),
    )
    .with_kind(FailureKind::Unclassified)
    .with_detail("raw_message", message)
    .with_detail("panicked", true)
}

fn log_result(result: &CheckResult, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    let kind = result.kind.map(|k| k.as_str()).unwrap_or("none");
    match result.status {
        CheckStatus::Success => {
            debug!(component = %result.component, elapsed_ms, "{}", result.message)
        }
        CheckStatus::Warning => {
            warn!(component = %result.component, kind, elapsed_ms, "{}", result.message)
        }
        CheckStatus::Error => {
            error!(component = %result.component, kind, elapsed_ms, "{}", result.message)
        }
    }
}

/// 以标准检查序列运行完整诊断
pub async fn run_full_diagnostic(
    client: Arc<dyn RemoteDataClient>,
    config: &DiagnosticConfig,
    cancel: &CancellationToken,
) -> Result<DiagnosticRun> {
    let runner = DiagnosticRunner::standard(client, config)?;
    Ok(runner.run(cancel).await)
}
