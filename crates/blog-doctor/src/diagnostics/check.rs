//! 诊断检查结果
//!
//! `CheckResult` 是一次检查的唯一产物：组件、状态、消息、细节与底层错误

use super::classify::FailureKind;
use crate::client::ClientError;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// 检查状态（按严重程度排序：Success < Warning < Error）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// 通过
    Success,
    /// 警告
    Warning,
    /// 失败
    Error,
}

impl CheckStatus {
    pub const ALL: [CheckStatus; 3] = [CheckStatus::Success, CheckStatus::Warning, CheckStatus::Error];

    pub fn icon(&self) -> &'static str {
        match self {
            CheckStatus::Success => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Success => "success",
            CheckStatus::Warning => "warning",
            CheckStatus::Error => "error",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 被检查的组件
///
/// 序列化为 `connection`、`table:blog_posts` 这样的标签
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// 基础连通性
    Connection,
    /// 当前会话
    Session,
    /// 表存在性与可读性
    Table(String),
    /// 表结构（必需列）
    Schema(String),
    /// 远程过程
    Rpc(String),
    /// 写入能力（创建并删除探测记录）
    Write(String),
    /// 其它自定义检查
    Custom(String),
}

impl Component {
    /// 组件关联的表或函数名
    pub fn target(&self) -> Option<&str> {
        match self {
            Component::Connection | Component::Session => None,
            Component::Table(t)
            | Component::Schema(t)
            | Component::Rpc(t)
            | Component::Write(t)
            | Component::Custom(t) => Some(t),
        }
    }

    /// 解析标签
    pub fn parse(tag: &str) -> Self {
        match tag.split_once(':') {
            Some(("table", t)) => Component::Table(t.to_string()),
            Some(("schema", t)) => Component::Schema(t.to_string()),
            Some(("rpc", f)) => Component::Rpc(f.to_string()),
            Some(("write", t)) => Component::Write(t.to_string()),
            _ => match tag {
                "connection" => Component::Connection,
                "session" => Component::Session,
                other => Component::Custom(other.to_string()),
            },
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Connection => f.write_str("connection"),
            Component::Session => f.write_str("session"),
            Component::Table(t) => write!(f, "table:{}", t),
            Component::Schema(t) => write!(f, "schema:{}", t),
            Component::Rpc(n) => write!(f, "rpc:{}", n),
            Component::Write(t) => write!(f, "write:{}", t),
            Component::Custom(n) => f.write_str(n),
        }
    }
}

impl Serialize for Component {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Component {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Component::parse(&tag))
    }
}

/// 细节值：封闭的基础类型集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl DetailValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DetailValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DetailValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            DetailValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Bool(b) => write!(f, "{}", b),
            DetailValue::Integer(n) => write!(f, "{}", n),
            DetailValue::Float(x) => write!(f, "{}", x),
            DetailValue::Text(s) => f.write_str(s),
            DetailValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        DetailValue::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        DetailValue::Text(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        DetailValue::Bool(value)
    }
}

impl From<i64> for DetailValue {
    fn from(value: i64) -> Self {
        DetailValue::Integer(value)
    }
}

impl From<u64> for DetailValue {
    fn from(value: u64) -> Self {
        DetailValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for DetailValue {
    fn from(value: usize) -> Self {
        DetailValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u16> for DetailValue {
    fn from(value: u16) -> Self {
        DetailValue::Integer(i64::from(value))
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        DetailValue::Float(value)
    }
}

impl From<Duration> for DetailValue {
    fn from(value: Duration) -> Self {
        DetailValue::from(value.as_millis() as u64)
    }
}

impl From<Vec<String>> for DetailValue {
    fn from(value: Vec<String>) -> Self {
        DetailValue::List(value)
    }
}

/// 有序的细节表
pub type Details = IndexMap<String, DetailValue>;

/// 诊断检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// 被检查的组件
    pub component: Component,
    /// 检查状态
    pub status: CheckStatus,
    /// 消息
    pub message: String,
    /// 失败分类（成功时为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    /// 详细信息
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub details: Details,
    /// 底层错误，仅用于调试
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ClientError>,
}

impl CheckResult {
    fn new(component: Component, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            component,
            status,
            message: message.into(),
            kind: None,
            details: Details::new(),
            cause: None,
        }
    }

    /// 创建通过的检查结果
    pub fn success(component: Component, message: impl Into<String>) -> Self {
        Self::new(component, CheckStatus::Success, message)
    }

    /// 创建警告的检查结果
    pub fn warning(component: Component, message: impl Into<String>) -> Self {
        Self::new(component, CheckStatus::Warning, message)
    }

    /// 创建失败的检查结果
    pub fn error(component: Component, message: impl Into<String>) -> Self {
        Self::new(component, CheckStatus::Error, message)
    }

    /// 添加一项细节
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 设置失败分类
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// 记录底层错误
    pub fn with_cause(mut self, cause: ClientError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn detail(&self, key: &str) -> Option<&DetailValue> {
        self.details.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.status == CheckStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(CheckStatus::Success < CheckStatus::Warning);
        assert!(CheckStatus::Warning < CheckStatus::Error);
        assert_eq!(CheckStatus::ALL.iter().max(), Some(&CheckStatus::Error));
    }

    #[test]
    fn test_component_tags() {
        let cases = [
            (Component::Connection, "connection"),
            (Component::Session, "session"),
            (Component::Table("blog_posts".into()), "table:blog_posts"),
            (Component::Schema("blog_posts".into()), "schema:blog_posts"),
            (Component::Rpc("refresh".into()), "rpc:refresh"),
            (Component::Write("blog_posts".into()), "write:blog_posts"),
            (Component::Custom("cdn".into()), "cdn"),
        ];
        for (component, tag) in cases {
            assert_eq!(component.to_string(), tag);
            assert_eq!(Component::parse(tag), component);
        }
    }

    #[test]
    fn test_component_target() {
        assert_eq!(Component::Connection.target(), None);
        assert_eq!(
            Component::Write("blog_posts".into()).target(),
            Some("blog_posts")
        );
    }

    #[test]
    fn test_check_result_builders() {
        let result = CheckResult::warning(Component::Session, "anonymous")
            .with_detail("user_id", "none")
            .with_detail("row_count", 3usize)
            .with_kind(FailureKind::PolicyDenied);

        assert_eq!(result.status, CheckStatus::Warning);
        assert_eq!(result.detail("row_count").and_then(|v| v.as_integer()), Some(3));
        assert_eq!(result.kind, Some(FailureKind::PolicyDenied));
        assert!(!result.is_success());
    }

    #[test]
    fn test_details_keep_insertion_order() {
        let result = CheckResult::success(Component::Connection, "ok")
            .with_detail("z", 1i64)
            .with_detail("a", 2i64);
        let keys: Vec<_> = result.details.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_serialize_check_result() {
        let result = CheckResult::error(Component::Table("blog_posts".into()), "missing")
            .with_kind(FailureKind::StructuralMissing)
            .with_detail("missing_columns", vec!["slug".to_string()]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["component"], "table:blog_posts");
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "structural_missing");
        assert_eq!(json["details"]["missing_columns"][0], "slug");
        assert!(json.get("cause").is_none());

        let back: CheckResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
