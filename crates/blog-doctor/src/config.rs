//! 诊断配置
//!
//! 支持 YAML 配置文件与环境变量覆盖

use crate::error::{DiagnosticError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// 环境变量：Supabase 项目地址
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
/// 环境变量：匿名 key
pub const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
/// 环境变量：用户访问令牌
pub const ENV_SUPABASE_ACCESS_TOKEN: &str = "SUPABASE_ACCESS_TOKEN";
/// 环境变量：单步超时（毫秒）
pub const ENV_STEP_TIMEOUT_MS: &str = "BLOG_DOCTOR_STEP_TIMEOUT_MS";

/// 诊断配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// Supabase 项目地址
    #[serde(default)]
    pub supabase_url: String,
    /// 匿名 key
    #[serde(default)]
    pub anon_key: String,
    /// 用户访问令牌（可选）
    #[serde(default)]
    pub access_token: Option<String>,
    /// 单步超时（毫秒）
    #[serde(default = "default_step_timeout")]
    pub step_timeout_ms: u64,
    /// 采样行数
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,
    /// 博客主表
    #[serde(default = "default_blog_table")]
    pub blog_table: String,
    /// 额外探测的表
    #[serde(default = "default_extra_tables")]
    pub extra_tables: Vec<String>,
    /// 需要探测的远程过程
    #[serde(default)]
    pub rpc_functions: Vec<String>,
    /// 是否执行写入探测
    #[serde(default = "default_write_probe")]
    pub write_probe: bool,
}

fn default_step_timeout() -> u64 {
    10000
}
fn default_sample_limit() -> usize {
    5
}
fn default_blog_table() -> String {
    "blog_posts".to_string()
}
fn default_extra_tables() -> Vec<String> {
    vec!["published_blog_posts".to_string()]
}
fn default_write_probe() -> bool {
    true
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            anon_key: String::new(),
            access_token: None,
            step_timeout_ms: default_step_timeout(),
            sample_limit: default_sample_limit(),
            blog_table: default_blog_table(),
            extra_tables: default_extra_tables(),
            rpc_functions: Vec::new(),
            write_probe: default_write_probe(),
        }
    }
}

impl DiagnosticConfig {
    /// 默认配置文件路径 (~/.config/blog-doctor/config.yaml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("blog-doctor").join("config.yaml"))
    }

    /// 加载配置：文件（可选）→ 环境变量覆盖 → 校验
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::resolve(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取文件并应用环境变量，不做校验
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    /// 从 YAML 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// 应用环境变量覆盖
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_SUPABASE_URL) {
            self.supabase_url = url;
        }
        if let Ok(key) = std::env::var(ENV_SUPABASE_ANON_KEY) {
            self.anon_key = key;
        }
        if let Ok(token) = std::env::var(ENV_SUPABASE_ACCESS_TOKEN) {
            if !token.trim().is_empty() {
                self.access_token = Some(token);
            }
        }
        if let Ok(timeout) = std::env::var(ENV_STEP_TIMEOUT_MS) {
            self.step_timeout_ms = timeout.trim().parse().map_err(|_| {
                DiagnosticError::config(format!(
                    "{} must be a number of milliseconds, got {:?}",
                    ENV_STEP_TIMEOUT_MS, timeout
                ))
            })?;
        }
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.supabase_url.trim().is_empty() {
            return Err(DiagnosticError::config(format!(
                "supabase_url is empty (set it in the config file or {})",
                ENV_SUPABASE_URL
            )));
        }
        let url = Url::parse(&self.supabase_url).map_err(|e| {
            DiagnosticError::config(format!("supabase_url {:?}: {}", self.supabase_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DiagnosticError::config(format!(
                "supabase_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(DiagnosticError::config(format!(
                "anon_key is empty (set it in the config file or {})",
                ENV_SUPABASE_ANON_KEY
            )));
        }
        if self.step_timeout_ms == 0 {
            return Err(DiagnosticError::config("step_timeout_ms must be positive"));
        }
        if self.blog_table.trim().is_empty() {
            return Err(DiagnosticError::config("blog_table is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ALL_VARS: [&str; 4] = [
        ENV_SUPABASE_URL,
        ENV_SUPABASE_ANON_KEY,
        ENV_SUPABASE_ACCESS_TOKEN,
        ENV_STEP_TIMEOUT_MS,
    ];

    fn valid() -> DiagnosticConfig {
        DiagnosticConfig {
            supabase_url: "https://demo.supabase.co".to_string(),
            anon_key: "anon".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DiagnosticConfig::default();
        assert_eq!(config.step_timeout_ms, 10000);
        assert_eq!(config.sample_limit, 5);
        assert_eq!(config.blog_table, "blog_posts");
        assert_eq!(config.extra_tables, vec!["published_blog_posts"]);
        assert!(config.write_probe);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: DiagnosticConfig = serde_yaml::from_str(
            "supabase_url: https://demo.supabase.co\nanon_key: anon\nwrite_probe: false\n",
        )
        .unwrap();
        assert!(!config.write_probe);
        assert_eq!(config.step_timeout_ms, 10000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_url() {
        let config = DiagnosticConfig {
            supabase_url: String::new(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(DiagnosticError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = DiagnosticConfig {
            supabase_url: "ftp://demo.supabase.co".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = DiagnosticConfig {
            step_timeout_ms: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "supabase_url: https://file.supabase.co\nanon_key: file-key\nsample_limit: 3"
        )
        .unwrap();

        temp_env::with_vars(
            [
                (ENV_SUPABASE_URL, None),
                (ENV_SUPABASE_ANON_KEY, Some("env-key")),
                (ENV_SUPABASE_ACCESS_TOKEN, None),
                (ENV_STEP_TIMEOUT_MS, Some("2500")),
            ],
            || {
                let config = DiagnosticConfig::load(Some(file.path())).unwrap();
                assert_eq!(config.supabase_url, "https://file.supabase.co");
                assert_eq!(config.anon_key, "env-key");
                assert_eq!(config.sample_limit, 3);
                assert_eq!(config.step_timeout_ms, 2500);
            },
        );
    }

    #[test]
    fn test_resolve_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpc_functions: [refresh_blog_stats]").unwrap();

        temp_env::with_vars(ALL_VARS.map(|name| (name, None::<&str>)), || {
            let config = DiagnosticConfig::resolve(Some(file.path())).unwrap();
            assert_eq!(config.rpc_functions, vec!["refresh_blog_stats"]);
            assert!(DiagnosticConfig::load(Some(file.path())).is_err());
        });
    }

    #[test]
    fn test_invalid_timeout_env() {
        let vars = ALL_VARS.map(|name| {
            let value = (name == ENV_STEP_TIMEOUT_MS).then_some("soon");
            (name, value)
        });
        temp_env::with_vars(vars, || {
            let mut config = valid();
            assert!(config.apply_env().is_err());
        });
    }

    #[test]
    fn test_blank_access_token_is_ignored() {
        temp_env::with_vars(
            [
                (ENV_SUPABASE_URL, None),
                (ENV_SUPABASE_ANON_KEY, None),
                (ENV_SUPABASE_ACCESS_TOKEN, Some("  ")),
                (ENV_STEP_TIMEOUT_MS, None),
            ],
            || {
                let mut config = valid();
                config.apply_env().unwrap();
                assert!(config.access_token.is_none());
            },
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DiagnosticConfig::from_file(Path::new("/nonexistent/blog-doctor.yaml"))
            .unwrap_err();
        assert!(matches!(err, DiagnosticError::Io(_)));
    }
}
