//! PostgREST / Supabase 客户端
//!
//! 通过 `reqwest` 访问 `rest/v1` 与 `auth/v1` 接口

use super::{ClientError, QueryOptions, QueryResponse, RemoteDataClient, Session};
use crate::config::DiagnosticConfig;
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// PostgREST 错误响应体
#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<Value>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    details: Option<Value>,
    hint: Option<String>,
}

/// Auth `/user` 响应
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    role: Option<String>,
}

/// Supabase REST 客户端
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    access_token: Option<String>,
}

impl PostgrestClient {
    /// 创建客户端
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, anon_key, Duration::from_secs(30))
    }

    /// 创建带请求超时的客户端
    pub fn with_timeout(
        base_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| ClientError::decode(format!("invalid base url {}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let anon_key = anon_key.into();
        if anon_key.trim().is_empty() {
            return Err(ClientError::decode("anon key is empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            anon_key,
            access_token: None,
        })
    }

    /// 从诊断配置创建客户端
    pub fn from_config(config: &DiagnosticConfig) -> Result<Self, ClientError> {
        let client = Self::with_timeout(
            &config.supabase_url,
            config.anon_key.clone(),
            Duration::from_millis(config.step_timeout_ms),
        )?;
        Ok(match &config.access_token {
            Some(token) => client.with_access_token(token.clone()),
            None => client,
        })
    }

    /// 使用用户访问令牌
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::decode(format!("invalid endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.authorize(request).send().await.map_err(transport_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

/// 传输层错误映射
fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout(err.to_string())
    } else if err.is_decode() {
        ClientError::decode(err.to_string())
    } else {
        ClientError::network(err.to_string())
    }
}

/// 把非 2xx 响应解析为结构化错误
async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return transport_error(e).with_status(status.as_u16()),
    };

    let body: PostgrestErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let code = body.code.and_then(|c| match c {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let message = body
        .message
        .or(body.msg)
        .or(body.error_description)
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text.clone()
            }
        });

    let mut error = ClientError::api(Some(status.as_u16()), code, message);
    if let Some(hint) = body.hint {
        error = error.with_hint(hint);
    }
    match body.details {
        Some(Value::String(details)) => error = error.with_details(details),
        Some(Value::Null) | None => {}
        Some(other) => error = error.with_details(other.to_string()),
    }
    error
}

/// 解析 `Content-Range: 0-4/57` 中的总数
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next().and_then(|total| total.parse().ok())
}

#[async_trait]
impl RemoteDataClient for PostgrestClient {
    async fn query(
        &self,
        collection: &str,
        options: QueryOptions,
    ) -> Result<QueryResponse, ClientError> {
        let url = self.endpoint(&format!("rest/v1/{}", collection))?;

        let mut params: Vec<(String, String)> = vec![(
            "select".to_string(),
            options.select.clone().unwrap_or_else(|| "*".to_string()),
        )];
        if let Some(limit) = options.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        for (column, value) in &options.filters {
            params.push((column.clone(), format!("eq.{}", value)));
        }

        let mut request = self.http.get(url).query(&params);
        if options.count {
            request = request.header("Prefer", "count=exact");
        }

        debug!(collection, ?params, "PostgREST query");
        let response = self.send(request).await?;

        let count = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<Value> = response.json().await.map_err(transport_error)?;

        Ok(QueryResponse { rows, count })
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, ClientError> {
        let url = self.endpoint(&format!("rest/v1/{}", collection))?;
        let request = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&record);

        debug!(collection, "PostgREST insert");
        let response = self.send(request).await?;
        let rows: Vec<Value> = response.json().await.map_err(transport_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ClientError::decode("insert returned no row"))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("rest/v1/{}", collection))?;
        let request = self
            .http
            .delete(url)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal");

        debug!(collection, id, "PostgREST delete");
        self.send(request).await?;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };

        let url = self.endpoint("auth/v1/user")?;
        let request = self
            .http
            .get(url)
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", token));

        let response = request.send().await.map_err(transport_error)?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("access token rejected, treating session as anonymous");
                Ok(None)
            }
            status if status.is_success() => {
                let user: AuthUser = response.json().await.map_err(transport_error)?;
                Ok(Some(Session {
                    user_id: user.id,
                    email: user.email,
                    role: user.role,
                }))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    async fn call_rpc(&self, function: &str, args: Value) -> Result<Value, ClientError> {
        let url = self.endpoint(&format!("rest/v1/rpc/{}", function))?;
        let request = self.http.post(url).json(&args);

        debug!(function, "PostgREST rpc");
        let response = self.send(request).await?;
        let text = response.text().await.map_err(transport_error)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::decode(e.to_string()))
    }
}
