//! HTTP 工具执行器
//!
//! 按工具声明的配置拼出一次请求：路径占位符替换 -> base_url 与路径按 URL 相对解析规则拼接 ->
//! 合并请求头（强制 User-Agent 与 Accept: application/json）-> 渲染 body 模板并解析为 JSON ->
//! GET 用剩余参数作 query，其它方法发送 JSON body。响应体在调试信息中截断。
//! 连接失败或超时时重试一次；任何失败都以文本 + trace.error 返回，不向上抛。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Url};
use serde_json::{Map, Value};

use crate::config::ToolsSection;
use crate::core::ToolError;
use crate::store::{HttpToolConfig, Tool, ToolSpec};
use crate::tools::template::{param_to_string, render_body, substitute_path};
use crate::tools::{RequestTrace, ResponseTrace, ToolInvoker, ToolOutcome, ToolTrace};

/// 拼装完成、可直接发送的请求
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    /// 仅 GET 使用
    pub query: Vec<(String, String)>,
    /// 仅非 GET 使用
    pub body: Option<Value>,
}

pub struct HttpToolInvoker {
    client: Client,
    user_agent: String,
    preview_chars: usize,
    retry_transient: bool,
}

impl HttpToolInvoker {
    pub fn new(
        timeout_secs: u64,
        user_agent: impl Into<String>,
        preview_chars: usize,
        retry_transient: bool,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            user_agent: user_agent.into(),
            preview_chars,
            retry_transient,
        }
    }

    pub fn from_config(cfg: &ToolsSection) -> Self {
        Self::new(
            cfg.timeout_secs,
            cfg.user_agent.clone(),
            cfg.response_preview_chars,
            cfg.retry_transient,
        )
    }

    /// 由配置与参数拼装请求；同时把已确定的部分写入 trace（失败时 trace 保留到失败点为止）
    pub fn prepare(
        &self,
        cfg: &HttpToolConfig,
        params: &Map<String, Value>,
        trace: &mut RequestTrace,
    ) -> Result<PreparedRequest, ToolError> {
        let (endpoint_path, remaining) = substitute_path(&cfg.endpoint_path, params);
        trace.endpoint_path = endpoint_path.clone();
        trace.params = remaining.clone();

        let url = Url::parse(&cfg.base_url)
            .and_then(|base| base.join(&endpoint_path))
            .map_err(|e| ToolError::Url(format!("{}: {e}", cfg.base_url)))?;
        trace.combined_url = Some(url.to_string());

        let mut headers: BTreeMap<String, String> = cfg
            .headers
            .iter()
            .filter(|(k, _)| {
                !k.eq_ignore_ascii_case("user-agent") && !k.eq_ignore_ascii_case("accept")
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.insert("User-Agent".to_string(), self.user_agent.clone());
        headers.insert("Accept".to_string(), "application/json".to_string());
        trace.headers = headers.clone();

        let parsed_body = if cfg.body_template.is_empty() {
            None
        } else {
            let rendered = render_body(&cfg.body_template, &remaining)?;
            let body: Value = serde_json::from_str(&rendered)
                .map_err(|e| ToolError::BodyParse(format!("{e}: {rendered}")))?;
            Some(body)
        };

        let method = Method::from_bytes(cfg.http_method.as_bytes())
            .map_err(|e| ToolError::Request(format!("invalid method {}: {e}", cfg.http_method)))?;

        let (query, body) = if method == Method::GET {
            let query = remaining
                .iter()
                .map(|(k, v)| (k.clone(), param_to_string(v)))
                .collect();
            (query, None)
        } else {
            (Vec::new(), parsed_body)
        };
        trace.body = body.clone();

        Ok(PreparedRequest {
            method,
            url,
            headers,
            query,
            body,
        })
    }

    fn build(&self, prepared: &PreparedRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(prepared.method.clone(), prepared.url.clone());
        for (name, value) in &prepared.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !prepared.query.is_empty() {
            builder = builder.query(&prepared.query);
        }
        if let Some(body) = &prepared.body {
            builder = builder.json(body);
        }
        builder
    }

    /// 发送请求；连接失败 / 超时按配置重试一次
    async fn send(&self, prepared: &PreparedRequest) -> Result<reqwest::Response, reqwest::Error> {
        match self.build(prepared).send().await {
            Err(e) if self.retry_transient && (e.is_connect() || e.is_timeout()) => {
                tracing::warn!(url = %prepared.url, error = %e, "tool request failed, retrying once");
                self.build(prepared).send().await
            }
            other => other,
        }
    }

    async fn capture(&self, response: reqwest::Response) -> Result<(ResponseTrace, String), ToolError> {
        let status_code = response.status().as_u16();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::Request(format!("read body: {e}")))?;
        let preview = truncate_chars(&text, self.preview_chars);
        Ok((
            ResponseTrace {
                status_code,
                headers,
                text: preview,
            },
            text,
        ))
    }

    async fn execute_http(
        &self,
        tool: &mut Tool,
        cfg: &HttpToolConfig,
        params: &Map<String, Value>,
        trace: &mut ToolTrace,
    ) -> Result<String, ToolError> {
        let prepared = self.prepare(cfg, params, &mut trace.request)?;

        let sent = self.send(&prepared).await;
        tool.last_used = Some(Utc::now());
        let response = sent.map_err(|e| ToolError::Request(e.to_string()))?;

        let (response_trace, full_text) = self.capture(response).await?;
        trace.response = Some(response_trace);
        Ok(full_text)
    }
}

#[async_trait]
impl ToolInvoker for HttpToolInvoker {
    async fn execute(&self, tool: &mut Tool, params: &Value) -> ToolOutcome {
        let start = Instant::now();
        let object = params.as_object();
        let cfg = match &tool.spec {
            ToolSpec::HttpApi(cfg) => Some(cfg.clone()),
            ToolSpec::Other { .. } => None,
        };

        let mut trace = ToolTrace::new(
            tool.name.clone(),
            RequestTrace {
                method: cfg.as_ref().map(|c| c.http_method.clone()).unwrap_or_default(),
                base_url: cfg.as_ref().map(|c| c.base_url.clone()).unwrap_or_default(),
                endpoint_path: cfg.as_ref().map(|c| c.endpoint_path.clone()).unwrap_or_default(),
                headers: cfg.as_ref().map(|c| c.headers.clone()).unwrap_or_default(),
                params: object.cloned().unwrap_or_default(),
                ..RequestTrace::default()
            },
        );

        let result = match (&cfg, object) {
            (None, _) => Err(ToolError::UnsupportedKind(tool.kind().to_string())),
            (Some(_), None) => Err(ToolError::InvalidParams(params.to_string())),
            (Some(cfg), Some(params)) => self.execute_http(tool, cfg, params, &mut trace).await,
        };

        let outcome = match result {
            Ok(text) => ToolOutcome {
                result: format!("Tool '{}' executed successfully. Response: {}", tool.name, text),
                trace,
            },
            Err(e) => {
                trace.error = Some(e.to_string());
                ToolOutcome {
                    result: format!("Error executing tool '{}': {}", tool.name, e),
                    trace,
                }
            }
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool.name,
            "ok": outcome.succeeded(),
            "status": outcome.trace.response.as_ref().map(|r| r.status_code),
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        outcome
    }
}

/// 超过 max_chars 个字符时截断并追加 "..."
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoker() -> HttpToolInvoker {
        HttpToolInvoker::new(5, "Mozilla/5.0", 1000, false)
    }

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prepare_get_path_and_query() {
        let cfg = HttpToolConfig::new("https://api.example.com/", "GET", "/items/<id>");
        let mut trace = RequestTrace::default();
        let req = invoker()
            .prepare(&cfg, &params(json!({"id": 42, "verbose": true})), &mut trace)
            .unwrap();

        assert_eq!(req.url.as_str(), "https://api.example.com/items/42");
        assert_eq!(req.query, vec![("verbose".to_string(), "true".to_string())]);
        assert!(req.body.is_none());
        assert_eq!(trace.endpoint_path, "/items/42");
        assert_eq!(trace.combined_url.as_deref(), Some("https://api.example.com/items/42"));
        assert!(!trace.params.contains_key("id"));
    }

    #[test]
    fn test_prepare_url_join_rules() {
        let mut trace = RequestTrace::default();
        // 无尾斜杠的 base 在相对路径拼接时丢弃最后一段
        let cfg = HttpToolConfig::new("https://api.example.com/v1/users", "GET", "items");
        let req = invoker().prepare(&cfg, &Map::new(), &mut trace).unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.com/v1/items");

        // 绝对路径替换整个路径
        let cfg = HttpToolConfig::new("https://api.example.com/v1/", "GET", "/items");
        let req = invoker().prepare(&cfg, &Map::new(), &mut trace).unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.com/items");
    }

    #[test]
    fn test_prepare_post_body_without_path_params() {
        let cfg = HttpToolConfig::new("https://api.example.com", "POST", "/users/<id>")
            .with_body_template(r#"{"name":"$name"}"#);
        let mut trace = RequestTrace::default();
        let req = invoker()
            .prepare(&cfg, &params(json!({"id": 7, "name": "a"})), &mut trace)
            .unwrap();

        assert_eq!(req.body, Some(json!({"name": "a"})));
        assert!(req.query.is_empty());
        assert_eq!(req.url.as_str(), "https://api.example.com/users/7");
    }

    #[test]
    fn test_path_param_not_available_to_body() {
        let cfg = HttpToolConfig::new("https://api.example.com", "POST", "/users/<id>")
            .with_body_template(r#"{"id":"$id"}"#);
        let mut trace = RequestTrace::default();
        let err = invoker()
            .prepare(&cfg, &params(json!({"id": 7})), &mut trace)
            .unwrap_err();
        assert!(matches!(err, ToolError::TemplateSubstitution(_)));
    }

    #[test]
    fn test_forced_headers_override_tool_headers() {
        let cfg = HttpToolConfig::new("https://api.example.com", "GET", "/")
            .with_header("accept", "text/html")
            .with_header("user-agent", "custom")
            .with_header("X-Api-Key", "secret");
        let mut trace = RequestTrace::default();
        let req = invoker().prepare(&cfg, &Map::new(), &mut trace).unwrap();

        assert_eq!(req.headers.len(), 3);
        assert_eq!(req.headers["Accept"], "application/json");
        assert_eq!(req.headers["User-Agent"], "Mozilla/5.0");
        assert_eq!(req.headers["X-Api-Key"], "secret");
    }

    #[test]
    fn test_invalid_body_json() {
        let cfg = HttpToolConfig::new("https://api.example.com", "POST", "/")
            .with_body_template(r#"{"n": $n"#);
        let mut trace = RequestTrace::default();
        let err = invoker()
            .prepare(&cfg, &params(json!({"n": 1})), &mut trace)
            .unwrap_err();
        assert!(matches!(err, ToolError::BodyParse(_)));
        // URL 已拼好，body 未写入
        assert!(trace.combined_url.is_some());
        assert!(trace.body.is_none());
    }

    #[tokio::test]
    async fn test_template_error_is_data_and_skips_network() {
        let cfg = HttpToolConfig::new("https://api.example.com", "POST", "/")
            .with_body_template(r#"{"q":"$missing"}"#);
        let mut tool = Tool::http("search", "d", cfg).unwrap();

        let outcome = invoker().execute(&mut tool, &json!({})).await;
        assert!(!outcome.succeeded());
        assert!(outcome.result.starts_with("Error executing tool 'search':"));
        assert!(outcome.trace.response.is_none());
        assert!(tool.last_used.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_data() {
        let mut tool = Tool::new("gh", "d", "github", json!({})).unwrap();
        let outcome = invoker().execute(&mut tool, &json!({})).await;
        assert_eq!(
            outcome.trace.error.as_deref(),
            Some("unsupported tool kind: github")
        );
    }

    #[tokio::test]
    async fn test_connection_failure_is_data_and_marks_last_used() {
        // 端口 1 上通常没有服务，连接立即被拒绝
        let cfg = HttpToolConfig::new("http://127.0.0.1:1", "GET", "/x");
        let mut tool = Tool::http("down", "d", cfg).unwrap();

        let outcome = invoker().execute(&mut tool, &json!({})).await;
        assert!(!outcome.succeeded());
        assert!(outcome.trace.error.is_some());
        assert!(outcome.trace.response.is_none());
        assert!(tool.last_used.is_some());
    }

    #[tokio::test]
    async fn test_unparseable_base_url_is_data() {
        let cfg = HttpToolConfig::new("not a url", "GET", "/items");
        let mut tool = Tool::http("broken", "d", cfg).unwrap();

        let outcome = invoker().execute(&mut tool, &json!({"q": "x"})).await;
        assert!(outcome.result.starts_with("Error executing tool 'broken': invalid URL"));
        assert!(outcome.trace.error.as_deref().unwrap().starts_with("invalid URL: not a url"));
        assert!(outcome.trace.request.combined_url.is_none());
        assert!(outcome.trace.response.is_none());
        assert!(tool.last_used.is_none());
    }

    #[tokio::test]
    async fn test_non_object_params_is_data() {
        let cfg = HttpToolConfig::new("http://127.0.0.1:1", "GET", "/x");
        let mut tool = Tool::http("down", "d", cfg).unwrap();

        let outcome = invoker().execute(&mut tool, &json!("city=Lagos")).await;
        assert_eq!(
            outcome.result,
            r#"Error executing tool 'down': params must be a JSON object, got: "city=Lagos""#
        );
        assert!(outcome.trace.request.params.is_empty());
        assert!(outcome.trace.response.is_none());
        assert!(tool.last_used.is_none());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
    }
}
