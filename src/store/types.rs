//! 持久化记录：Tool、Agent、InteractionLog
//!
//! Tool 的配置按 kind 分为带标签的变体：http_api 必须带 base_url / http_method / endpoint_path，
//! 否则构造失败（反序列化同样走这条校验）。落盘格式保持 {"name","description","type","config",...}。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::DEFAULT_MODEL;
use crate::core::ToolConfigError;
use crate::dialog::DebugEvent;

/// http_api 工具的 kind 标识
pub const HTTP_API_KIND: &str = "http_api";

/// http_api 工具配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpToolConfig {
    pub base_url: String,
    /// 大写 HTTP 方法，如 GET / POST
    pub http_method: String,
    /// 含 `<param>` 占位符的路径模板
    pub endpoint_path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 含 `$param` 占位符的 JSON body 模板；空串表示无 body
    #[serde(default)]
    pub body_template: String,
}

impl HttpToolConfig {
    pub fn new(
        base_url: impl Into<String>,
        http_method: impl Into<String>,
        endpoint_path: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            http_method: http_method.into(),
            endpoint_path: endpoint_path.into(),
            headers: BTreeMap::new(),
            body_template: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body_template(mut self, template: impl Into<String>) -> Self {
        self.body_template = template.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.http_method.eq_ignore_ascii_case("GET")
    }
}

/// 按 kind 区分的工具配置
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSpec {
    HttpApi(HttpToolConfig),
    /// 其它 kind（github / slack / custom ...）：配置原样保留，不可由 HttpToolInvoker 执行
    Other { kind: String, config: Value },
}

impl ToolSpec {
    pub fn kind(&self) -> &str {
        match self {
            ToolSpec::HttpApi(_) => HTTP_API_KIND,
            ToolSpec::Other { kind, .. } => kind,
        }
    }
}

/// 工具记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ToolRecord", into = "ToolRecord")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub spec: ToolSpec,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Tool {
    /// 由 kind + 原始配置构造；http_api 缺必填字段时返回 ToolConfigError
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: &str,
        config: Value,
    ) -> Result<Self, ToolConfigError> {
        let name = name.into();
        let spec = if kind == HTTP_API_KIND {
            ToolSpec::HttpApi(validate_http_config(&name, &config)?)
        } else {
            ToolSpec::Other {
                kind: kind.to_string(),
                config,
            }
        };
        Ok(Self {
            name,
            description: description.into(),
            spec,
            is_active: true,
            created_at: Utc::now(),
            last_used: None,
        })
    }

    /// 由已类型化的 http_api 配置构造（同样做校验）
    pub fn http(
        name: impl Into<String>,
        description: impl Into<String>,
        config: HttpToolConfig,
    ) -> Result<Self, ToolConfigError> {
        let name = name.into();
        let raw = serde_json::to_value(&config).map_err(|e| ToolConfigError::Malformed {
            tool: name.clone(),
            reason: e.to_string(),
        })?;
        Self::new(name, description, HTTP_API_KIND, raw)
    }

    pub fn kind(&self) -> &str {
        self.spec.kind()
    }
}

/// 校验 http_api 配置并规范化（方法转大写、headers 值转字符串、null body 视为空）
fn validate_http_config(tool: &str, config: &Value) -> Result<HttpToolConfig, ToolConfigError> {
    let obj = config.as_object().ok_or_else(|| ToolConfigError::Malformed {
        tool: tool.to_string(),
        reason: "config must be an object".to_string(),
    })?;

    let required = |field: &'static str, allow_empty: bool| -> Result<String, ToolConfigError> {
        match obj.get(field) {
            Some(Value::String(s)) if allow_empty || !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(ToolConfigError::MissingField {
                tool: tool.to_string(),
                field,
            }),
        }
    };

    let base_url = required("base_url", false)?;
    let http_method = required("http_method", false)?.trim().to_ascii_uppercase();
    let endpoint_path = required("endpoint_path", true)?;

    if reqwest::Method::from_bytes(http_method.as_bytes()).is_err() {
        return Err(ToolConfigError::InvalidMethod {
            tool: tool.to_string(),
            method: http_method,
        });
    }

    let headers = match obj.get("headers") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        Some(_) => {
            return Err(ToolConfigError::Malformed {
                tool: tool.to_string(),
                reason: "headers must be an object".to_string(),
            })
        }
    };

    let body_template = match obj.get("body_template") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(ToolConfigError::Malformed {
                tool: tool.to_string(),
                reason: "body_template must be a string".to_string(),
            })
        }
    };

    Ok(HttpToolConfig {
        base_url,
        http_method,
        endpoint_path,
        headers,
        body_template,
    })
}

/// 落盘格式
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: Value,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    last_used: Option<DateTime<Utc>>,
}

impl TryFrom<ToolRecord> for Tool {
    type Error = ToolConfigError;

    fn try_from(r: ToolRecord) -> Result<Self, Self::Error> {
        let mut tool = Tool::new(r.name, r.description, &r.kind, r.config)?;
        tool.is_active = r.is_active;
        tool.created_at = r.created_at;
        tool.last_used = r.last_used;
        Ok(tool)
    }
}

impl From<Tool> for ToolRecord {
    fn from(t: Tool) -> Self {
        let (kind, config) = match t.spec {
            ToolSpec::HttpApi(cfg) => (
                HTTP_API_KIND.to_string(),
                serde_json::to_value(cfg).unwrap_or_default(),
            ),
            ToolSpec::Other { kind, config } => (kind, config),
        };
        Self {
            name: t.name,
            description: t.description,
            kind,
            config,
            is_active: t.is_active,
            created_at: t.created_at,
            last_used: t.last_used,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

/// 智能体：模型 + 采样参数 + 工具名引用（按名延迟解析，缺失的引用静默跳过）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub description: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            tools: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
            last_active: None,
        }
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, temperature: f64, max_tokens: u32) -> Self {
        self.model = model.into();
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// 一次 ask 的完整记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    pub id: Uuid,
    pub agent_name: String,
    pub question: String,
    pub response: String,
    pub tools_used: Vec<String>,
    pub debug_log: Vec<DebugEvent>,
    pub timestamp: DateTime<Utc>,
}
