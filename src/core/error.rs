//! 错误类型
//!
//! - ToolConfigError：http_api 工具配置缺字段 / 方法非法，构造（含反序列化）时即失败
//! - ToolError：单次工具调用中的失败，只在 ToolInvoker 内部出现并被转为文本结果与调试信息
//! - AgentError：一次 ask / 目录操作对调用方可见的错误

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

/// 工具配置错误（ConfigurationError）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolConfigError {
    #[error("http_api tool '{tool}' is missing required config field '{field}'")]
    MissingField { tool: String, field: &'static str },

    #[error("http_api tool '{tool}' has invalid http_method '{method}'")]
    InvalidMethod { tool: String, method: String },

    #[error("tool '{tool}' has malformed config: {reason}")]
    Malformed { tool: String, reason: String },
}

/// 工具执行错误（ToolExecutionError），永不越过 ToolInvoker 边界
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid URL: {0}")]
    Url(String),

    #[error("template substitution failed: {0}")]
    TemplateSubstitution(String),

    #[error("body is not valid JSON: {0}")]
    BodyParse(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unsupported tool kind: {0}")]
    UnsupportedKind(String),

    #[error("params must be a JSON object, got: {0}")]
    InvalidParams(String),
}

/// ask / 推荐 / 目录操作的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent {0} not found")]
    AgentNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("No question provided")]
    EmptyQuestion,

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("Cannot delete tool \"{tool}\" as it is being used by the following agents: {}", .agents.join(", "))]
    ToolInUse { tool: String, agents: Vec<String> },

    #[error("Config error: {0}")]
    Config(#[from] ToolConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 流水线中未预期的失败；交互日志已落盘，调用方只拿到通用信息
    #[error("Orchestration failed: {0}")]
    Orchestration(String),
}
