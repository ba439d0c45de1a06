//! 工具调用接口与调试轨迹
//!
//! ToolInvoker::execute 永不返回错误：失败被转成 "Error executing tool ..." 文本，
//! 并在 ToolTrace.error 中记录；成功时 ToolTrace.response 记录状态码、响应头与截断后的响应体。

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Tool;

/// 发出的请求（无论是否真正发出都会记录到失败点为止的信息）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestTrace {
    pub method: String,
    pub base_url: String,
    /// 替换 `<param>` 后的路径
    pub endpoint_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// 发送时的参数（已去掉被路径消耗的参数）
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTrace {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// 截断后的响应体
    pub text: String,
}

/// 单次工具调用的结构化调试信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTrace {
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    pub request: RequestTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolTrace {
    pub fn new(tool_name: impl Into<String>, request: RequestTrace) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            request,
            response: None,
            error: None,
        }
    }
}

/// 工具调用结果：给模型看的文本 + 调试轨迹
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub result: String,
    pub trace: ToolTrace,
}

impl ToolOutcome {
    pub fn succeeded(&self) -> bool {
        self.trace.error.is_none()
    }
}

/// 工具执行器接口；tool 以可变借用传入，以便更新 last_used。
/// params 原样来自模型回复，不是对象时由实现返回错误结果
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn execute(&self, tool: &mut Tool, params: &Value) -> ToolOutcome;
}
