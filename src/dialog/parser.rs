//! 工具调用识别
//!
//! 整段回复是 JSON 对象且同时含 "tool" 与 "params" 两个键，即视为工具调用，不看值的类型；
//! 其它情况（非 JSON、JSON 数组、缺键）一律按普通文本原样作为回答。
//! 非字符串的 tool 取其紧凑 JSON 文本（按名找不到工具），非对象的 params 交给执行器报错。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 模型请求的一次工具调用（{"tool": "weather", "params": {"city": "Lagos"}}）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub params: Value,
}

/// 补全回复的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    ToolCall(ToolCall),
    PlainText(String),
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let Ok(Value::Object(mut obj)) = serde_json::from_str::<Value>(raw) else {
        return ParsedReply::PlainText(raw.to_string());
    };
    match (obj.remove("tool"), obj.remove("params")) {
        (Some(tool), Some(params)) => {
            let tool = match tool {
                Value::String(name) => name,
                other => other.to_string(),
            };
            ParsedReply::ToolCall(ToolCall { tool, params })
        }
        _ => ParsedReply::PlainText(raw.to_string()),
    }
}
