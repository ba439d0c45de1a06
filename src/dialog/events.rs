//! ask 过程事件：按产生顺序追加，随交互日志一起落盘
//!
//! 序列化为扁平 JSON：{"timestamp": ..., "event": "<kind>", ...payload}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 事件类型（wire 名称与历史日志保持一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RequestReceived,
    ToolsLoaded,
    /// 即将请求补全服务
    #[serde(rename = "groq_api_call")]
    CompletionRequested,
    #[serde(rename = "groq_response_received")]
    CompletionReceived,
    ToolRequestDetected,
    ToolExecutionStarted,
    ToolExecutionCompleted,
    ToolNotFound,
    NoToolRequest,
    Error,
}

/// 单条调试事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugEvent {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl DebugEvent {
    /// payload 为 JSON 对象时直接展开，其它值放在 "detail" 键下
    pub fn new(event: EventKind, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("detail".to_string(), other);
                map
            }
        };
        Self {
            timestamp: Utc::now(),
            event,
            payload,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_flat() {
        let ev = DebugEvent::new(
            EventKind::CompletionRequested,
            json!({"model": "m", "context": "tool_result_interpretation"}),
        );
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "groq_api_call");
        assert_eq!(v["model"], "m");
        assert!(v["timestamp"].is_string());

        let back: DebugEvent = serde_json::from_value(v).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn test_non_object_payload_wrapped() {
        let ev = DebugEvent::new(EventKind::Error, json!("boom"));
        assert_eq!(ev.get("detail"), Some(&json!("boom")));
        assert_eq!(
            serde_json::to_value(EventKind::NoToolRequest).unwrap(),
            json!("no_tool_request")
        );
    }
}
