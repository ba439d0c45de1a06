//! 交互日志：一次 ask 内追加事件，结束时落盘一次
//!
//! finish 消耗 self，保证每次 ask 只写一条 InteractionLog；写盘失败只记 error 日志，不影响 ask 结果。

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::dialog::{DebugEvent, EventKind};
use crate::store::{InteractionLog, Store};

pub struct InteractionLogger {
    agent_name: String,
    question: String,
    events: Vec<DebugEvent>,
}

impl InteractionLogger {
    pub fn new(agent_name: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            question: question.into(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, kind: EventKind, payload: Value) {
        tracing::debug!(agent = %self.agent_name, event = ?kind, "debug event");
        self.events.push(DebugEvent::new(kind, payload));
    }

    pub fn events(&self) -> &[DebugEvent] {
        &self.events
    }

    /// 组装并持久化交互日志，返回写入的记录
    pub fn finish(self, store: &dyn Store, response: &str, tools_used: &[String]) -> InteractionLog {
        let log = InteractionLog {
            id: Uuid::new_v4(),
            agent_name: self.agent_name,
            question: self.question,
            response: response.to_string(),
            tools_used: tools_used.to_vec(),
            debug_log: self.events,
            timestamp: Utc::now(),
        };
        if let Err(e) = store.save_interaction_log(&log) {
            tracing::error!(agent = %log.agent_name, error = %e, "failed to save interaction log");
        }
        log
    }
}
