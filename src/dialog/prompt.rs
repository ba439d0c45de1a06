//! 提示词组装
//!
//! 系统消息列出当前智能体可用工具（name + description，缩进 JSON），并约定工具调用格式。

use serde::Serialize;

use crate::llm::Message;
use crate::store::Tool;

#[derive(Serialize)]
struct ToolSummary<'a> {
    name: &'a str,
    description: &'a str,
}

/// 一次 ask 内复用的消息构造器
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
}

impl PromptBuilder {
    pub fn for_tools(tools: &[Tool]) -> Self {
        let summaries: Vec<ToolSummary<'_>> = tools
            .iter()
            .map(|t| ToolSummary {
                name: &t.name,
                description: &t.description,
            })
            .collect();
        let listing = serde_json::to_string_pretty(&summaries).unwrap_or_else(|_| "[]".to_string());

        let system = format!(
            r#"You are an AI assistant with access to the following tools:
{listing}

When you need to use a tool, respond with a JSON object in this format:
{{
    "tool": "tool_name",
    "params": {{
        "param1": "value1",
        "param2": "value2"
    }}
}}

Otherwise, respond normally to the user's question."#
        );
        Self { system }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// 首轮：[system, user]
    pub fn primary(&self, question: &str) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(question)]
    }

    /// 工具执行后的第二轮：[system, user, assistant(首轮原文), user(工具结果)]
    pub fn secondary(&self, question: &str, assistant_raw: &str, tool_result: &str) -> Vec<Message> {
        vec![
            Message::system(&self.system),
            Message::user(question),
            Message::assistant(assistant_raw),
            Message::user(format!("Tool execution result: {}", tool_result)),
        ]
    }
}
