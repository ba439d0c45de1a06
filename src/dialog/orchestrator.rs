//! 单轮工具调用编排
//!
//! INIT → 首轮补全 → [识别到工具调用 → 执行工具 → 第二轮补全] → DONE。
//! 每次 ask 至多一次工具调用、至多一次第二轮补全：流程中没有循环。

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::core::AgentError;
use crate::dialog::{parse_reply, DebugEvent, EventKind, InteractionLogger, ParsedReply, PromptBuilder};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::store::{Agent, Store, Tool};
use crate::tools::ToolInvoker;

/// 流程中途失败时写入日志的回答
pub const FAILURE_RESPONSE: &str = "An error occurred while processing your request.";

const TOOL_RESULT_CONTEXT: &str = "tool_result_interpretation";

/// 一次 ask 的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskOutcome {
    pub response: String,
    pub tools_used: Vec<String>,
    pub debug_log: Vec<DebugEvent>,
}

pub struct DialogOrchestrator {
    llm: Arc<dyn LlmClient>,
    invoker: Arc<dyn ToolInvoker>,
    store: Arc<dyn Store>,
}

impl DialogOrchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, invoker: Arc<dyn ToolInvoker>, store: Arc<dyn Store>) -> Self {
        Self { llm, invoker, store }
    }

    /// 向指定智能体提问
    ///
    /// 智能体不存在、问题为空时直接返回错误，不写日志；进入流程后无论成败都落盘一条交互日志。
    pub async fn ask(&self, agent_name: &str, question: &str) -> Result<AskOutcome, AgentError> {
        let mut agent = self
            .store
            .get_agent(agent_name)?
            .ok_or_else(|| AgentError::AgentNotFound(agent_name.to_string()))?;
        if question.is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        tracing::info!(agent = %agent.name, model = %agent.model, "ask started");
        let mut logger = InteractionLogger::new(&agent.name, question);
        logger.record(EventKind::RequestReceived, json!({ "question": question }));

        let mut tools_used = Vec::new();
        match self.run(&mut agent, question, &mut logger, &mut tools_used).await {
            Ok(response) => {
                let log = logger.finish(self.store.as_ref(), &response, &tools_used);
                tracing::info!(agent = %agent.name, tools_used = ?tools_used, "ask finished");
                Ok(AskOutcome {
                    response,
                    tools_used,
                    debug_log: log.debug_log,
                })
            }
            Err(e) => {
                tracing::error!(agent = %agent.name, error = %e, "ask failed");
                logger.record(EventKind::Error, json!({ "error": e.to_string() }));
                logger.finish(self.store.as_ref(), FAILURE_RESPONSE, &tools_used);
                Err(AgentError::Orchestration(e.to_string()))
            }
        }
    }

    async fn run(
        &self,
        agent: &mut Agent,
        question: &str,
        logger: &mut InteractionLogger,
        tools_used: &mut Vec<String>,
    ) -> Result<String, AgentError> {
        // 先提交 last_active，后续失败不回滚
        agent.last_active = Some(Utc::now());
        self.store.replace_agent(agent)?;

        let mut available = self.resolve_tools(agent)?;
        logger.record(
            EventKind::ToolsLoaded,
            json!({ "available_tools": available.iter().map(|t| t.name.as_str()).collect::<Vec<_>>() }),
        );

        let prompt = PromptBuilder::for_tools(&available);
        logger.record(EventKind::CompletionRequested, sampling(agent, None));
        let primary = self
            .llm
            .complete(&self.request(agent, prompt.primary(question)))
            .await?;
        logger.record(EventKind::CompletionReceived, json!({ "response": primary }));

        let call = match parse_reply(&primary) {
            ParsedReply::PlainText(text) => {
                logger.record(EventKind::NoToolRequest, json!({ "response": text }));
                return Ok(text);
            }
            ParsedReply::ToolCall(call) => call,
        };
        logger.record(EventKind::ToolRequestDetected, json!({ "tool_request": call }));

        let Some(tool) = available.iter_mut().find(|t| t.name == call.tool) else {
            tracing::warn!(agent = %agent.name, tool = %call.tool, "requested tool not available");
            logger.record(EventKind::ToolNotFound, json!({ "tool": call.tool }));
            return Ok(format!(
                "Error: Tool '{}' not found or not available to this agent.",
                call.tool
            ));
        };

        tools_used.push(tool.name.clone());
        logger.record(
            EventKind::ToolExecutionStarted,
            json!({ "tool": tool.name, "params": call.params }),
        );
        let outcome = self.invoker.execute(tool, &call.params).await;
        logger.record(
            EventKind::ToolExecutionCompleted,
            json!({ "tool": tool.name, "result": outcome.result, "debug_info": outcome.trace }),
        );
        if let Err(e) = self.store.replace_tool(tool) {
            tracing::warn!(tool = %tool.name, error = %e, "failed to persist tool last_used");
        }

        logger.record(
            EventKind::CompletionRequested,
            sampling(agent, Some(TOOL_RESULT_CONTEXT)),
        );
        let messages = prompt.secondary(question, &primary, &outcome.result);
        let secondary = self.llm.complete(&self.request(agent, messages)).await?;
        logger.record(
            EventKind::CompletionReceived,
            json!({ "response": secondary, "context": TOOL_RESULT_CONTEXT }),
        );
        Ok(secondary)
    }

    /// 按智能体的工具名顺序解析目录中的工具，缺失的引用跳过
    fn resolve_tools(&self, agent: &Agent) -> Result<Vec<Tool>, AgentError> {
        let catalog = self.store.load_tools()?;
        Ok(agent
            .tools
            .iter()
            .filter_map(|name| catalog.iter().find(|t| &t.name == name).cloned())
            .collect())
    }

    fn request(&self, agent: &Agent, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest::new(&agent.model, agent.temperature, agent.max_tokens, messages)
    }
}

fn sampling(agent: &Agent, context: Option<&str>) -> serde_json::Value {
    let mut payload = json!({
        "model": agent.model,
        "temperature": agent.temperature,
        "max_tokens": agent.max_tokens,
    });
    if let Some(ctx) = context {
        payload["context"] = json!(ctx);
    }
    payload
}
