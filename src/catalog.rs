//! 名册与工具目录的增删查
//!
//! 每个操作都是整体集合的读-改-写；创建前做重名与引用校验，删除工具前检查是否仍被智能体引用。

use std::sync::Arc;

use crate::core::AgentError;
use crate::store::{Agent, InteractionLog, Store, Tool};

pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>, AgentError> {
        Ok(self.store.load_agents()?)
    }

    pub fn list_tools(&self) -> Result<Vec<Tool>, AgentError> {
        Ok(self.store.load_tools()?)
    }

    pub fn create_tool(&self, tool: Tool) -> Result<(), AgentError> {
        let mut tools = self.store.load_tools()?;
        if tools.iter().any(|t| t.name == tool.name) {
            return Err(AgentError::Duplicate {
                kind: "tool",
                name: tool.name,
            });
        }
        tracing::info!(tool = %tool.name, kind = %tool.kind(), "tool created");
        tools.push(tool);
        self.store.save_tools(&tools)?;
        Ok(())
    }

    /// 删除工具；仍有智能体引用时拒绝。返回是否确有删除
    pub fn delete_tool(&self, name: &str) -> Result<bool, AgentError> {
        let users: Vec<String> = self
            .store
            .load_agents()?
            .into_iter()
            .filter(|a| a.tools.iter().any(|t| t == name))
            .map(|a| a.name)
            .collect();
        if !users.is_empty() {
            return Err(AgentError::ToolInUse {
                tool: name.to_string(),
                agents: users,
            });
        }

        let mut tools = self.store.load_tools()?;
        let before = tools.len();
        tools.retain(|t| t.name != name);
        if tools.len() == before {
            return Ok(false);
        }
        self.store.save_tools(&tools)?;
        tracing::info!(tool = %name, "tool deleted");
        Ok(true)
    }

    /// 创建智能体；引用的工具必须已在目录中
    pub fn create_agent(&self, agent: Agent) -> Result<(), AgentError> {
        let tools = self.store.load_tools()?;
        if let Some(missing) = agent
            .tools
            .iter()
            .find(|name| !tools.iter().any(|t| &t.name == *name))
        {
            return Err(AgentError::ToolNotFound(missing.clone()));
        }

        let mut agents = self.store.load_agents()?;
        if agents.iter().any(|a| a.name == agent.name) {
            return Err(AgentError::Duplicate {
                kind: "agent",
                name: agent.name,
            });
        }
        tracing::info!(agent = %agent.name, tools = ?agent.tools, "agent created");
        agents.push(agent);
        self.store.save_agents(&agents)?;
        Ok(())
    }

    pub fn delete_agent(&self, name: &str) -> Result<bool, AgentError> {
        let mut agents = self.store.load_agents()?;
        let before = agents.len();
        agents.retain(|a| a.name != name);
        if agents.len() == before {
            return Ok(false);
        }
        self.store.save_agents(&agents)?;
        tracing::info!(agent = %name, "agent deleted");
        Ok(true)
    }

    /// 最近的交互日志，新的在前
    pub fn agent_logs(&self, name: &str, limit: usize) -> Result<Vec<InteractionLog>, AgentError> {
        Ok(self.store.get_agent_logs(name, limit)?)
    }
}
