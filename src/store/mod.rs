//! 持久化层：智能体名册、工具目录、交互日志
//!
//! Store 把名册与目录当作整体集合读写（每次修改 = 读全量、改、写全量），并发写入后写者胜。
//! 实现：JsonFileStore（data 目录下的 JSON 文件）、InMemoryStore（测试 / 临时使用）。

pub mod json_file;
pub mod memory;
pub mod types;

use thiserror::Error;

pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;
pub use types::{Agent, HttpToolConfig, InteractionLog, Tool, ToolSpec, HTTP_API_KIND};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 持久化接口
pub trait Store: Send + Sync {
    fn load_agents(&self) -> Result<Vec<Agent>, StoreError>;

    fn save_agents(&self, agents: &[Agent]) -> Result<(), StoreError>;

    fn load_tools(&self) -> Result<Vec<Tool>, StoreError>;

    fn save_tools(&self, tools: &[Tool]) -> Result<(), StoreError>;

    fn save_interaction_log(&self, log: &InteractionLog) -> Result<(), StoreError>;

    /// 某智能体最近的交互日志，按时间倒序，最多 limit 条
    fn get_agent_logs(&self, agent_name: &str, limit: usize)
        -> Result<Vec<InteractionLog>, StoreError>;

    /// 名册中第一个同名智能体
    fn get_agent(&self, name: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.load_agents()?.into_iter().find(|a| a.name == name))
    }

    fn get_tool(&self, name: &str) -> Result<Option<Tool>, StoreError> {
        Ok(self.load_tools()?.into_iter().find(|t| t.name == name))
    }

    /// 读-改-写：用 agent 替换名册中第一个同名条目；不存在时返回 false 且不写盘
    fn replace_agent(&self, agent: &Agent) -> Result<bool, StoreError> {
        let mut agents = self.load_agents()?;
        match agents.iter_mut().find(|a| a.name == agent.name) {
            Some(slot) => {
                *slot = agent.clone();
                self.save_agents(&agents)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn replace_tool(&self, tool: &Tool) -> Result<bool, StoreError> {
        let mut tools = self.load_tools()?;
        match tools.iter_mut().find(|t| t.name == tool.name) {
            Some(slot) => {
                *slot = tool.clone();
                self.save_tools(&tools)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
