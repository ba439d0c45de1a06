//! 内存实现：进程内集合，不落盘

use std::sync::{PoisonError, RwLock};

use super::{Agent, InteractionLog, Store, StoreError, Tool};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    agents: RwLock<Vec<Agent>>,
    tools: RwLock<Vec<Tool>>,
    logs: RwLock<Vec<InteractionLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(agents: Vec<Agent>, tools: Vec<Tool>) -> Self {
        Self {
            agents: RwLock::new(agents),
            tools: RwLock::new(tools),
            logs: RwLock::new(Vec::new()),
        }
    }

    /// 全部交互日志（写入顺序）
    pub fn all_logs(&self) -> Vec<InteractionLog> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Store for InMemoryStore {
    fn load_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_agents(&self, agents: &[Agent]) -> Result<(), StoreError> {
        *self.agents.write().unwrap_or_else(PoisonError::into_inner) = agents.to_vec();
        Ok(())
    }

    fn load_tools(&self) -> Result<Vec<Tool>, StoreError> {
        Ok(self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_tools(&self, tools: &[Tool]) -> Result<(), StoreError> {
        *self.tools.write().unwrap_or_else(PoisonError::into_inner) = tools.to_vec();
        Ok(())
    }

    fn save_interaction_log(&self, log: &InteractionLog) -> Result<(), StoreError> {
        self.logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(log.clone());
        Ok(())
    }

    fn get_agent_logs(
        &self,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<InteractionLog>, StoreError> {
        let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<InteractionLog> = logs
            .iter()
            .filter(|l| l.agent_name == agent_name)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matching.truncate(limit);
        Ok(matching)
    }
}
