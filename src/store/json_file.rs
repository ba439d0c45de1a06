//! JSON 文件持久化
//!
//! 目录结构：
//! - `<data_dir>/agents.json`、`<data_dir>/tools.json`：整个集合一个 JSON 数组
//! - `<data_dir>/logs/<agent>/<时间戳>_<id>.json`：每次 ask 一个文件
//!
//! 文件缺失或内容损坏时重置为空数组并告警，不向上报错；单条记录非法（如 http_api 缺字段）时读取跳过该条，
//! 写回集合时原样保留在文件末尾，直到被同名的合法记录取代。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{Agent, InteractionLog, Store, StoreError, Tool};

const AGENTS_FILE: &str = "agents.json";
const TOOLS_FILE: &str = "tools.json";
const LOGS_DIR: &str = "logs";

pub struct JsonFileStore {
    data_dir: PathBuf,
    /// 串行化本进程内的写操作
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// 打开（必要时创建）数据目录，并为缺失的集合文件写入空数组
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        fs::create_dir_all(&store.data_dir)?;
        for name in [AGENTS_FILE, TOOLS_FILE] {
            let path = store.data_dir.join(name);
            if !path.exists() {
                store.write_json(&path, &Vec::<Value>::new())?;
            }
        }
        Ok(store)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn agent_logs_dir(&self, agent_name: &str) -> PathBuf {
        self.data_dir
            .join(LOGS_DIR)
            .join(sanitize_file_component(agent_name))
    }

    /// 先写临时文件再 rename，避免写到一半的文件被读到
    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// 读取集合文件；缺失 / 非 JSON 数组时重置为空
    fn load_collection<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, StoreError> {
        let path = self.data_dir.join(file);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.write_json(&path, &Vec::<Value>::new())?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "corrupted collection file, resetting");
                self.write_json(&path, &Vec::<Value>::new())?;
                return Ok(Vec::new());
            }
        };

        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<T>(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping invalid record");
                    None
                }
            })
            .collect())
    }

    /// 写回集合；原文件中解析不成 T 的记录保持原样，不与新记录同名者追加在末尾
    fn save_collection<T: Serialize + DeserializeOwned>(
        &self,
        file: &str,
        items: &[T],
    ) -> Result<(), StoreError> {
        let path = self.data_dir.join(file);
        let mut records = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        let names: HashSet<&str> = records.iter().filter_map(record_name).collect();

        let preserved: Vec<Value> = self
            .read_raw_records(&path)?
            .into_iter()
            .filter(|r| record_name(r).map_or(true, |name| !names.contains(name)))
            .filter(|r| serde_json::from_value::<T>(r.clone()).is_err())
            .collect();
        if !preserved.is_empty() {
            tracing::warn!(file = %path.display(), count = preserved.len(), "keeping invalid records untouched");
        }

        records.extend(preserved);
        self.write_json(&path, &records)
    }

    /// 当前文件中的原始记录；缺失或不是 JSON 数组时视为空
    fn read_raw_records(&self, path: &Path) -> Result<Vec<Value>, StoreError> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

fn record_name(record: &Value) -> Option<&str> {
    record.get("name")?.as_str()
}

impl Store for JsonFileStore {
    fn load_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.load_collection(AGENTS_FILE)
    }

    fn save_agents(&self, agents: &[Agent]) -> Result<(), StoreError> {
        self.save_collection(AGENTS_FILE, agents)
    }

    fn load_tools(&self) -> Result<Vec<Tool>, StoreError> {
        self.load_collection(TOOLS_FILE)
    }

    fn save_tools(&self, tools: &[Tool]) -> Result<(), StoreError> {
        self.save_collection(TOOLS_FILE, tools)
    }

    fn save_interaction_log(&self, log: &InteractionLog) -> Result<(), StoreError> {
        let file = format!(
            "{}_{}.json",
            log.timestamp.format("%Y%m%d_%H%M%S%.6f"),
            log.id.simple()
        );
        self.write_json(&self.agent_logs_dir(&log.agent_name).join(file), log)
    }

    fn get_agent_logs(
        &self,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<InteractionLog>, StoreError> {
        let dir = self.agent_logs_dir(agent_name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut logs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|raw| serde_json::from_str::<InteractionLog>(&raw).map_err(StoreError::from));
            match parsed {
                Ok(log) if log.agent_name == agent_name => logs.push(log),
                // 清洗后同名目录下的其它智能体
                Ok(_) => {}
                Err(e) => tracing::warn!(file = %path.display(), error = %e, "skipping unreadable log"),
            }
        }

        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit);
        Ok(logs)
    }
}

/// 智能体名用作目录名：仅保留字母数字、`-`、`_`，其它字符替换为 `_`
fn sanitize_file_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
