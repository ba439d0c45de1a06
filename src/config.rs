//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::GROQ_BASE_URL;

/// 默认模型（智能体未指定时、推荐器）
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub recommend: RecommendSection,
    pub agents: AgentDefaultsSection,
}

/// [app] 段：数据目录、日志查询默认条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// agents.json / tools.json / logs/ 所在目录
    pub data_dir: PathBuf,
    pub log_limit: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_limit: 20,
        }
    }
}

/// [llm] 段：后端、端点、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// groq / openai / mock
    pub provider: String,
    pub base_url: String,
    /// 读取 API Key 的环境变量名
    pub api_key_env: String,
    pub timeouts: LlmTimeoutsSection,
    pub retry: LlmRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: GROQ_BASE_URL.to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeouts: LlmTimeoutsSection::default(),
            retry: LlmRetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmRetrySection {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: 500,
        }
    }
}

/// [tools] 段：HTTP 工具调用的超时、UA、响应预览长度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具请求超时（秒）
    pub timeout_secs: u64,
    pub user_agent: String,
    /// 调试信息中响应体保留的字符数
    pub response_preview_chars: usize,
    /// 连接失败 / 超时时是否重试一次
    pub retry_transient: bool,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
            response_preview_chars: 1000,
            retry_transient: true,
        }
    }
}

/// [recommend] 段：智能体推荐所用模型与采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendSection {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for RecommendSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

/// [agents] 段：新建智能体的默认模型参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentDefaultsSection {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AgentDefaultsSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
