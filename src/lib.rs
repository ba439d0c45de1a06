//! Hive - 智能体调度引擎
//!
//! 模块划分：
//! - **catalog**: 名册与工具目录的增删查（重名、引用校验）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **dialog**: 单轮工具调用编排、提示词、调试事件与交互日志
//! - **llm**: 补全服务抽象与实现（OpenAI 兼容 / Groq / Mock）
//! - **observability**: tracing 初始化
//! - **recommend**: 按问题推荐智能体（容错解析）
//! - **store**: 持久化（JSON 文件 / 内存）
//! - **tools**: 声明式 HTTP 工具执行器

pub mod catalog;
pub mod config;
pub mod core;
pub mod dialog;
pub mod llm;
pub mod observability;
pub mod recommend;
pub mod store;
pub mod tools;

pub use catalog::Catalog;
pub use dialog::{AskOutcome, DialogOrchestrator};
pub use recommend::{Recommendation, RecommendationResolver};
