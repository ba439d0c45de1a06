//! LLM 层：补全服务抽象与实现（OpenAI 兼容 / Groq / Mock）

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, GROQ_BASE_URL};
pub use traits::{CompletionRequest, LlmClient, LlmError, RetryConfig, RetryingLlmClient};

use crate::config::AppConfig;

/// 按配置创建补全客户端：provider = mock 时返回 Mock，否则 OpenAI 兼容客户端；统一包一层超时与重试
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let inner: Arc<dyn LlmClient> = match cfg.llm.provider.as_str() {
        "mock" => Arc::new(MockLlmClient::new()),
        provider => {
            let api_key = std::env::var(&cfg.llm.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(provider, env = %cfg.llm.api_key_env, "API key not set");
            }
            Arc::new(OpenAiClient::new(
                Some(cfg.llm.base_url.as_str()),
                api_key.as_deref(),
            ))
        }
    };

    Arc::new(RetryingLlmClient::new(
        inner,
        RetryConfig {
            timeout: Duration::from_secs(cfg.llm.timeouts.request),
            max_retries: cfg.llm.retry.max_retries,
            backoff: Duration::from_millis(cfg.llm.retry.backoff_ms),
        },
    ))
}
