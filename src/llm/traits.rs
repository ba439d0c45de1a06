//! 补全服务抽象
//!
//! 所有后端（OpenAI 兼容 / Groq / Mock）实现 LlmClient::complete：一次请求、一次完整文本回复。
//! RetryingLlmClient 为任意后端加上单次请求超时与有限次重试（仅对瞬时错误）。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 一次补全请求：模型、采样参数与有序消息
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
            messages,
        }
    }
}

/// 补全服务错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("empty response")]
    EmptyResponse,
}

impl LlmError {
    /// 超时、网络抖动、限流视为可重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_) | LlmError::Network(_) | LlmError::RateLimited { .. }
        )
    }
}

/// 补全服务 trait（completion provider）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回首条回复文本
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// 超时与重试参数
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 单次请求超时
    pub timeout: Duration,
    /// 首次失败后的最多重试次数
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// 带超时与重试的包装客户端
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.config.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.config.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = match &e {
                        LlmError::RateLimited { retry_after_ms } => {
                            Duration::from_millis(*retry_after_ms).max(self.config.backoff)
                        }
                        _ => self.config.backoff,
                    };
                    tracing::warn!(error = %e, attempt, model = %request.model, "completion failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn request() -> CompletionRequest {
        CompletionRequest::new("m", 0.5, 16, vec![Message::user("hi")])
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_once_on_transient_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Network("reset".into()));
        mock.push_reply("ok");
        let client = RetryingLlmClient::new(mock.clone(), fast_retry());

        assert_eq!(client.complete(&request()).await.unwrap(), "ok");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_single_retry() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Network("reset".into()));
        mock.push_error(LlmError::Network("reset again".into()));
        mock.push_reply("never reached");
        let client = RetryingLlmClient::new(mock.clone(), fast_retry());

        let err = client.complete(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::Network("reset again".into()));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_on_api_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::ApiError("bad model".into()));
        let client = RetryingLlmClient::new(mock.clone(), fast_retry());

        assert!(client.complete(&request()).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout(1).is_transient());
        assert!(LlmError::RateLimited { retry_after_ms: 10 }.is_transient());
        assert!(!LlmError::EmptyResponse.is_transient());
    }
}
