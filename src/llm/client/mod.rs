//! LLM客户端 - 提供统一的文本模型服务接口

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::config::LLMConfig;
use crate::llm::{ModelError, TextModel};

mod providers;

use providers::{GenerationParams, ProviderClient};

/// LLM客户端 - 基于rig的文本补全
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        tracing::info!(provider = %self.config.provider, model = %self.config.model, "🔄 正在检查模型连接...");
        match self
            .invoke("You are a helpful assistant.", "Hello", 0.1, 16)
            .await
        {
            Ok(_) => {
                tracing::info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ 模型连接失败: {}", e);
                Err(e.into())
            }
        }
    }

    /// 通用重试逻辑；限流错误同样重试，但等待时间按尝试次数递增
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T, ModelError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        "❌ 调用模型服务出错，重试中 (第 {} / {}次尝试): {}",
                        retries,
                        max_retries,
                        err
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    let factor = if err.is_rate_limited() { retries as u64 } else { 1 };
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms * factor)).await;
                }
            }
        }
    }
}

#[async_trait]
impl TextModel for LLMClient {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, ModelError> {
        let params = GenerationParams {
            temperature,
            max_tokens,
        };
        let agent = self
            .client
            .create_agent(&self.config.model, system_prompt, params);
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        self.retry_with_backoff(|| async {
            match tokio::time::timeout(timeout, agent.prompt(user_prompt)).await {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(ModelError::from_message(e.to_string())),
                Err(_) => Err(ModelError::Timeout(format!(
                    "no response within {}s",
                    timeout.as_secs()
                ))),
            }
        })
        .await
    }
}
