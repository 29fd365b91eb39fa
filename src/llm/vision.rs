//! OpenAI兼容的视觉模型客户端

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::VisionConfig;
use crate::llm::{ImageInput, ModelError, VisionModel};

const IMAGE_REFERER: &str = "https://www.xiaohongshu.com/";
const IMAGE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_RETRIES: u32 = 2;

/// 视觉模型客户端，调用 `/chat/completions` 的多模态消息格式
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    inline_images: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiVisionClient {
    pub fn new(config: &VisionConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            inline_images: config.inline_images,
        })
    }

    /// 下载图片并编码为base64；失败时返回None，由调用方退回使用URL
    async fn download_as_base64(&self, url: &str) -> Option<ImageInput> {
        for attempt in 0..=DOWNLOAD_RETRIES {
            let response = self
                .http
                .get(url)
                .header(reqwest::header::REFERER, IMAGE_REFERER)
                .header(reqwest::header::USER_AGENT, IMAGE_USER_AGENT)
                .timeout(DOWNLOAD_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let mime_type = resp
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("image/jpeg")
                        .to_string();
                    let bytes = resp.bytes().await.ok()?;
                    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    return Some(ImageInput::Base64 { mime_type, data });
                }
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), url = %truncate(url, 60), "下载图片失败");
                    return None;
                }
                Err(e) if e.is_timeout() && attempt < DOWNLOAD_RETRIES => {
                    tracing::warn!(
                        url = %truncate(url, 60),
                        "下载图片超时(尝试{}/{})",
                        attempt + 1,
                        DOWNLOAD_RETRIES + 1
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    tracing::warn!(url = %truncate(url, 60), "下载图片异常: {}", e);
                    return None;
                }
            }
        }
        None
    }

    async fn prepare_images(&self, images: &[ImageInput]) -> Vec<ImageInput> {
        if !self.inline_images {
            return images.to_vec();
        }

        let mut prepared = Vec::with_capacity(images.len());
        let mut inlined = 0;
        for image in images {
            match image {
                ImageInput::Url(url) => match self.download_as_base64(url).await {
                    Some(encoded) => {
                        inlined += 1;
                        prepared.push(encoded);
                    }
                    None => prepared.push(image.clone()),
                },
                ImageInput::Base64 { .. } => prepared.push(image.clone()),
            }
        }
        tracing::debug!("图片内联完成: {}/{}", inlined, images.len());
        prepared
    }

    fn build_body(&self, prompt: &str, images: &[ImageInput], json_mode: bool) -> Value {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        content.extend(images.iter().map(|image| {
            json!({ "type": "image_url", "image_url": { "url": image.to_url_field() } })
        }));

        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::from_status(status.as_u16(), text));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ModelError::Malformed("response carried no choices".to_string()))
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn invoke(&self, prompt: &str, images: &[ImageInput]) -> Result<String, ModelError> {
        let prepared = self.prepare_images(images).await;

        // 优先要求JSON输出；模型不支持 response_format 时去掉该参数重发
        match self.send(&self.build_body(prompt, &prepared, true)).await {
            Err(ModelError::Http { status, body })
                if status == 400 && body.to_lowercase().contains("response_format") =>
            {
                tracing::warn!("模型不支持response_format，改为普通输出");
                self.send(&self.build_body(prompt, &prepared, false)).await
            }
            other => other,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
