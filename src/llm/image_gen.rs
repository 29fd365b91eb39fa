//! OpenAI兼容的图片生成客户端

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::ImageGenConfig;
use crate::llm::{ImageGenerator, ModelError};

pub struct OpenAiImageGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl OpenAiImageGenerator {
    pub fn new(config: &ImageGenConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str, size: &str) -> Result<String, ModelError> {
        let url = format!("{}/images/generations", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": size,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::from_status(status.as_u16(), text));
        }

        let parsed: ImagesResponse = response.json().await?;
        let image = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Malformed("no image in response".to_string()))?;

        match (image.url, image.b64_json) {
            (Some(url), _) if !url.is_empty() => Ok(url),
            (_, Some(data)) if !data.is_empty() => Ok(format!("data:image/png;base64,{}", data)),
            _ => Err(ModelError::Malformed("image entry has neither url nor data".to_string())),
        }
    }
}
