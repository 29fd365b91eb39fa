//! 模型客户端 - 文本、视觉、图片生成三类能力的统一接口

use async_trait::async_trait;

pub mod client;
pub mod error;
pub mod image_gen;
pub mod vision;

pub use error::ModelError;

/// 文本补全能力
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, ModelError>;
}

/// 发送给视觉模型的图片
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Url(String),
    /// 已编码的图片数据
    Base64 { mime_type: String, data: String },
}

impl ImageInput {
    /// OpenAI兼容接口中 `image_url.url` 字段的取值
    pub fn to_url_field(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Base64 { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
        }
    }
}

/// 视觉理解能力
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn invoke(&self, prompt: &str, images: &[ImageInput]) -> Result<String, ModelError>;
}

/// 图片生成能力（可选）
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// 生成一张图片，返回可访问的URL
    async fn generate(&self, prompt: &str, size: &str) -> Result<String, ModelError>;
}
