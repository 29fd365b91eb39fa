use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 搜索排序方式
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortHint {
    #[default]
    #[serde(alias = "综合")]
    General,
    #[serde(alias = "最新")]
    Latest,
    #[serde(alias = "最多点赞")]
    MostLiked,
}

impl SortHint {
    /// 内容源接口使用的排序参数
    pub fn as_filter(&self) -> &'static str {
        match self {
            SortHint::General => "综合",
            SortHint::Latest => "最新",
            SortHint::MostLiked => "最多点赞",
        }
    }
}

impl std::str::FromStr for SortHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" | "综合" => Ok(SortHint::General),
            "latest" | "time_descending" | "最新" => Ok(SortHint::Latest),
            "most_liked" | "popularity_descending" | "最多点赞" => Ok(SortHint::MostLiked),
            _ => Err(format!("Unknown sort hint: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 研究结果输出路径
    pub output_path: PathBuf,

    /// 外部大纲文件路径，提供时执行章节配图
    pub outline_path: Option<PathBuf>,

    /// 文本模型配置
    pub llm: LLMConfig,

    /// 视觉模型配置
    pub vision: VisionConfig,

    /// 图片生成配置
    pub image_gen: ImageGenConfig,

    /// 内容源配置
    pub source: SourceConfig,

    /// 搜索采集配置
    pub search: SearchConfig,

    /// 图片匹配配置
    pub matching: MatchConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 规划与分析使用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 视觉模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct VisionConfig {
    pub enabled: bool,

    /// 为空时沿用文本模型的 API KEY
    pub api_key: String,

    pub api_base_url: String,

    pub model: String,

    pub max_tokens: u32,

    pub temperature: f64,

    /// 每批发送的图片数量
    pub batch_size: usize,

    /// 批次间延迟（毫秒）
    pub batch_delay_ms: u64,

    /// 限流模式：开启时批次间等待；关闭时追求速度，限流重试不受影响
    pub rate_limit_mode: bool,

    /// 限流时单个批次的最大尝试次数
    pub rate_limit_retries: u32,

    /// 限流退避基数（毫秒），第 n 次等待 n * 基数
    pub rate_limit_backoff_ms: u64,

    /// 是否先下载图片并以base64内联，绕过CDN防盗链
    pub inline_images: bool,

    pub timeout_seconds: u64,
}

/// 图片生成配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ImageGenConfig {
    pub enabled: bool,

    /// 为空时沿用文本模型的 API KEY
    pub api_key: String,

    pub api_base_url: String,

    pub model: String,

    /// 生成尺寸，如 1024x1024
    pub size: String,

    pub timeout_seconds: u64,
}

/// 内容源配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// 内容源服务地址
    pub base_url: String,

    /// 搜索、详情等重请求的超时（秒）
    pub timeout_seconds: u64,

    /// 登录状态检查的超时（秒）
    pub status_timeout_seconds: u64,

    pub sort_by: SortHint,
}

/// 搜索采集配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// 每个关键词保留的笔记数量
    pub notes_per_keyword: usize,

    /// 同时进行的关键词搜索数量
    pub concurrency: usize,

    /// 搜索最大尝试次数
    pub retry_attempts: u32,

    /// 搜索重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 详情获取之间的节流延迟（毫秒）
    pub detail_delay_ms: u64,

    /// 单次外部调用的截止时间（秒）
    pub call_timeout_seconds: u64,
}

/// 图片匹配配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MatchConfig {
    /// 最佳候选的匹配分低于该值时触发图片生成
    pub score_threshold: i32,

    /// 大纲显式给出关键词时每个命中的权重
    pub explicit_keyword_weight: i32,

    /// 从章节文本推导关键词时每个命中的权重
    pub derived_keyword_weight: i32,

    pub max_images_per_section: usize,

    pub min_images_per_section: usize,

    /// 生成提示词中章节内容的截取长度（字符）
    pub excerpt_chars: usize,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 视觉模型实际使用的 API KEY
    pub fn vision_api_key(&self) -> &str {
        if self.vision.api_key.trim().is_empty() {
            &self.llm.api_key
        } else {
            &self.vision.api_key
        }
    }

    /// 图片生成实际使用的 API KEY
    pub fn image_gen_api_key(&self) -> &str {
        if self.image_gen.api_key.trim().is_empty() {
            &self.llm.api_key
        } else {
            &self.image_gen.api_key
        }
    }
}

impl VisionConfig {
    /// 批次间延迟；关闭限流模式时为零
    pub fn batch_delay(&self) -> Duration {
        if self.rate_limit_mode {
            Duration::from_millis(self.batch_delay_ms)
        } else {
            Duration::ZERO
        }
    }

    /// 单个批次的最大尝试次数，与限流模式无关
    pub fn max_attempts(&self) -> u32 {
        self.rate_limit_retries.max(1)
    }
}

impl SearchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./reports/research.json"),
            outline_path: None,
            llm: LLMConfig::default(),
            vision: VisionConfig::default(),
            image_gen: ImageGenConfig::default(),
            source: SourceConfig::default(),
            search: SearchConfig::default(),
            matching: MatchConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("REDNOTE_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api-inference.modelscope.cn/v1"),
            model: String::from("Qwen/Qwen3-235B-A22B-Instruct-2507"),
            max_tokens: 4000,
            temperature: 0.7,
            retry_attempts: 3,
            retry_delay_ms: 5000,
            timeout_seconds: 120,
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            api_base_url: String::from("https://api-inference.modelscope.cn/v1"),
            model: String::from("Qwen/Qwen2.5-VL-32B-Instruct"),
            max_tokens: 8192,
            temperature: 0.7,
            batch_size: 10,
            batch_delay_ms: 3000,
            rate_limit_mode: true,
            rate_limit_retries: 3,
            rate_limit_backoff_ms: 10_000,
            inline_images: true,
            timeout_seconds: 120,
        }
    }
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            api_base_url: String::from("https://api-inference.modelscope.cn/v1"),
            model: String::from("Qwen/Qwen-Image"),
            size: String::from("1024x1024"),
            timeout_seconds: 120,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("XIAOHONGSHU_MCP_URL")
                .unwrap_or_else(|_| String::from("http://localhost:18060")),
            timeout_seconds: 120,
            status_timeout_seconds: 10,
            sort_by: SortHint::General,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            notes_per_keyword: 3,
            concurrency: 3,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            detail_delay_ms: 1000,
            call_timeout_seconds: 120,
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            score_threshold: 8,
            explicit_keyword_weight: 5,
            derived_keyword_weight: 3,
            max_images_per_section: 4,
            min_images_per_section: 1,
            excerpt_chars: 200,
        }
    }
}
