use crate::config::{Config, LLMProvider, SortHint};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

/// 默认配置文件名，位于当前工作目录
const DEFAULT_CONFIG_FILE: &str = "rednote.toml";

/// RedNote Research - 由Rust与AI驱动的小红书主题研究引擎
#[derive(Parser, Debug)]
#[command(name = "rednote-research")]
#[command(
    about = "AI-driven topic research engine for Xiaohongshu (RedNote). It plans keyword searches, collects notes, classifies note images and assigns the best images to report sections."
)]
#[command(version)]
pub struct Args {
    /// 研究主题
    pub task: String,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 研究结果输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 报告大纲文件路径（JSON），提供时为各章节分配图片
    #[arg(long)]
    pub outline: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// LLM Provider (openai, moonshot, deepseek, openrouter, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 规划与分析使用的模型
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 内容源服务地址
    #[arg(long)]
    pub source_url: Option<String>,

    /// 搜索排序方式 (general, latest, most_liked)
    #[arg(long)]
    pub sort_by: Option<String>,

    /// 每个关键词保留的笔记数量
    #[arg(long)]
    pub notes_per_keyword: Option<usize>,

    /// 同时进行的关键词搜索数量
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// 启用视觉模型分析笔记图片
    #[arg(long)]
    pub enable_vision: bool,

    /// 视觉模型
    #[arg(long)]
    pub vision_model: Option<String>,

    /// 每批发送给视觉模型的图片数量
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// 关闭限流模式：批次间不等待（限流时仍会重试）
    #[arg(long)]
    pub no_rate_limit: bool,

    /// 为缺少合适图片的章节生成图片
    #[arg(long)]
    pub enable_image_gen: bool,
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            // 显式指定的配置文件必须可读
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);
                if default_config_path.exists() {
                    Config::from_file(&default_config_path).with_context(|| {
                        format!("无法读取默认配置文件 {:?}", default_config_path)
                    })?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(outline) = self.outline {
            config.outline_path = Some(outline);
        }

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                ),
            }
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 内容源与搜索配置
        if let Some(source_url) = self.source_url {
            config.source.base_url = source_url;
        }
        if let Some(sort_by) = self.sort_by {
            match sort_by.parse::<SortHint>() {
                Ok(sort_hint) => config.source.sort_by = sort_hint,
                Err(_) => eprintln!("⚠️ 警告: 未知的排序方式: {}，使用综合排序", sort_by),
            }
        }
        if let Some(notes_per_keyword) = self.notes_per_keyword {
            config.search.notes_per_keyword = notes_per_keyword;
        }
        if let Some(concurrency) = self.concurrency {
            config.search.concurrency = concurrency.max(1);
        }

        // 视觉模型配置
        if self.enable_vision {
            config.vision.enabled = true;
        }
        if let Some(vision_model) = self.vision_model {
            config.vision.model = vision_model;
        }
        if let Some(batch_size) = self.batch_size {
            config.vision.batch_size = batch_size.max(1);
        }
        if self.no_rate_limit {
            config.vision.rate_limit_mode = false;
        }

        if self.enable_image_gen {
            config.image_gen.enabled = true;
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}
