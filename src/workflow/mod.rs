use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::Config;
use crate::llm::client::LLMClient;
use crate::llm::image_gen::OpenAiImageGenerator;
use crate::llm::vision::OpenAiVisionClient;
use crate::llm::{ImageGenerator, TextModel, VisionModel};
use crate::matching::MatchingEngine;
use crate::progress::{ProgressSink, Stage};
use crate::research::{
    Analyzer, LlmAnalyzer, LlmPlanner, PhaseController, Planner, RunState, SearchCollector,
};
use crate::source::{ContentSource, XhsHttpClient};
use crate::types::{ClassificationMap, Insights, NoteRecord, OutlineSection, SearchPlan};
use crate::vision::VisualClassifier;

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<&'static str, Instant>,
    phase_durations: Vec<(&'static str, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &'static str) {
        self.phase_start_times.insert(phase_name, Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &'static str) -> Option<Duration> {
        let duration = self.phase_start_times.remove(phase_name)?.elapsed();
        self.phase_durations.push((phase_name, duration));
        Some(duration)
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒",
            self.start_time.elapsed().as_secs_f64()
        );
        for (phase, duration) in &self.phase_durations {
            report.push_str(&format!("\n- {}: {:.3}秒", phase, duration.as_secs_f64()));
        }
        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const RESEARCH: &'static str = "research";
    pub const CLASSIFY: &'static str = "classify";
    pub const MATCHING: &'static str = "matching";
}

/// 工作流依赖的外部能力
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub analyzer: Arc<dyn Analyzer>,
    pub source: Arc<dyn ContentSource>,
    /// 未启用视觉模型时跳过图片分类
    pub vision: Option<Arc<dyn VisionModel>>,
    /// 未启用图片生成时章节只使用已有图片
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
}

/// 一次研究的全部产出
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutput {
    /// 本次运行的唯一标识
    pub run_id: Uuid,
    pub task: String,
    pub plan: Option<SearchPlan>,
    pub documents: Vec<NoteRecord>,
    pub insights: Option<Insights>,
    pub classifications: ClassificationMap,
    pub outline: Option<Vec<OutlineSection>>,
    pub iteration_count: u32,
    pub searched_keywords: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ResearchOutput {
    fn from_state(state: RunState, outline: Option<Vec<OutlineSection>>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task: state.task,
            plan: state.plan,
            documents: state.documents,
            insights: state.insights,
            classifications: state.classifications,
            outline,
            iteration_count: state.iteration_count,
            searched_keywords: state.searched_keywords,
            generated_at: Utc::now(),
        }
    }
}

/// 大纲文件可以是章节数组，也可以是包含 `outline`/`sections` 字段的对象
#[derive(Deserialize)]
#[serde(untagged)]
enum OutlineFile {
    Sections(Vec<OutlineSection>),
    Wrapped {
        #[serde(alias = "sections")]
        outline: Vec<OutlineSection>,
    },
}

pub fn load_outline(path: &Path) -> Result<Vec<OutlineSection>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read outline file: {:?}", path))?;
    let outline: OutlineFile =
        serde_json::from_str(&content).context("Failed to parse outline file")?;
    Ok(match outline {
        OutlineFile::Sections(sections) | OutlineFile::Wrapped { outline: sections } => sections,
    })
}

impl Collaborators {
    /// 根据配置创建真实的客户端
    pub fn from_config(config: &Config) -> Result<(Self, LLMClient, Arc<XhsHttpClient>)> {
        let llm_client = LLMClient::new(&config.llm)?;
        let text_model: Arc<dyn TextModel> = Arc::new(llm_client.clone());
        let source = Arc::new(XhsHttpClient::new(&config.source)?);

        let vision: Option<Arc<dyn VisionModel>> = if config.vision.enabled {
            Some(Arc::new(OpenAiVisionClient::new(
                &config.vision,
                config.vision_api_key(),
            )?))
        } else {
            None
        };
        let image_generator: Option<Arc<dyn ImageGenerator>> = if config.image_gen.enabled {
            Some(Arc::new(OpenAiImageGenerator::new(
                &config.image_gen,
                config.image_gen_api_key(),
            )?))
        } else {
            None
        };

        let collaborators = Self {
            planner: Arc::new(LlmPlanner::new(text_model.clone(), config.llm.max_tokens)),
            analyzer: Arc::new(LlmAnalyzer::new(text_model, config.llm.max_tokens)),
            source: source.clone(),
            vision,
            image_generator,
        };
        Ok((collaborators, llm_client, source))
    }
}

/// 启动研究工作流：检查连接 → 研究 → 图片分类 → 章节配图 → 保存结果
pub async fn launch(config: &Config, task: &str, progress: ProgressSink) -> Result<ResearchOutput> {
    let (collaborators, llm_client, source) = Collaborators::from_config(config)?;

    // 启动时检查模型与内容源连接
    llm_client.check_connection().await?;
    let status = source
        .check_login_status()
        .await
        .context("无法连接内容源服务，请确认 xiaohongshu-mcp 已启动")?;
    if status.is_logged_in {
        progress.info(
            Stage::Workflow,
            format!("✅ 内容源已登录: {}", status.username),
        );
    } else {
        progress.warn(Stage::Workflow, "⚠️ 内容源未登录，搜索结果可能为空");
    }

    let output = launch_with(config, task, collaborators, progress.clone()).await?;
    save(&output, &config.output_path)?;
    progress.info(
        Stage::Workflow,
        format!("💾 研究结果已保存: {}", config.output_path.display()),
    );
    Ok(output)
}

/// 使用给定的外部能力执行工作流，不做连接检查也不写文件
pub async fn launch_with(
    config: &Config,
    task: &str,
    collaborators: Collaborators,
    progress: ProgressSink,
) -> Result<ResearchOutput> {
    if task.trim().is_empty() {
        bail!("研究主题不能为空");
    }
    let mut timing = TimingScope::new();

    timing.start_phase(TimingKeys::RESEARCH);
    let collector = SearchCollector::new(
        collaborators.source,
        config.search.clone(),
        config.source.sort_by,
        progress.clone(),
    );
    let controller = PhaseController::new(
        collaborators.planner,
        collaborators.analyzer,
        collector,
        &config.search,
        progress.clone(),
    );
    let mut state = controller.run(task).await?;
    timing.end_phase(TimingKeys::RESEARCH);

    match &collaborators.vision {
        Some(vision) => {
            timing.start_phase(TimingKeys::CLASSIFY);
            let classifier =
                VisualClassifier::new(vision.clone(), config.vision.clone(), progress.clone());
            state.classifications = classifier
                .classify(&state.image_urls(), &state.task, config.vision.batch_size)
                .await;
            timing.end_phase(TimingKeys::CLASSIFY);
        }
        None => progress.info(Stage::Classifying, "视觉模型未启用，跳过图片分析"),
    }

    let outline = match &config.outline_path {
        Some(path) => {
            timing.start_phase(TimingKeys::MATCHING);
            let sections = load_outline(path)?;
            let engine = MatchingEngine::new(
                config.matching.clone(),
                collaborators.image_generator,
                config.image_gen.size.clone(),
                progress.clone(),
            );
            let assigned = engine
                .assign(sections, &state.classifications, &state.task)
                .await;
            timing.end_phase(TimingKeys::MATCHING);
            Some(assigned)
        }
        None => None,
    };

    progress.info(Stage::Workflow, timing.generate_timing_report());
    Ok(ResearchOutput::from_state(state, outline))
}

/// 将研究结果写入JSON文件
pub fn save(output: &ResearchOutput, path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent()
        && !parent_dir.as_os_str().is_empty()
        && !parent_dir.exists()
    {
        fs::create_dir_all(parent_dir)?;
    }
    let json = serde_json::to_string_pretty(output)?;
    fs::write(path, json).with_context(|| format!("Failed to write output: {:?}", path))?;
    Ok(())
}
