use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::progress::{ProgressSink, Stage};
use crate::research::analyzer::Analyzer;
use crate::research::collector::{CollectError, SearchCollector};
use crate::research::planner::Planner;
use crate::research::state::{Phase, RunState};

/// 反思循环的最大轮数，超过后无论分析结果如何都结束
pub const MAX_REFLECTION_ROUNDS: u32 = 3;

/// 研究流程状态机：规划 → 搜索 → 分析 → {搜索(反思) | 完成}
pub struct PhaseController {
    planner: Arc<dyn Planner>,
    analyzer: Arc<dyn Analyzer>,
    collector: SearchCollector,
    notes_per_keyword: usize,
    concurrency: usize,
    progress: ProgressSink,
}

impl PhaseController {
    pub fn new(
        planner: Arc<dyn Planner>,
        analyzer: Arc<dyn Analyzer>,
        collector: SearchCollector,
        search: &SearchConfig,
        progress: ProgressSink,
    ) -> Self {
        Self {
            planner,
            analyzer,
            collector,
            notes_per_keyword: search.notes_per_keyword,
            concurrency: search.concurrency,
            progress,
        }
    }

    /// 执行完整研究流程
    pub async fn run(&self, task: &str) -> Result<RunState> {
        self.progress
            .info(Stage::Planning, format!("🚀 开始研究: {}", task));

        let mut state = RunState::new(task);
        while self.step(&mut state).await? != Phase::Done {}

        self.progress.info(
            Stage::Analyzing,
            format!(
                "✅ 研究完成，收集了 {} 篇笔记，反思 {} 轮",
                state.documents.len(),
                state.iteration_count
            ),
        );
        Ok(state)
    }

    /// 执行当前状态对应的一个阶段，返回执行的阶段
    pub async fn step(&self, state: &mut RunState) -> Result<Phase> {
        let phase = state.next_phase();
        tracing::debug!(phase = %phase, iteration = state.iteration_count, "执行阶段");
        match phase {
            Phase::Planning => self.run_planning(state).await?,
            Phase::Searching => self.run_searching(state).await?,
            Phase::Analyzing => self.run_analyzing(state).await,
            Phase::Done => {}
        }
        Ok(phase)
    }

    async fn run_planning(&self, state: &mut RunState) -> Result<()> {
        self.progress
            .info(Stage::Planning, format!("📋 开始规划研究任务: {}", state.task));

        let plan = self
            .planner
            .plan(&state.task)
            .await
            .context("研究规划失败")?;

        state.search_keywords = plan.keywords.clone();
        if state.search_keywords.is_empty() {
            self.progress.warn(
                Stage::Planning,
                "⚠️ 规划未生成关键词，使用研究主题作为关键词",
            );
            state.search_keywords = vec![state.task.trim().to_string()];
        }
        self.progress.info(
            Stage::Planning,
            format!(
                "生成了 {} 个搜索关键词: {:?}",
                state.search_keywords.len(),
                state.search_keywords
            ),
        );
        state.plan = Some(plan);
        Ok(())
    }

    async fn run_searching(&self, state: &mut RunState) -> Result<()> {
        let keywords = state.take_keywords_for_search();

        match self
            .collector
            .collect(&keywords, self.notes_per_keyword, self.concurrency)
            .await
        {
            Ok(records) => {
                let added = state.absorb_documents(records);
                self.progress.info(
                    Stage::Searching,
                    format!("新增 {} 篇笔记，总计 {} 篇", added, state.documents.len()),
                );
                Ok(())
            }
            Err(e @ CollectError::SourceUnreachable(_)) if state.documents.is_empty() => {
                Err(e).context("内容源不可达，研究中止")
            }
            Err(e) => {
                self.progress.warn(
                    Stage::Searching,
                    format!("⚠️ 补充搜索失败，保留已有 {} 篇笔记: {}", state.documents.len(), e),
                );
                Ok(())
            }
        }
    }

    async fn run_analyzing(&self, state: &mut RunState) {
        if state.documents.is_empty() {
            self.progress
                .warn(Stage::Analyzing, "⚠️ 未收集到任何笔记，跳过分析");
            state.is_complete = true;
            return;
        }

        self.progress.info(
            Stage::Analyzing,
            format!("🧠 开始分析 {} 篇笔记", state.documents.len()),
        );

        let insights = match self
            .analyzer
            .analyze(
                &state.task,
                state.plan.as_ref(),
                &state.searched_keywords,
                &state.documents,
            )
            .await
        {
            Ok(insights) => insights,
            Err(e) => {
                self.progress
                    .warn(Stage::Analyzing, format!("⚠️ 分析失败，结束研究: {}", e));
                state.is_complete = true;
                return;
            }
        };

        if insights.needs_more_data && state.iteration_count < MAX_REFLECTION_ROUNDS {
            let novel = state.novel_keywords(&insights.suggested_keywords);
            if !novel.is_empty() {
                state.iteration_count += 1;
                self.progress.info(
                    Stage::Analyzing,
                    format!(
                        "🔄 数据不足，第 {} 轮补充搜索: {:?}",
                        state.iteration_count, novel
                    ),
                );
                state.additional_keywords = novel;
                state.insights = Some(insights);
                return;
            }
            self.progress
                .info(Stage::Analyzing, "建议的补充关键词均已搜索过，结束反思");
        }

        state.insights = Some(insights);
        state.is_complete = true;
        self.progress.info(Stage::Analyzing, "分析完成");
    }
}

#[cfg(test)]
mod tests;
