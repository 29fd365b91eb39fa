use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::TextModel;
use crate::types::{Insights, NoteRecord, SearchPlan};
use crate::utils::json::parse_object;

/// 分析已收集的笔记，给出洞察及是否需要补充数据
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        task: &str,
        plan: Option<&SearchPlan>,
        searched_keywords: &[String],
        documents: &[NoteRecord],
    ) -> Result<Insights>;
}

pub struct LlmAnalyzer {
    model: Arc<dyn TextModel>,
    max_tokens: u32,
}

impl LlmAnalyzer {
    const TEMPERATURE: f64 = 0.5;

    pub fn new(model: Arc<dyn TextModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    fn summarize(documents: &[NoteRecord]) -> String {
        documents
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let detail = &record.detail;
                let preview = &record.preview;
                let author = if detail.author.is_empty() { &preview.author } else { &detail.author };
                let content = if detail.content.is_empty() {
                    &preview.content_preview
                } else {
                    &detail.content
                };
                let tags = if detail.tags.is_empty() {
                    "无".to_string()
                } else {
                    detail.tags.join(", ")
                };
                format!(
                    "### 笔记 {}: {}\n- 作者: {}\n- 点赞: {}\n- 内容: {}\n- 标签: {}\n- 图片数量: {}\n",
                    index + 1,
                    record.display_title(),
                    author,
                    detail.likes.max(preview.likes),
                    content,
                    tags,
                    detail.images.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(
        &self,
        task: &str,
        plan: Option<&SearchPlan>,
        searched_keywords: &[String],
        documents: &[NoteRecord],
    ) -> Result<Insights> {
        let plan_json = match plan {
            Some(plan) => serde_json::to_string(plan)?,
            None => "无".to_string(),
        };
        let prompt_user = format!(
            include_str!("prompts/analyzer_user.tpl"),
            task,
            plan_json,
            searched_keywords.join("、"),
            Self::summarize(documents)
        );

        let response = self
            .model
            .invoke(
                include_str!("prompts/analyzer_sys.tpl"),
                &prompt_user,
                Self::TEMPERATURE,
                self.max_tokens,
            )
            .await?;

        Ok(parse_object::<Insights>(&response).unwrap_or_else(|| {
            tracing::warn!("分析结果解析失败，使用兜底洞察");
            Insights::fallback()
        }))
    }
}
