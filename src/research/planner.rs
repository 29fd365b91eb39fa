use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::TextModel;
use crate::types::SearchPlan;
use crate::utils::json::parse_object;

/// 将研究主题拆解为搜索计划
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str) -> Result<SearchPlan>;
}

/// 基于文本模型的规划器
pub struct LlmPlanner {
    model: Arc<dyn TextModel>,
    max_tokens: u32,
}

impl LlmPlanner {
    const TEMPERATURE: f64 = 0.7;

    pub fn new(model: Arc<dyn TextModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    /// 解析模型输出；无法解析时返回空关键词的兜底计划
    fn parse_plan(response: &str) -> SearchPlan {
        match parse_object::<SearchPlan>(response) {
            Some(mut plan) => {
                plan.keywords = plan
                    .keywords
                    .into_iter()
                    .map(|keyword| keyword.trim().to_string())
                    .filter(|keyword| !keyword.is_empty())
                    .collect();
                plan
            }
            None => {
                tracing::warn!("研究计划解析失败，使用兜底计划");
                SearchPlan::fallback()
            }
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, task: &str) -> Result<SearchPlan> {
        let prompt_sys = include_str!("prompts/planner_sys.tpl");
        let prompt_user = format!(include_str!("prompts/planner_user.tpl"), task);

        let response = self
            .model
            .invoke(prompt_sys, &prompt_user, Self::TEMPERATURE, self.max_tokens)
            .await?;
        Ok(Self::parse_plan(&response))
    }
}
