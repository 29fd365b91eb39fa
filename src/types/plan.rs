use serde::{Deserialize, Serialize};

/// 研究计划，由规划阶段一次性产出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPlan {
    /// 对用户意图的理解
    pub understanding: String,
    /// 分析维度
    pub dimensions: Vec<String>,
    /// 搜索关键词，是搜索阶段的工作单元
    pub keywords: Vec<String>,
}

impl SearchPlan {
    /// 规划结果无法解析时使用的兜底计划
    pub fn fallback() -> Self {
        Self {
            understanding: "无法解析研究计划".to_string(),
            dimensions: vec!["综合分析".to_string()],
            keywords: Vec::new(),
        }
    }
}
