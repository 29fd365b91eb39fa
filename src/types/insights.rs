use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分析阶段产出的洞察
///
/// 发现与痛点的结构由模型自由给出，这里只保留原始JSON；
/// 控制流只依赖 `needs_more_data` 与 `suggested_keywords`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insights {
    pub key_findings: Vec<Value>,
    pub user_pain_points: Vec<Value>,
    pub recommendations: Vec<Value>,
    pub needs_more_data: bool,
    pub suggested_keywords: Vec<String>,
    pub confidence: Value,
}

impl Insights {
    /// 分析结果无法解析时使用的兜底洞察，不会触发反思
    pub fn fallback() -> Self {
        Self {
            key_findings: vec![Value::String("分析结果解析失败".to_string())],
            needs_more_data: false,
            confidence: Value::from(0.5),
            ..Default::default()
        }
    }
}
