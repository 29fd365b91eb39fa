use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::VisionConfig;
use crate::llm::{ImageInput, VisionModel};
use crate::progress::{ProgressSink, Stage};
use crate::types::{ClassificationMap, ImageClassification};
use crate::vision::parser::{RawAnalysis, parse_analyses};

/// 批量图片分类器
///
/// 批次严格串行执行。无论模型调用或解析失败多少次，每个输入URL都恰好得到一条记录。
pub struct VisualClassifier {
    model: Arc<dyn VisionModel>,
    config: VisionConfig,
    progress: ProgressSink,
}

impl VisualClassifier {
    pub fn new(model: Arc<dyn VisionModel>, config: VisionConfig, progress: ProgressSink) -> Self {
        Self {
            model,
            config,
            progress,
        }
    }

    /// 对图片分批分类，返回以URL为键的分类结果
    pub async fn classify(
        &self,
        image_urls: &[String],
        topic: &str,
        batch_size: usize,
    ) -> ClassificationMap {
        let mut seen = HashSet::new();
        let unique: Vec<String> = image_urls
            .iter()
            .filter(|url| !url.trim().is_empty() && seen.insert(url.as_str()))
            .cloned()
            .collect();

        let mut results = ClassificationMap::new();
        if unique.is_empty() {
            return results;
        }

        let batch_size = batch_size.max(1);
        let total_batches = unique.len().div_ceil(batch_size);
        self.progress.info(
            Stage::Classifying,
            format!(
                "🖼️ 开始分析 {} 张图片，共 {} 批 (每批 {} 张)",
                unique.len(),
                total_batches,
                batch_size
            ),
        );

        for (batch_index, batch) in unique.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                let delay = self.config.batch_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let records = self
                .classify_batch(batch, topic, batch_index + 1, total_batches)
                .await;
            for record in records {
                results.insert(record);
            }
        }

        self.report_statistics(&results);
        results
    }

    async fn classify_batch(
        &self,
        batch: &[String],
        topic: &str,
        batch_no: usize,
        total_batches: usize,
    ) -> Vec<ImageClassification> {
        self.progress.info(
            Stage::Classifying,
            format!("   分析第 {}/{} 批 ({} 张)", batch_no, total_batches, batch.len()),
        );

        let prompt = format!(include_str!("prompts/classify.tpl"), topic, batch.len());
        let images: Vec<ImageInput> = batch.iter().cloned().map(ImageInput::Url).collect();

        let Some(response) = self.invoke_with_retry(&prompt, &images, batch_no).await else {
            return batch.iter().map(ImageClassification::fallback).collect();
        };

        let Some(items) = parse_analyses(&response) else {
            self.progress.warn(
                Stage::Classifying,
                format!("   ⚠️ 第 {} 批结果无法解析，使用默认分类", batch_no),
            );
            return batch.iter().map(ImageClassification::fallback).collect();
        };

        Self::assemble(batch, items)
    }

    /// 将批内序号映射回URL；缺失的序号补默认记录
    fn assemble(batch: &[String], items: Vec<serde_json::Value>) -> Vec<ImageClassification> {
        let mut slots: Vec<Option<ImageClassification>> = vec![None; batch.len()];

        for (position, item) in items.into_iter().enumerate() {
            let Some(raw) = RawAnalysis::from_value(item) else {
                continue;
            };
            let index = raw.index().unwrap_or(position);
            match slots.get_mut(index) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(raw.into_classification(&batch[index]));
                }
                Some(_) => tracing::debug!(index = index, "重复的图片序号，保留第一条"),
                None => tracing::debug!(index = index, "图片序号超出本批范围"),
            }
        }

        let missing = slots.iter().filter(|slot| slot.is_none()).count();
        if missing > 0 {
            tracing::warn!("{} 张图片未返回分析结果，使用默认分类", missing);
        }

        slots
            .into_iter()
            .zip(batch)
            .map(|(slot, url)| slot.unwrap_or_else(|| ImageClassification::fallback(url)))
            .collect()
    }

    /// 调用视觉模型；限流时按 `(attempt+1) * backoff` 等待后重试，超时直接重试，其他错误不重试
    async fn invoke_with_retry(
        &self,
        prompt: &str,
        images: &[ImageInput],
        batch_no: usize,
    ) -> Option<String> {
        let max_attempts = self.config.max_attempts();

        for attempt in 0..max_attempts {
            match self.model.invoke(prompt, images).await {
                Ok(response) => return Some(response),
                Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                    let wait = Duration::from_millis(
                        self.config.rate_limit_backoff_ms * u64::from(attempt + 1),
                    );
                    self.progress.warn(
                        Stage::Classifying,
                        format!(
                            "   ⏳ 第 {} 批触发限流，{:.0}秒后重试 ({}/{})",
                            batch_no,
                            wait.as_secs_f64(),
                            attempt + 1,
                            max_attempts
                        ),
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_timeout() && attempt + 1 < max_attempts => {
                    tracing::warn!(batch = batch_no, "视觉模型调用超时，重试 ({}/{})", attempt + 1, max_attempts);
                }
                Err(e) => {
                    self.progress.warn(
                        Stage::Classifying,
                        format!("   ⚠️ 第 {} 批分析失败，使用默认分类: {}", batch_no, e),
                    );
                    return None;
                }
            }
        }
        None
    }

    fn report_statistics(&self, results: &ClassificationMap) {
        let counts = results
            .category_counts()
            .into_iter()
            .map(|(category, count)| format!("{}={}", category, count))
            .collect::<Vec<_>>()
            .join(", ");
        self.progress.info(
            Stage::Classifying,
            format!(
                "✅ 图片分析完成: {} 张，可用 {} 张 ({})",
                results.len(),
                results.usable_count(),
                counts
            ),
        );
    }
}
