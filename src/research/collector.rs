use std::sync::Arc;
use thiserror::Error;

use crate::config::{SearchConfig, SortHint};
use crate::progress::{ProgressSink, Stage};
use crate::source::{ContentSource, SourceError};
use crate::types::{NotePreview, NoteRecord};
use crate::utils::threads::do_parallel_with_limit;

#[derive(Debug, Error)]
pub enum CollectError {
    /// 所有关键词都因连接失败或超时而没有拿到任何结果
    #[error("content source unreachable: {0}")]
    SourceUnreachable(String),
}

/// 单个关键词的采集结果
struct KeywordOutcome {
    records: Vec<NoteRecord>,
    failure: Option<SourceError>,
}

/// 多关键词搜索采集器
///
/// 关键词之间并发（受 `concurrency` 限制），同一关键词下的详情获取串行并节流。
pub struct SearchCollector {
    source: Arc<dyn ContentSource>,
    config: SearchConfig,
    sort: SortHint,
    progress: ProgressSink,
}

impl SearchCollector {
    pub fn new(
        source: Arc<dyn ContentSource>,
        config: SearchConfig,
        sort: SortHint,
        progress: ProgressSink,
    ) -> Self {
        Self {
            source,
            config,
            sort,
            progress,
        }
    }

    /// 搜索全部关键词并获取详情
    ///
    /// 返回的记录按关键词派发顺序合并；单条失败只会降级，不会中断。
    pub async fn collect(
        &self,
        keywords: &[String],
        per_keyword_limit: usize,
        concurrency: usize,
    ) -> Result<Vec<NoteRecord>, CollectError> {
        if keywords.is_empty() {
            self.progress.warn(Stage::Searching, "⚠️ 没有可搜索的关键词");
            return Ok(Vec::new());
        }

        let total = keywords.len();
        let concurrency = concurrency.max(1);
        self.progress.info(
            Stage::Searching,
            format!("🔍 开始并行搜索 {} 个关键词 (并发={})", total, concurrency),
        );

        let futures: Vec<_> = keywords
            .iter()
            .enumerate()
            .map(|(index, keyword)| {
                Box::pin(self.collect_keyword(keyword, index, total, per_keyword_limit))
            })
            .collect();
        let outcomes = do_parallel_with_limit(futures, concurrency).await;

        let all_unreachable = outcomes.iter().all(|outcome| {
            outcome
                .failure
                .as_ref()
                .is_some_and(SourceError::is_unreachable)
        });

        let mut last_failure = None;
        let mut records = Vec::new();
        for outcome in outcomes {
            records.extend(outcome.records);
            if outcome.failure.is_some() {
                last_failure = outcome.failure;
            }
        }

        if records.is_empty() && all_unreachable {
            let reason = last_failure
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no response".to_string());
            self.progress
                .error(Stage::Searching, format!("❌ 内容源不可达: {}", reason));
            return Err(CollectError::SourceUnreachable(reason));
        }

        let degraded = records.iter().filter(|record| record.degraded).count();
        self.progress.info(
            Stage::Searching,
            format!(
                "✅ 搜索完成，共收集 {} 篇笔记（其中 {} 篇使用预览数据）",
                records.len(),
                degraded
            ),
        );
        Ok(records)
    }

    async fn collect_keyword(
        &self,
        keyword: &str,
        index: usize,
        total: usize,
        limit: usize,
    ) -> KeywordOutcome {
        self.progress.info(
            Stage::Searching,
            format!("🔎 搜索关键词 [{}/{}]: {}", index + 1, total, keyword),
        );

        let mut previews = match self.search_with_retry(keyword).await {
            Ok(previews) => previews,
            Err(e) => {
                self.progress.warn(
                    Stage::Searching,
                    format!("   ✗ 关键词 {} 搜索最终失败: {}", keyword, e),
                );
                return KeywordOutcome {
                    records: Vec::new(),
                    failure: Some(e),
                };
            }
        };

        if limit > 0 {
            previews.truncate(limit);
        }
        // sort_by 是稳定排序，同点赞数保持原顺序
        previews.sort_by(|a, b| b.likes.cmp(&a.likes));
        self.progress.info(
            Stage::Searching,
            format!("   找到 {} 篇笔记: {}", previews.len(), keyword),
        );

        KeywordOutcome {
            records: self.fetch_records(previews).await,
            failure: None,
        }
    }

    /// 带重试的搜索；空结果和错误都会重试，最后一次仍为空则返回空列表
    async fn search_with_retry(&self, keyword: &str) -> Result<Vec<NotePreview>, SourceError> {
        let max_attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let result =
                tokio::time::timeout(self.config.call_timeout(), self.source.search(keyword, self.sort))
                    .await
                    .unwrap_or_else(|_| {
                        Err(SourceError::Timeout(format!(
                            "search exceeded {}s",
                            self.config.call_timeout_seconds
                        )))
                    });

            match result {
                Ok(previews) if !previews.is_empty() => {
                    if attempt > 0 {
                        tracing::info!(keyword = %keyword, "✓ 重试成功 (第{}次)", attempt + 1);
                    }
                    return Ok(previews);
                }
                Ok(_) => {
                    last_error = None;
                    tracing::warn!(
                        keyword = %keyword,
                        "⚠ 搜索返回空结果 ({}/{})",
                        attempt + 1,
                        max_attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        keyword = %keyword,
                        "⚠ 搜索异常: {} ({}/{})",
                        e,
                        attempt + 1,
                        max_attempts
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// 串行获取详情，两次请求之间按配置节流
    async fn fetch_records(&self, previews: Vec<NotePreview>) -> Vec<NoteRecord> {
        let total = previews.len();
        let mut records = Vec::with_capacity(total);

        for (index, preview) in previews.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.detail_delay()).await;
            }
            tracing::debug!(
                note_id = %preview.id,
                "获取详情 [{}/{}]: {}",
                index + 1,
                total,
                preview.title.chars().take(30).collect::<String>()
            );
            records.push(self.fetch_one(preview).await);
        }
        records
    }

    async fn fetch_one(&self, preview: NotePreview) -> NoteRecord {
        let Some(token) = preview.usable_token() else {
            self.progress.warn(
                Stage::Searching,
                format!("   ⚠ 笔记 {} 缺少访问令牌，使用预览数据", preview.id),
            );
            return NoteRecord::degraded(preview);
        };

        let result = tokio::time::timeout(
            self.config.call_timeout(),
            self.source.fetch_detail(&preview.id, Some(token)),
        )
        .await;

        match result {
            Ok(Ok(detail)) if detail.has_payload() => NoteRecord::new(preview, detail),
            Ok(Ok(_)) => {
                self.progress.warn(
                    Stage::Searching,
                    format!("   ⚠ 笔记 {} 详情为空，使用预览数据", preview.id),
                );
                NoteRecord::degraded(preview)
            }
            Ok(Err(e)) => {
                self.progress.warn(
                    Stage::Searching,
                    format!("   ⚠ 获取详情失败: {}，使用预览数据", e),
                );
                NoteRecord::degraded(preview)
            }
            Err(_) => {
                self.progress.warn(
                    Stage::Searching,
                    format!("   ⚠ 获取详情超时: {}，使用预览数据", preview.id),
                );
                NoteRecord::degraded(preview)
            }
        }
    }
}
