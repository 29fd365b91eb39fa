//! 单元测试共用的脚本化客户端

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::SortHint;
use crate::llm::{ImageGenerator, ImageInput, ModelError, TextModel, VisionModel};
use crate::source::{ContentSource, SourceError};
use crate::types::{NoteDetail, NotePreview};

pub fn preview(id: &str, likes: u64) -> NotePreview {
    NotePreview {
        id: id.to_string(),
        title: format!("标题{}", id),
        author: format!("作者{}", id),
        content_preview: format!("预览{}", id),
        likes,
        comments: 1,
        url: format!("https://www.xiaohongshu.com/explore/{}", id),
        access_token: Some(format!("token-{}", id)),
        cover_image: None,
    }
}

pub fn detail_for(id: &str) -> NoteDetail {
    NoteDetail {
        title: format!("详情{}", id),
        content: format!("正文{}", id),
        author: format!("作者{}", id),
        images: vec![format!("https://img/{}-1.jpg", id)],
        tags: vec!["标签".to_string()],
        likes: 10,
        comments: 1,
        url: format!("https://www.xiaohongshu.com/explore/{}", id),
    }
}

/// 可注入失败的内容源
#[derive(Default)]
pub struct MockSource {
    results: HashMap<String, Vec<NotePreview>>,
    scripted_failures: Mutex<HashMap<String, VecDeque<SourceError>>>,
    failing_details: HashSet<String>,
    unreachable: bool,
    search_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    search_calls: Mutex<Vec<String>>,
    detail_calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, keyword: &str, previews: Vec<NotePreview>) -> Self {
        self.results.insert(keyword.to_string(), previews);
        self
    }

    /// 该关键词前几次搜索依次返回这些错误
    pub fn failing_searches(self, keyword: &str, errors: Vec<SourceError>) -> Self {
        self.scripted_failures
            .lock()
            .unwrap()
            .insert(keyword.to_string(), errors.into());
        self
    }

    pub fn failing_detail(mut self, id: &str) -> Self {
        self.failing_details.insert(id.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn search(&self, keyword: &str, _sort: SortHint) -> Result<Vec<NotePreview>, SourceError> {
        self.search_calls.lock().unwrap().push(keyword.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(SourceError::Transport("connection refused".to_string()));
        }
        let scripted = self
            .scripted_failures
            .lock()
            .unwrap()
            .get_mut(keyword)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }
        Ok(self.results.get(keyword).cloned().unwrap_or_default())
    }

    async fn fetch_detail(
        &self,
        id: &str,
        access_token: Option<&str>,
    ) -> Result<NoteDetail, SourceError> {
        self.detail_calls.lock().unwrap().push(id.to_string());
        if access_token.is_none() {
            return Err(SourceError::MissingToken);
        }
        if self.failing_details.contains(id) {
            return Err(SourceError::Http {
                status: 500,
                message: "detail unavailable".to_string(),
            });
        }
        Ok(detail_for(id))
    }
}

/// 按顺序返回预设回复的文本模型；回复用完后返回 `fallback`
pub struct MockTextModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: String,
    calls: AtomicUsize,
}

impl MockTextModel {
    pub fn new(responses: Vec<Result<String, ModelError>>, fallback: &str) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextModel for MockTextModel {
    async fn invoke(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

type VisionHandler = dyn Fn(usize, &[ImageInput]) -> Result<String, ModelError> + Send + Sync;

/// 由闭包决定回复的视觉模型，闭包收到调用序号与本批图片
pub struct MockVision {
    handler: Box<VisionHandler>,
    calls: AtomicUsize,
}

impl MockVision {
    pub fn new(
        handler: impl Fn(usize, &[ImageInput]) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for MockVision {
    async fn invoke(&self, _prompt: &str, images: &[ImageInput]) -> Result<String, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(call, images)
    }
}

/// 返回递增URL的图片生成器
#[derive(Default)]
pub struct MockImageGenerator {
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockImageGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, prompt: &str, _size: &str) -> Result<String, ModelError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        if self.fail {
            return Err(ModelError::Unavailable("generation disabled".to_string()));
        }
        Ok(format!("https://gen/{}.png", prompts.len()))
    }
}
