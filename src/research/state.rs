use serde::Serialize;
use std::collections::HashSet;

use crate::types::{ClassificationMap, Insights, NoteRecord, SearchPlan};

/// 研究流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Searching,
    Analyzing,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Planning => "规划",
            Phase::Searching => "搜索",
            Phase::Analyzing => "分析",
            Phase::Done => "完成",
        };
        write!(f, "{}", name)
    }
}

/// 一次研究运行的全部状态，由 `PhaseController` 独占写入
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunState {
    pub task: String,
    pub plan: Option<SearchPlan>,
    /// 规划产出的关键词
    pub search_keywords: Vec<String>,
    /// 反思阶段请求补充的关键词，搜索派发后清空
    pub additional_keywords: Vec<String>,
    /// 已派发过的全部关键词
    pub searched_keywords: Vec<String>,
    pub documents: Vec<NoteRecord>,
    pub insights: Option<Insights>,
    pub classifications: ClassificationMap,
    pub iteration_count: u32,
    pub search_rounds: u32,
    pub is_complete: bool,
}

impl RunState {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    /// 根据当前状态决定下一步
    ///
    /// 文档为空时只在尚未搜索过的情况下进入搜索，避免空结果导致死循环。
    pub fn next_phase(&self) -> Phase {
        if self.is_complete {
            Phase::Done
        } else if self.plan.is_none() {
            Phase::Planning
        } else if (self.documents.is_empty() && self.search_rounds == 0)
            || !self.additional_keywords.is_empty()
        {
            Phase::Searching
        } else {
            Phase::Analyzing
        }
    }

    /// 规划关键词与补充关键词的并集（保序去重），并清空补充关键词
    pub fn take_keywords_for_search(&mut self) -> Vec<String> {
        let additional = std::mem::take(&mut self.additional_keywords);
        let mut seen = HashSet::new();
        let keywords: Vec<String> = self
            .search_keywords
            .iter()
            .chain(additional.iter())
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty() && seen.insert(keyword.to_string()))
            .map(str::to_string)
            .collect();

        for keyword in &keywords {
            if !self.searched_keywords.contains(keyword) {
                self.searched_keywords.push(keyword.clone());
            }
        }
        self.search_rounds += 1;
        keywords
    }

    /// 追加搜索结果；非空ID的笔记只保留第一次出现的记录。返回实际新增数量
    pub fn absorb_documents(&mut self, records: Vec<NoteRecord>) -> usize {
        let mut known: HashSet<String> = self
            .documents
            .iter()
            .map(|record| record.preview.id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let before = self.documents.len();
        for record in records {
            let id = record.preview.id.clone();
            if id.is_empty() || known.insert(id) {
                self.documents.push(record);
            }
        }
        self.documents.len() - before
    }

    /// 从建议关键词中挑出新的关键词：去空白、去重，并排除已搜索过的
    pub fn novel_keywords(&self, suggested: &[String]) -> Vec<String> {
        let mut seen: HashSet<&str> = self.searched_keywords.iter().map(String::as_str).collect();
        let mut novel = Vec::new();
        for keyword in suggested {
            let keyword = keyword.trim();
            if !keyword.is_empty() && seen.insert(keyword) {
                novel.push(keyword.to_string());
            }
        }
        novel
    }

    /// 所有笔记详情中的图片URL，按笔记顺序
    pub fn image_urls(&self) -> Vec<String> {
        self.documents
            .iter()
            .flat_map(|record| record.detail.images.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NoteDetail, NotePreview};

    fn record(id: &str, images: &[&str]) -> NoteRecord {
        NoteRecord::new(
            NotePreview {
                id: id.to_string(),
                ..Default::default()
            },
            NoteDetail {
                images: images.iter().map(|url| url.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_phase_sequence() {
        let mut state = RunState::new("上海旅游");
        assert_eq!(state.next_phase(), Phase::Planning);

        state.plan = Some(SearchPlan::default());
        assert_eq!(state.next_phase(), Phase::Searching);

        state.take_keywords_for_search();
        // 搜索过一轮但没有结果，不再重复搜索
        assert_eq!(state.next_phase(), Phase::Analyzing);

        state.additional_keywords = vec!["补充".to_string()];
        assert_eq!(state.next_phase(), Phase::Searching);

        state.is_complete = true;
        assert_eq!(state.next_phase(), Phase::Done);
    }

    #[test]
    fn test_keywords_for_search_union_and_clear() {
        let mut state = RunState::new("t");
        state.search_keywords = vec!["a".into(), "b".into()];
        state.additional_keywords = vec!["b".into(), " c ".into(), "".into()];

        let keywords = state.take_keywords_for_search();
        assert_eq!(keywords, vec!["a", "b", "c"]);
        assert!(state.additional_keywords.is_empty());
        assert_eq!(state.searched_keywords, vec!["a", "b", "c"]);
        assert_eq!(state.search_rounds, 1);
    }

    #[test]
    fn test_absorb_documents_dedups_by_id() {
        let mut state = RunState::new("t");
        assert_eq!(state.absorb_documents(vec![record("1", &[]), record("2", &[])]), 2);
        assert_eq!(
            state.absorb_documents(vec![record("2", &["x"]), record("", &[]), record("", &[])]),
            2
        );
        assert_eq!(state.documents.len(), 4);
        // 第一次出现的记录保留
        assert!(state.documents[1].detail.images.is_empty());
    }

    #[test]
    fn test_novel_keywords() {
        let mut state = RunState::new("t");
        state.searched_keywords = vec!["上海 美食".into()];
        let suggested = vec![
            " 上海 美食 ".to_string(),
            "上海 夜景".to_string(),
            "上海 夜景".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(state.novel_keywords(&suggested), vec!["上海 夜景"]);
    }

    #[test]
    fn test_image_urls_in_document_order() {
        let mut state = RunState::new("t");
        state.absorb_documents(vec![record("1", &["a", "b"]), record("2", &["c"])]);
        assert_eq!(state.image_urls(), vec!["a", "b", "c"]);
    }
}
