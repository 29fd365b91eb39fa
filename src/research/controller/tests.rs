#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::config::{SearchConfig, SortHint};
    use crate::progress::ProgressSink;
    use crate::research::analyzer::Analyzer;
    use crate::research::collector::SearchCollector;
    use crate::research::controller::{MAX_REFLECTION_ROUNDS, PhaseController};
    use crate::research::planner::Planner;
    use crate::research::state::Phase;
    use crate::testing::{MockSource, preview};
    use crate::types::{Insights, NoteRecord, SearchPlan};

    struct FixedPlanner(Vec<&'static str>);

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn plan(&self, _task: &str) -> Result<SearchPlan> {
            Ok(SearchPlan {
                understanding: "测试".to_string(),
                dimensions: vec![],
                keywords: self.0.iter().map(|k| k.to_string()).collect(),
            })
        }
    }

    /// 每次分析都按闭包给出洞察
    struct ScriptedAnalyzer {
        calls: AtomicUsize,
        respond: Box<dyn Fn(usize) -> Result<Insights> + Send + Sync>,
    }

    impl ScriptedAnalyzer {
        fn new(respond: impl Fn(usize) -> Result<Insights> + Send + Sync + 'static) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                respond: Box::new(respond),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn analyze(
            &self,
            _task: &str,
            _plan: Option<&SearchPlan>,
            _searched_keywords: &[String],
            _documents: &[NoteRecord],
        ) -> Result<Insights> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(call)
        }
    }

    fn done() -> Insights {
        Insights::default()
    }

    fn wants(keywords: &[&str]) -> Insights {
        Insights {
            needs_more_data: true,
            suggested_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn search_config() -> SearchConfig {
        SearchConfig {
            retry_delay_ms: 0,
            detail_delay_ms: 0,
            ..Default::default()
        }
    }

    fn controller(
        keywords: Vec<&'static str>,
        source: Arc<MockSource>,
        analyzer: Arc<ScriptedAnalyzer>,
    ) -> PhaseController {
        let collector = SearchCollector::new(
            source,
            search_config(),
            SortHint::General,
            ProgressSink::silent(),
        );
        PhaseController::new(
            Arc::new(FixedPlanner(keywords)),
            analyzer,
            collector,
            &search_config(),
            ProgressSink::silent(),
        )
    }

    fn rich_source() -> MockSource {
        let mut source = MockSource::new();
        for keyword in ["a", "b", "r1", "r2", "r3", "r4"] {
            source = source.with_keyword(keyword, vec![preview(&format!("{}-n", keyword), 1)]);
        }
        source
    }

    #[tokio::test]
    async fn test_run_without_reflection() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Ok(done())));
        let state = controller(vec!["a", "b"], Arc::new(rich_source()), analyzer.clone())
            .run("主题")
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.documents.len(), 2);
        assert_eq!(state.iteration_count, 0);
        assert_eq!(analyzer.calls(), 1);
        assert!(state.insights.is_some());
    }

    #[tokio::test]
    async fn test_reflection_is_bounded() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|call| {
            let keyword = format!("r{}", call + 1);
            Ok(wants(&[keyword.as_str()]))
        }));
        let source = Arc::new(rich_source());
        let state = controller(vec!["a"], source.clone(), analyzer.clone())
            .run("主题")
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.iteration_count, MAX_REFLECTION_ROUNDS);
        assert_eq!(analyzer.calls(), MAX_REFLECTION_ROUNDS as usize + 1);
        assert_eq!(state.searched_keywords, vec!["a", "r1", "r2", "r3"]);
        // 每轮都重新搜索规划关键词，但文档按ID去重
        assert_eq!(state.documents.len(), 4);
        assert!(!source.search_calls().contains(&"r4".to_string()));
    }

    #[tokio::test]
    async fn test_reflection_without_novel_keywords_completes() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Ok(wants(&["a", " a ", ""]))));
        let state = controller(vec!["a"], Arc::new(rich_source()), analyzer.clone())
            .run("主题")
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.iteration_count, 0);
        assert_eq!(analyzer.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_search_does_not_loop() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Ok(done())));
        let source = Arc::new(MockSource::new());
        let state = controller(vec!["nothing"], source.clone(), analyzer.clone())
            .run("主题")
            .await
            .unwrap();

        assert!(state.is_complete);
        assert!(state.documents.is_empty());
        assert_eq!(analyzer.calls(), 0);
        assert_eq!(state.search_rounds, 1);
    }

    #[tokio::test]
    async fn test_outage_on_first_search_aborts() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Ok(done())));
        let result = controller(vec!["a"], Arc::new(MockSource::new().unreachable()), analyzer)
            .run("主题")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_analyzer_failure_degrades_to_completion() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Err(anyhow::anyhow!("model down"))));
        let state = controller(vec!["a"], Arc::new(rich_source()), analyzer)
            .run("主题")
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.documents.len(), 1);
        assert!(state.insights.is_none());
    }

    #[tokio::test]
    async fn test_empty_plan_uses_task_as_keyword() {
        let analyzer = Arc::new(ScriptedAnalyzer::new(|_| Ok(done())));
        let source = Arc::new(rich_source());
        let controller = controller(vec![], source.clone(), analyzer);

        let mut state = crate::research::state::RunState::new("a");
        assert_eq!(controller.step(&mut state).await.unwrap(), Phase::Planning);
        assert_eq!(state.search_keywords, vec!["a"]);
        assert_eq!(controller.step(&mut state).await.unwrap(), Phase::Searching);
        assert_eq!(source.search_calls(), vec!["a"]);
    }
}
