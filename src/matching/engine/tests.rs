#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::config::MatchConfig;
    use crate::llm::ImageGenerator;
    use crate::matching::engine::{MatchingEngine, TargetKeywords};
    use crate::progress::ProgressSink;
    use crate::testing::MockImageGenerator;
    use crate::types::{
        ClassificationMap, ImageCategory, ImageClassification, OutlineSection, SectionType,
    };

    fn image(url: &str, quality: u8, keywords: &[&str]) -> ImageClassification {
        ImageClassification {
            image_url: url.to_string(),
            quality_score: quality,
            content_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn engine(generator: Option<Arc<dyn ImageGenerator>>) -> MatchingEngine {
        MatchingEngine::new(
            MatchConfig::default(),
            generator,
            "1024x1024",
            ProgressSink::silent(),
        )
    }

    fn section_with_keywords(title: &str, keywords: &[&str]) -> OutlineSection {
        OutlineSection {
            required_image_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..OutlineSection::content(title, "")
        }
    }

    #[tokio::test]
    async fn test_low_relevance_triggers_generation() {
        let generator = Arc::new(MockImageGenerator::default());
        let map: ClassificationMap = vec![image("https://img/budget.jpg", 9, &["预算表", "价格"])].into();
        let outline = vec![OutlineSection {
            content: "三天行程的预算拆分".to_string(),
            ..section_with_keywords("费用预算", &["预算", "费用"])
        }];

        let result = engine(Some(generator.clone()))
            .assign(outline, &map, "上海旅游")
            .await;

        assert_eq!(
            result[0].assigned_images,
            vec!["https://img/budget.jpg", "https://gen/1.png"]
        );
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("上海旅游"));
        assert!(prompts[0].contains("预算、费用"));
        assert!(prompts[0].contains("三天行程的预算拆分"));
    }

    #[tokio::test]
    async fn test_relevant_image_needs_no_generation() {
        let generator = Arc::new(MockImageGenerator::default());
        let map: ClassificationMap =
            vec![image("https://img/a.jpg", 6, &["预算", "费用"])].into();
        let outline = vec![section_with_keywords("费用预算", &["预算", "费用"])];

        let result = engine(Some(generator.clone())).assign(outline, &map, "主题").await;

        assert_eq!(result[0].assigned_images, vec!["https://img/a.jpg"]);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_no_image_is_assigned_twice() {
        let map: ClassificationMap = (0..5)
            .map(|i| image(&format!("https://img/{}.jpg", i), 5 + i as u8, &[]))
            .collect();
        let outline = vec![
            OutlineSection::content("第一节", "内容"),
            OutlineSection::content("第二节", "内容"),
            OutlineSection::content("第三节", "内容"),
        ];

        let result = engine(None).assign(outline, &map, "主题").await;

        let mut seen = HashSet::new();
        for section in &result {
            for url in &section.assigned_images {
                assert!(seen.insert(url.clone()), "duplicate assignment: {}", url);
            }
        }
        // 默认每节最多 suggested(2)+1 张
        assert_eq!(result[0].assigned_images.len(), 3);
        assert_eq!(result[0].assigned_images[0], "https://img/4.jpg");
        assert_eq!(result[1].assigned_images.len(), 2);
        assert!(result[2].assigned_images.is_empty());
    }

    #[tokio::test]
    async fn test_cover_and_summary_are_skipped() {
        let generator = Arc::new(MockImageGenerator::default());
        let map: ClassificationMap = vec![image("https://img/a.jpg", 9, &[])].into();
        let outline = vec![
            OutlineSection {
                section_type: SectionType::Cover,
                assigned_images: vec!["stale".to_string()],
                ..OutlineSection::content("封面", "")
            },
            OutlineSection {
                section_type: SectionType::Summary,
                ..OutlineSection::content("总结", "")
            },
        ];

        let result = engine(Some(generator.clone())).assign(outline, &map, "主题").await;

        assert!(result.iter().all(|section| section.assigned_images.is_empty()));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_images_are_excluded_and_floor_is_generated() {
        let generator = Arc::new(MockImageGenerator::default());
        let mut ad = image("https://img/ad.jpg", 10, &[]);
        ad.should_use = false;
        let map: ClassificationMap = vec![ad].into();

        let result = engine(Some(generator))
            .assign(vec![OutlineSection::content("行程", "")], &map, "主题")
            .await;

        assert_eq!(result[0].assigned_images, vec!["https://gen/1.png"]);
    }

    #[tokio::test]
    async fn test_without_generator_sections_get_fewer_images() {
        let map = ClassificationMap::new();
        let result = engine(None)
            .assign(vec![OutlineSection::content("行程", "")], &map, "主题")
            .await;
        assert!(result[0].assigned_images.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_skipped() {
        let generator = Arc::new(MockImageGenerator::failing());
        let map = ClassificationMap::new();
        let result = engine(Some(generator.clone()))
            .assign(vec![OutlineSection::content("行程", "")], &map, "主题")
            .await;
        assert!(result[0].assigned_images.is_empty());
        assert_eq!(generator.prompts().len(), 1);
    }

    #[test]
    fn test_target_keywords_explicit_and_derived() {
        let explicit = TargetKeywords::for_section(&section_with_keywords("标题", &[" 预算 ", "预算"]));
        assert!(explicit.explicit);
        assert_eq!(explicit.keywords, vec!["预算"]);

        let derived = TargetKeywords::for_section(&OutlineSection::content("Budget planning", "a cost"));
        assert!(!derived.explicit);
        assert_eq!(derived.keywords, vec!["budget", "planning", "cost"]);
    }

    #[test]
    fn test_score_components() {
        let engine = engine(None);
        let used = HashSet::new();

        let mut record = image("u", 5, &["Budget"]);
        let map: ClassificationMap = vec![record.clone()].into();

        // 推导关键词权重 3
        let derived_section = OutlineSection::content("Budget planning", "");
        let targets = TargetKeywords::for_section(&derived_section);
        assert_eq!(engine.rank(&derived_section, &targets, &map, &used)[0].score, 8);

        // 显式关键词权重 5
        let explicit_section = section_with_keywords("标题", &["budget"]);
        let targets = TargetKeywords::for_section(&explicit_section);
        assert_eq!(engine.rank(&explicit_section, &targets, &map, &used)[0].score, 10);

        // 偏好场景 +5，标题完全匹配 +5，分类匹配 +2
        record.content_keywords.clear();
        record.scene_type = "真实场景".to_string();
        record.matched_sections = vec!["外滩夜景".to_string()];
        record.category = ImageCategory::Real;
        let map: ClassificationMap = vec![record.clone()].into();
        let section = OutlineSection {
            preferred_scene_types: vec!["真实场景".to_string()],
            preferred_image_types: vec!["实景".to_string()],
            ..OutlineSection::content("外滩夜景", "")
        };
        let targets = TargetKeywords::for_section(&section);
        let candidate = &engine.rank(&section, &targets, &map, &used)[0];
        assert_eq!(candidate.relevance, 12);
        assert_eq!(candidate.score, 17);

        // 标题部分匹配 +3，场景与标题二元字组重合一个 +4
        record.scene_type = "数据展示".to_string();
        record.matched_sections = vec!["外滩".to_string()];
        record.category = ImageCategory::Decorative;
        let map: ClassificationMap = vec![record].into();
        let section = OutlineSection::content("外滩数据", "");
        let targets = TargetKeywords::for_section(&section);
        assert_eq!(engine.rank(&section, &targets, &map, &used)[0].relevance, 7);
    }

    #[test]
    fn test_ties_keep_classification_order() {
        let engine = engine(None);
        let map: ClassificationMap = vec![
            image("https://img/first.jpg", 7, &[]),
            image("https://img/best.jpg", 9, &[]),
            image("https://img/second.jpg", 7, &[]),
        ]
        .into();
        let section = OutlineSection::content("x", "");
        let targets = TargetKeywords::for_section(&section);

        let ranked: Vec<&str> = engine
            .rank(&section, &targets, &map, &HashSet::new())
            .iter()
            .map(|candidate| candidate.record.image_url.as_str())
            .collect();
        assert_eq!(
            ranked,
            vec!["https://img/best.jpg", "https://img/first.jpg", "https://img/second.jpg"]
        );
    }
}
