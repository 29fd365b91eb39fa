use std::collections::HashSet;

/// 将文本按非字母数字字符切分，保留长度≥2的词，小写并去重（保序）
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// 规范化关键词列表：去空白、小写、去重
pub fn normalize(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty() && seen.insert(keyword.clone()))
        .collect()
}

/// 词及其二元字组；二元字组只对中文这类不以空格分词的词生成
fn units(text: &str) -> HashSet<String> {
    let mut units = HashSet::new();
    for token in tokenize(text) {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 2 && !token.is_ascii() {
            for pair in chars.windows(2) {
                units.insert(pair.iter().collect::<String>());
            }
        }
        units.insert(token);
    }
    units
}

/// 场景类型与章节标题的重合程度：场景类型的词或二元字组出现在标题中的个数
pub fn scene_overlap(scene_type: &str, title: &str) -> usize {
    let title = title.to_lowercase();
    if title.trim().is_empty() {
        return 0;
    }
    units(scene_type)
        .iter()
        .filter(|unit| title.contains(unit.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed_text() {
        let tokens = tokenize("Budget 预算, budget! a 1 费用明细");
        assert_eq!(tokens, vec!["budget", "预算", "费用明细"]);
    }

    #[test]
    fn test_normalize() {
        let keywords = vec![" 预算 ".to_string(), "预算".to_string(), "".to_string(), "Cost".to_string()];
        assert_eq!(normalize(&keywords), vec!["预算", "cost"]);
    }

    #[test]
    fn test_scene_overlap() {
        assert_eq!(scene_overlap("数据展示", "上海旅游"), 0);
        assert_eq!(scene_overlap("数据展示", "预算数据一览"), 1);
        assert!(scene_overlap("数据展示", "数据展示区") >= 2);
        assert_eq!(scene_overlap("", "任意标题"), 0);
        assert_eq!(scene_overlap("product photo", "Product list"), 1);
    }
}
