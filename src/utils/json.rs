/// 从模型输出中截取第一个 `{` 到最后一个 `}` 之间的文本
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 截取并反序列化模型输出中的JSON对象
pub fn parse_object<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    extract_object(text).and_then(|slice| serde_json::from_str(slice).ok())
}
