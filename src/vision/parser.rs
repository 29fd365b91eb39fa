//! 视觉模型输出的容错解析
//!
//! 依次尝试：直接解析 → 代码块 → 截取首尾括号（方括号与花括号都试）→ 字面量修复 → 整体替换单引号。全部失败时返回 `None`，
//! 由调用方补默认记录。

use regex::Regex;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;
use std::sync::LazyLock;

use crate::types::{ImageCategory, ImageClassification};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("valid regex"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([\]}])").expect("valid regex"));
static PY_TRUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bTrue\b").expect("valid regex"));
static PY_FALSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFalse\b").expect("valid regex"));
static PY_NONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNone\b").expect("valid regex"));

/// 常见的包裹字段，模型有时返回 `{"analyses": [...]}` 而不是数组
const ENVELOPE_KEYS: [&str; 4] = ["analyses", "images", "results", "data"];

/// 解析模型输出为分析条目列表
pub fn parse_analyses(raw: &str) -> Option<Vec<Value>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(items) = parse_and_unwrap(text) {
        return Some(items);
    }

    if let Some(items) = FENCED_BLOCK
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|block| parse_and_unwrap(block.as_str().trim()))
    {
        return Some(items);
    }

    let candidates = slice_candidates(text);
    let candidates = if candidates.is_empty() {
        vec![text]
    } else {
        candidates
    };

    for candidate in &candidates {
        if let Some(items) = parse_and_unwrap(candidate) {
            return Some(items);
        }
    }

    // 先做只替换字符串定界符的修复，失败再整体替换单引号
    for repair in [repair_literal as fn(&str) -> String, repair_blanket] {
        for candidate in &candidates {
            if let Some(items) = parse_and_unwrap(&repair(candidate)) {
                return Some(items);
            }
        }
    }

    tracing::debug!("视觉模型输出无法解析: {}", text.chars().take(200).collect::<String>());
    None
}

fn parse_and_unwrap(text: &str) -> Option<Vec<Value>> {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(unwrap_envelope)
}

fn unwrap_envelope(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut object) => {
            for key in ENVELOPE_KEYS {
                if let Some(Value::Array(items)) = object.remove(key) {
                    return Some(items);
                }
            }
            if let Some(items) = object.values().find_map(|v| v.as_array().cloned()) {
                return Some(items);
            }
            Some(vec![Value::Object(object)])
        }
        _ => None,
    }
}

/// 截取 `[`…`]` 与 `{`…`}` 两种片段，按起始位置排序
fn slice_candidates(text: &str) -> Vec<&str> {
    let mut slices: Vec<(usize, &str)> = [('[', ']'), ('{', '}')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = text.find(open)?;
            let end = text.rfind(close)?;
            (end > start).then(|| (start, &text[start..=end]))
        })
        .collect();
    slices.sort_by_key(|(start, _)| *start);
    slices.into_iter().map(|(_, slice)| slice).collect()
}

/// Python 字面量风格的修复：只把单引号定界符换成双引号，双引号字符串里的撇号保持原样
fn repair_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                out.push('"');
            }
            (Some(_), '\\') => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (Some(q), c) if c == q => {
                quote = None;
                out.push('"');
            }
            (Some('\''), '"') => out.push_str("\\\""),
            _ => out.push(c),
        }
    }

    fix_literals(&out)
}

/// 整体替换单引号
fn repair_blanket(text: &str) -> String {
    fix_literals(&text.replace('\'', "\""))
}

/// 去掉尾随逗号，Python 风格的布尔值与空值改为 JSON
fn fix_literals(text: &str) -> String {
    let no_trailing = TRAILING_COMMA.replace_all(text, "$1");
    let step = PY_TRUE.replace_all(&no_trailing, "true");
    let step = PY_FALSE.replace_all(&step, "false");
    PY_NONE.replace_all(&step, "null").into_owned()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Int(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

impl NumberLike {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberLike::Int(v) => Some(*v),
            NumberLike::Float(v) if v.is_finite() => Some(v.round() as i64),
            NumberLike::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i64))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoolLike {
    Bool(bool),
    Int(i64),
    Text(String),
    Other(IgnoredAny),
}

impl BoolLike {
    fn as_bool(&self) -> Option<bool> {
        match self {
            BoolLike::Bool(v) => Some(*v),
            BoolLike::Int(v) => Some(*v != 0),
            BoolLike::Text(text) => match text.trim().to_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "是" => Some(true),
                "false" | "no" | "n" | "0" | "否" => Some(false),
                _ => None,
            },
            BoolLike::Other(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListLike {
    Many(Vec<Value>),
    One(String),
    Other(IgnoredAny),
}

impl ListLike {
    fn into_strings(self) -> Vec<String> {
        let items: Vec<String> = match self {
            ListLike::Many(values) => values.into_iter().filter_map(value_to_text).collect(),
            ListLike::One(text) => text
                .split([',', '，', '、', ';', '；'])
                .map(str::to_string)
                .collect(),
            ListLike::Other(_) => Vec::new(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// 单条分析结果，字段类型全部宽松处理
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAnalysis {
    image_index: Option<NumberLike>,
    description: Option<Value>,
    tags: Option<ListLike>,
    category: Option<Value>,
    content_keywords: Option<ListLike>,
    scene_type: Option<Value>,
    quality_score: Option<NumberLike>,
    should_use: Option<BoolLike>,
    matched_sections: Option<ListLike>,
}

impl RawAnalysis {
    /// 宽松解码；条目本身不是对象时返回 `None`
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// 模型给出的批内序号（从0开始）
    pub fn index(&self) -> Option<usize> {
        self.image_index
            .as_ref()
            .and_then(NumberLike::as_i64)
            .and_then(|index| usize::try_from(index).ok())
    }

    pub fn into_classification(self, image_url: &str) -> ImageClassification {
        let text = |value: Option<Value>| value.and_then(value_to_text).unwrap_or_default();
        let list = |value: Option<ListLike>| value.map(ListLike::into_strings).unwrap_or_default();

        ImageClassification {
            image_url: image_url.to_string(),
            description: text(self.description),
            tags: list(self.tags),
            category: ImageCategory::from_label(&text(self.category)),
            content_keywords: list(self.content_keywords),
            scene_type: text(self.scene_type).trim().to_string(),
            quality_score: self
                .quality_score
                .as_ref()
                .and_then(NumberLike::as_i64)
                .map(ImageClassification::clamp_quality)
                .unwrap_or(ImageClassification::DEFAULT_QUALITY),
            should_use: self
                .should_use
                .as_ref()
                .and_then(BoolLike::as_bool)
                .unwrap_or(true),
            matched_sections: list(self.matched_sections),
        }
    }
}
