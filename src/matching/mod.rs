//! 图片匹配 - 为报告章节分配图片，必要时生成

pub mod engine;
pub mod keywords;

pub use engine::{Candidate, MatchingEngine, TargetKeywords};
