//! 图片理解 - 批量分类与模型输出解析

pub mod classifier;
pub mod parser;

pub use classifier::VisualClassifier;
