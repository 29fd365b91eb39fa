//! 进度事件 - 组件通过通道上报进度，与控制流解耦

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// 事件所属阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Searching,
    Analyzing,
    Classifying,
    Matching,
    Workflow,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Planning => "Planner",
            Stage::Searching => "Searcher",
            Stage::Analyzing => "Analyzer",
            Stage::Classifying => "Classifier",
            Stage::Matching => "Matcher",
            Stage::Workflow => "Workflow",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub level: ProgressLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// 进度事件的发送端
///
/// 没有通道时事件只写入 tracing 日志。接收端被丢弃后发送静默失败。
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn info(&self, stage: Stage, message: impl Into<String>) {
        self.emit(stage, ProgressLevel::Info, message.into());
    }

    pub fn warn(&self, stage: Stage, message: impl Into<String>) {
        self.emit(stage, ProgressLevel::Warn, message.into());
    }

    pub fn error(&self, stage: Stage, message: impl Into<String>) {
        self.emit(stage, ProgressLevel::Error, message.into());
    }

    fn emit(&self, stage: Stage, level: ProgressLevel, message: String) {
        match level {
            ProgressLevel::Info => tracing::info!(stage = %stage, "{}", message),
            ProgressLevel::Warn => tracing::warn!(stage = %stage, "{}", message),
            ProgressLevel::Error => tracing::error!(stage = %stage, "{}", message),
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                stage,
                level,
                message,
                at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.info(Stage::Planning, "first");
        sink.warn(Stage::Searching, "second");
        drop(sink);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.stage, Stage::Planning);
        assert_eq!(first.level, ProgressLevel::Info);
        assert_eq!(first.message, "first");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.level, ProgressLevel::Warn);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_silent_sink_does_not_panic() {
        let sink = ProgressSink::silent();
        sink.error(Stage::Workflow, "nobody listens");
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.info(Stage::Matching, "ignored");
    }
}
