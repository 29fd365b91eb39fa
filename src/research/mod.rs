//! 研究流程 - 规划、并发搜索、分析与反思循环

pub mod analyzer;
pub mod collector;
pub mod controller;
pub mod planner;
pub mod state;

pub use analyzer::{Analyzer, LlmAnalyzer};
pub use collector::{CollectError, SearchCollector};
pub use controller::{MAX_REFLECTION_ROUNDS, PhaseController};
pub use planner::{LlmPlanner, Planner};
pub use state::{Phase, RunState};
