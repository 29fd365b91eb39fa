pub mod cli;
pub mod config;
pub mod llm;
pub mod matching;
pub mod progress;
pub mod research;
pub mod source;
pub mod types;
pub mod utils;
pub mod vision;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use workflow::{ResearchOutput, launch, launch_with};
