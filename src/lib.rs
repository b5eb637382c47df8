pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::storage::LocalStorage;
pub use crate::config::{AppConfig, PlanConfig};

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::core::{etl::AnalysisEngine, pipeline::AnalysisPipeline, planner::KeywordPlanner};
pub use crate::utils::error::{AnalysisError, Result};
