pub mod charts;
pub mod dataset;
pub mod etl;
pub mod flatten;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod script;
pub mod session;
pub mod stats;
pub mod tools;

pub use crate::domain::model::{AnalysisPlan, Record};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
