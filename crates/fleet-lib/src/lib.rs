//! Fleet recommendation library for Kubernetes NodePools
//!
//! This crate provides the core functionality for:
//! - Capacity normalisation of node and workload resources
//! - Candidate instance-type resolution from a pricing catalog
//! - Layered price resolution with caching and fallbacks
//! - Capacity sizing bounded by disruption history
//! - Minimum-cost fleet search and recommendation synthesis

pub mod capacity;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod pricing;
pub mod retry;
pub mod selector;
pub mod sizing;
pub mod synthesizer;

pub use config::EngineConfig;
pub use engine::{AnalysisReport, ProgressEvent, RecommendationEngine, RecommendationEngineBuilder};
pub use error::{CollaboratorError, EngineError};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
