//! summary-notifier domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Feed items, history records, summaries and job events
//! - `config`: The validated deployment configuration
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: The crawler, notifier and alerter jobs
//! - `stack`: Synthesis of the deployment template from configuration

pub mod config;
pub mod model;
pub mod ports;
pub mod schedule;
pub mod stack;
pub mod usecases;

pub use config::*;
pub use model::*;
pub use ports::*;
pub use schedule::CronSchedule;
