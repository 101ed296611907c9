//! gta-core: deterministic tax-administration data warehouse demo.
//!
//! A seeded pipeline generates a synthetic taxpayer population with
//! embedded fraud behavior, loads it into a SQLite warehouse, raises
//! rule-based fraud alerts, trains and applies a logistic fraud model,
//! and forecasts monthly revenue. Same seed, same warehouse.

pub mod alerts;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod fraud;
pub mod model;
pub mod name_generator;
pub mod payment_generator;
pub mod pipeline;
pub mod registry_generator;
pub mod return_generator;
pub mod rng;
pub mod scoring;
pub mod store;
pub mod summary;
pub mod tasks;
pub mod taxpayer_generator;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
