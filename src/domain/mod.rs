//! Core domain types and logic.

pub mod feed;
pub mod metrics;
pub mod factor;
pub mod rebalance;
pub mod order;
pub mod cycle;
pub mod config_validation;
pub mod error;
