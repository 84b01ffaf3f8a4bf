//! Concrete adapter implementations for ports.

pub mod csv_source;
pub mod feed_cache;
pub mod fetcher;
pub mod active_bond_filter;
pub mod paper_execution;
pub mod csv_journal;
pub mod file_config_adapter;
