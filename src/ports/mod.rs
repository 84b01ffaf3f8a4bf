//! Port traits decoupling the domain from I/O concerns.

pub mod config_port;
pub mod eligibility_port;
pub mod execution_port;
pub mod fetch_port;
pub mod journal_port;
pub mod market_data_port;
