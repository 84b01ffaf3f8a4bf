//! Pre-run validation of rebalance configuration.
//!
//! Configuration problems are fatal before any feed is touched, so every
//! check here runs at cycle start (and from the `validate` subcommand).

use crate::domain::error::CbrotorError;
use crate::domain::factor::FactorConfig;
use crate::domain::feed::Feed;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;

/// Feeds suppressed when the config does not name any: the conversion-terms
/// and put-announcement feeds, which the pipeline never merges.
pub fn default_treat_as_empty() -> HashSet<Feed> {
    HashSet::from([Feed::ConversionInfo, Feed::PutInfo])
}

/// Check everything a rebalance run needs from the config file.
pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    validate_top(config)?;
    validate_factors_section(config)?;
    validate_treat_as_empty_value(config)?;
    validate_required_path(config, "rebalance", "cache_dir")?;
    validate_required_path(config, "source", "data_dir")?;
    validate_required_path(config, "journal", "path")?;
    validate_capital(config)?;
    validate_maturity_window(config)?;
    Ok(())
}

/// Check a materialized factor configuration. Called by the cycle runner
/// before any fetch, so configs built in code get the same guarantees as
/// configs read from a file.
pub fn validate_factor_config(config: &FactorConfig) -> Result<(), CbrotorError> {
    if config.top == 0 {
        return Err(CbrotorError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "top".to_string(),
            reason: "top must be at least 1".to_string(),
        });
    }
    if config.weights.is_empty() {
        return Err(CbrotorError::ConfigInvalid {
            section: "factors".to_string(),
            key: "*".to_string(),
            reason: "at least one factor weight is required".to_string(),
        });
    }
    for (name, weight) in &config.weights {
        if !weight.is_finite() {
            return Err(CbrotorError::ConfigInvalid {
                section: "factors".to_string(),
                key: name.clone(),
                reason: "weight must be a finite number".to_string(),
            });
        }
    }
    Ok(())
}

/// Parse a comma-separated list of feed names to suppress. The instrument
/// universe itself can never be suppressed: every downstream join would be
/// empty and the cycle would plan against nothing.
pub fn parse_treat_as_empty(value: &str) -> Result<HashSet<Feed>, CbrotorError> {
    let mut feeds = HashSet::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let feed = Feed::from_name(token).ok_or_else(|| CbrotorError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "treat_as_empty".to_string(),
            reason: format!("unknown feed name: {token}"),
        })?;
        if feed == Feed::AllInstruments {
            return Err(CbrotorError::ConfigInvalid {
                section: "rebalance".to_string(),
                key: "treat_as_empty".to_string(),
                reason: "the instrument universe cannot be treated as empty".to_string(),
            });
        }
        feeds.insert(feed);
    }
    Ok(feeds)
}

fn validate_top(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    let value = config.get_int("rebalance", "top", 0);
    if value < 1 {
        return Err(CbrotorError::ConfigInvalid {
            section: "rebalance".to_string(),
            key: "top".to_string(),
            reason: "top must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_factors_section(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    let names = config.keys("factors");
    if names.is_empty() {
        return Err(CbrotorError::ConfigInvalid {
            section: "factors".to_string(),
            key: "*".to_string(),
            reason: "at least one factor weight is required".to_string(),
        });
    }
    for name in names {
        let weight = config.get_double("factors", &name, f64::NAN);
        if !weight.is_finite() {
            return Err(CbrotorError::ConfigInvalid {
                section: "factors".to_string(),
                key: name,
                reason: "weight must be a finite number".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_treat_as_empty_value(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    if let Some(value) = config.get_string("rebalance", "treat_as_empty") {
        parse_treat_as_empty(&value)?;
    }
    Ok(())
}

fn validate_required_path(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), CbrotorError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(CbrotorError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_capital(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    let value = config.get_double("execution", "capital", 1_000_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(CbrotorError::ConfigInvalid {
            section: "execution".to_string(),
            key: "capital".to_string(),
            reason: "capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_maturity_window(config: &dyn ConfigPort) -> Result<(), CbrotorError> {
    let value = config.get_int("eligibility", "min_days_to_maturity", 30);
    if value < 0 {
        return Err(CbrotorError::ConfigInvalid {
            section: "eligibility".to_string(),
            key: "min_days_to_maturity".to_string(),
            reason: "min_days_to_maturity must be non-negative".to_string(),
        });
    }
    Ok(())
}
