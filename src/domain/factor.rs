//! Weighted multi-factor scoring and top-K selection.

use crate::domain::metrics::MetricsTable;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Factor weights and target portfolio size for one strategy.
///
/// Weights may be any finite value. Ranking is by composite score
/// descending, so a positive weight prefers high raw values and a negative
/// weight prefers low ones. A zero weight contributes nothing to the score
/// but the factor name must still resolve for every ranked instrument.
#[derive(Debug, Clone)]
pub struct FactorConfig {
    pub weights: BTreeMap<String, f64>,
    pub top: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub order_book_id: String,
    pub score: f64,
}

/// Score the eligible instruments and return the `top` best, ranked by
/// weighted factor sum descending.
///
/// An instrument missing a value for any configured factor cannot be scored
/// and is left out of the ranking. Equal scores keep their table order, so
/// the result is reproducible for identical input.
pub fn select(eligible: &MetricsTable, config: &FactorConfig) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = Vec::with_capacity(eligible.len());

    'rows: for row in eligible.rows() {
        let mut score = 0.0;
        for (name, weight) in &config.weights {
            match row.factor_value(name) {
                Some(value) => score += weight * value,
                None => {
                    log::warn!(
                        "dropping {} from ranking: no value for factor {}",
                        row.order_book_id,
                        name
                    );
                    continue 'rows;
                }
            }
        }
        ranked.push(Candidate {
            order_book_id: row.order_book_id.clone(),
            score,
        });
    }

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked.truncate(config.top);
    ranked
}
