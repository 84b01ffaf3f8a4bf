//! Single-date rebalance cycle orchestration.
//!
//! Wires the seams together in a fixed order: validate config, fetch the
//! merged metrics, filter to the tradable universe, score and select, plan
//! the transitions, then hand each instruction to the execution collaborator
//! and journal whatever filled.

use crate::domain::config_validation::validate_factor_config;
use crate::domain::error::CbrotorError;
use crate::domain::factor::{Candidate, FactorConfig, select};
use crate::domain::order::FillReport;
use crate::domain::rebalance::{RebalanceInstruction, plan};
use crate::ports::eligibility_port::EligibilityPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::fetch_port::FetchPort;
use crate::ports::journal_port::JournalPort;
use chrono::NaiveDate;

/// Summary of one completed rebalance cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub date: NaiveDate,
    pub universe_size: usize,
    pub eligible_size: usize,
    pub candidates: Vec<Candidate>,
    pub instructions: Vec<RebalanceInstruction>,
    pub fills: Vec<FillReport>,
    pub unfilled: usize,
}

/// Run one rebalance cycle for `date`.
///
/// Configuration problems and feed failures abort the whole cycle; an
/// instruction that does not fully fill is logged, journaled, and the cycle
/// continues.
pub fn run_cycle(
    date: NaiveDate,
    factors: &FactorConfig,
    fetcher: &dyn FetchPort,
    filter: &dyn EligibilityPort,
    execution: &mut dyn ExecutionPort,
    journal: &mut dyn JournalPort,
) -> Result<CycleReport, CbrotorError> {
    validate_factor_config(factors)?;

    let metrics = fetcher.fetch(date)?;
    log::info!("{}: merged metrics for {} instruments", date, metrics.len());

    let eligible = filter.filter(date, &metrics)?;
    log::info!(
        "{}: {} of {} instruments eligible",
        date,
        eligible.len(),
        metrics.len()
    );

    let candidates = select(&eligible, factors);
    for candidate in &candidates {
        log::debug!(
            "candidate {} score {:.4}",
            candidate.order_book_id,
            candidate.score
        );
    }

    let holdings = execution.holdings()?;
    let instructions = plan(&holdings, &candidates, factors.top);

    // Full metrics, not the eligible subset: positions being closed may be
    // instruments that dropped out of eligibility.
    execution.begin_cycle(date, &metrics);

    let mut fills = Vec::new();
    let mut unfilled = 0usize;
    for instruction in &instructions {
        let fill =
            execution.set_target_weight(&instruction.order_book_id, instruction.target_weight)?;
        if let Some(fill) = fill {
            if !fill.is_complete() {
                unfilled += 1;
                log::warn!(
                    "order for {} not fully filled: {:?}",
                    fill.order_book_id,
                    fill.status
                );
            }
            journal.append(&fill)?;
            fills.push(fill);
        }
    }

    Ok(CycleReport {
        date,
        universe_size: metrics.len(),
        eligible_size: eligible.len(),
        candidates,
        instructions,
        fills,
        unfilled,
    })
}
