//! Paper execution collaborator.
//!
//! Tracks portfolio weights in memory, prices orders against the cycle's
//! bond bars, and fills everything at the bar close. Weights survive between
//! invocations through an optional CSV state file so consecutive runs see
//! yesterday's holdings.

use crate::domain::error::CbrotorError;
use crate::domain::metrics::MetricsTable;
use crate::domain::order::{FillReport, FillStatus, PositionEffect, Side};
use crate::ports::execution_port::ExecutionPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Weight moves below this are indistinguishable from float noise.
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug)]
pub struct PaperExecution {
    capital: f64,
    weights: BTreeMap<String, f64>,
    state_path: Option<PathBuf>,
    prices: HashMap<String, f64>,
    cycle_time: Option<NaiveDateTime>,
}

impl PaperExecution {
    pub fn new(capital: f64) -> Self {
        Self {
            capital,
            weights: BTreeMap::new(),
            state_path: None,
            prices: HashMap::new(),
            cycle_time: None,
        }
    }

    /// Like [`PaperExecution::new`], but weights are loaded from and saved
    /// to `path`. A missing file starts an empty portfolio.
    pub fn with_state_file(capital: f64, path: PathBuf) -> Result<Self, CbrotorError> {
        let mut execution = PaperExecution::new(capital);
        execution.state_path = Some(path);
        execution.load_state()?;
        Ok(execution)
    }

    fn load_state(&mut self) -> Result<(), CbrotorError> {
        let Some(path) = self.state_path.clone() else {
            return Ok(());
        };
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(());
        }

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| corrupt_state(&path, e.to_string()))?
            .clone();
        let id_col = headers
            .iter()
            .position(|h| h == "order_book_id")
            .ok_or_else(|| corrupt_state(&path, "missing order_book_id column".to_string()))?;
        let weight_col = headers
            .iter()
            .position(|h| h == "weight")
            .ok_or_else(|| corrupt_state(&path, "missing weight column".to_string()))?;

        for record in reader.records() {
            let record = record.map_err(|e| corrupt_state(&path, e.to_string()))?;
            let order_book_id = record
                .get(id_col)
                .ok_or_else(|| corrupt_state(&path, "short record".to_string()))?;
            let weight: f64 = record
                .get(weight_col)
                .ok_or_else(|| corrupt_state(&path, "short record".to_string()))?
                .parse()
                .map_err(|e| {
                    corrupt_state(&path, format!("bad weight for {}: {}", order_book_id, e))
                })?;
            if weight > WEIGHT_EPSILON {
                self.weights.insert(order_book_id.to_string(), weight);
            }
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), CbrotorError> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| corrupt_state(path, format!("cannot write: {}", e)))?;
        writer
            .write_record(["order_book_id", "weight"])
            .map_err(|e| corrupt_state(path, format!("cannot write: {}", e)))?;
        for (order_book_id, weight) in &self.weights {
            let record = [order_book_id.clone(), weight.to_string()];
            writer
                .write_record(&record)
                .map_err(|e| corrupt_state(path, format!("cannot write: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| corrupt_state(path, format!("cannot write: {}", e)))?;
        Ok(())
    }
}

fn corrupt_state(path: &Path, detail: String) -> CbrotorError {
    CbrotorError::Io(std::io::Error::other(format!(
        "state file {}: {}",
        path.display(),
        detail
    )))
}

impl ExecutionPort for PaperExecution {
    fn holdings(&self) -> Result<BTreeSet<String>, CbrotorError> {
        Ok(self.weights.keys().cloned().collect())
    }

    fn begin_cycle(&mut self, date: NaiveDate, metrics: &MetricsTable) {
        // Fills are stamped at the session close.
        self.cycle_time = date.and_hms_opt(15, 0, 0);
        self.prices = metrics
            .rows()
            .iter()
            .filter_map(|row| row.bond_price.map(|p| (row.order_book_id.clone(), p)))
            .collect();
    }

    fn set_target_weight(
        &mut self,
        order_book_id: &str,
        weight: f64,
    ) -> Result<Option<FillReport>, CbrotorError> {
        let created_at = self.cycle_time.ok_or_else(|| CbrotorError::Execution {
            order_book_id: order_book_id.to_string(),
            reason: "no cycle in progress".to_string(),
        })?;

        let current = self.weights.get(order_book_id).copied().unwrap_or(0.0);
        let delta = weight - current;
        if delta.abs() < WEIGHT_EPSILON {
            return Ok(None);
        }

        let side = if delta > 0.0 { Side::Buy } else { Side::Sell };
        let effect = if delta > 0.0 {
            PositionEffect::Open
        } else {
            PositionEffect::Close
        };

        let Some(price) = self.prices.get(order_book_id).copied() else {
            // No bar to price against: reject rather than silently drop.
            log::warn!("no bond price for {order_book_id}, rejecting order");
            return Ok(Some(FillReport {
                order_book_id: order_book_id.to_string(),
                side,
                effect,
                status: FillStatus::Rejected,
                avg_price: 0.0,
                filled_quantity: 0,
                created_at,
            }));
        };

        let filled_quantity = (delta.abs() * self.capital / price).floor() as i64;
        if filled_quantity == 0 {
            return Ok(None);
        }

        if weight < WEIGHT_EPSILON {
            self.weights.remove(order_book_id);
        } else {
            self.weights.insert(order_book_id.to_string(), weight);
        }
        self.persist()?;

        Ok(Some(FillReport {
            order_book_id: order_book_id.to_string(),
            side,
            effect,
            status: FillStatus::Filled,
            avg_price: price,
            filled_quantity,
            created_at,
        }))
    }
}
