//! Portfolio/execution collaborator port trait.

use crate::domain::error::CbrotorError;
use crate::domain::metrics::MetricsTable;
use crate::domain::order::FillReport;
use chrono::NaiveDate;
use std::collections::BTreeSet;

pub trait ExecutionPort {
    /// Instrument keys currently held at non-zero weight.
    fn holdings(&self) -> Result<BTreeSet<String>, CbrotorError>;

    /// Called once per cycle before any instruction, with the day's metrics.
    /// Default implementation: collaborators that price orders elsewhere
    /// ignore it.
    fn begin_cycle(&mut self, date: NaiveDate, metrics: &MetricsTable) {
        let _ = (date, metrics);
    }

    /// Move one instrument to a target portfolio weight. `Ok(None)` means
    /// the target required no order.
    fn set_target_weight(
        &mut self,
        order_book_id: &str,
        weight: f64,
    ) -> Result<Option<FillReport>, CbrotorError>;
}
