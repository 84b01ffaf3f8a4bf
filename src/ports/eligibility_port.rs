//! Universe eligibility filter port trait.

use crate::domain::error::CbrotorError;
use crate::domain::metrics::MetricsTable;
use chrono::NaiveDate;

pub trait EligibilityPort {
    /// Reduce the merged universe to the instruments tradable on `date`.
    fn filter(&self, date: NaiveDate, metrics: &MetricsTable)
    -> Result<MetricsTable, CbrotorError>;
}
