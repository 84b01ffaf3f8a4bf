//! Cycle data seam: assemble the merged metrics table for one trading date.

use crate::domain::error::CbrotorError;
use crate::domain::metrics::MetricsTable;
use chrono::NaiveDate;

pub trait FetchPort {
    fn fetch(&self, date: NaiveDate) -> Result<MetricsTable, CbrotorError>;
}
