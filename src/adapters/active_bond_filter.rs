//! Tradability filter over the merged metrics table.
//!
//! An instrument survives when it is listed and not delisted on the cycle
//! date, has both a bond and an underlying bar, has no forced-redemption
//! announcement, is not suspended, and has at least the configured number of
//! days left to maturity. Unknown dates never exclude a row.

use crate::domain::error::CbrotorError;
use crate::domain::metrics::{InstrumentMetrics, MetricsTable};
use crate::ports::eligibility_port::EligibilityPort;
use chrono::NaiveDate;

pub struct ActiveBondFilter {
    min_days_to_maturity: i64,
}

impl ActiveBondFilter {
    pub fn new(min_days_to_maturity: i64) -> Self {
        Self {
            min_days_to_maturity,
        }
    }

    fn exclusion(&self, date: NaiveDate, row: &InstrumentMetrics) -> Option<&'static str> {
        if row.suspended == Some(true) {
            return Some("suspended");
        }
        if row.bond_price.is_none() {
            return Some("no bond price");
        }
        if row.stock_price.is_none() {
            return Some("no underlying price");
        }
        if row.call_info_date.is_some() {
            return Some("forced redemption announced");
        }
        if row.listed_date.is_some_and(|listed| listed > date) {
            return Some("not yet listed");
        }
        if row.de_listed_date.is_some_and(|delisted| delisted <= date) {
            return Some("delisted");
        }
        if row
            .maturity_date
            .is_some_and(|maturity| (maturity - date).num_days() < self.min_days_to_maturity)
        {
            return Some("too close to maturity");
        }
        None
    }
}

impl EligibilityPort for ActiveBondFilter {
    fn filter(
        &self,
        date: NaiveDate,
        metrics: &MetricsTable,
    ) -> Result<MetricsTable, CbrotorError> {
        Ok(metrics.filtered(|row| match self.exclusion(date, row) {
            Some(reason) => {
                log::debug!("{date}: excluding {}: {reason}", row.order_book_id);
                false
            }
            None => true,
        }))
    }
}
