//! Order journal port trait.

use crate::domain::error::CbrotorError;
use crate::domain::order::FillReport;

/// Append-only sink for executed instruction records.
pub trait JournalPort {
    fn append(&mut self, fill: &FillReport) -> Result<(), CbrotorError>;
}
