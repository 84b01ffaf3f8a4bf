//! Live market data source port trait.
//!
//! One method per feed capability, each scoped to an explicit key list so a
//! source never has to guess the universe. Transport or auth failure is an
//! error; "the source has no rows for these keys" is not.

use crate::domain::error::CbrotorError;
use crate::domain::feed::{
    CallInfoRow, ConversionInfoRow, ConversionPriceRow, IndicatorRow, InstrumentRow, PriceRow,
    PutInfoRow, SuspensionRow,
};
use chrono::NaiveDate;

pub trait MarketDataPort {
    fn all_instruments(&self, date: NaiveDate) -> Result<Vec<InstrumentRow>, CbrotorError>;

    /// Daily bars for the given keys. Serves both the bond feed (bond ids)
    /// and the underlying feed (stock codes).
    fn price(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<PriceRow>, CbrotorError>;

    fn conversion_price(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<ConversionPriceRow>, CbrotorError>;

    fn conversion_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<ConversionInfoRow>, CbrotorError>;

    /// `Ok(None)` means the source explicitly reported no announcements.
    fn call_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Option<Vec<CallInfoRow>>, CbrotorError>;

    /// `Ok(None)` means the source explicitly reported no announcements.
    fn put_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Option<Vec<PutInfoRow>>, CbrotorError>;

    fn indicators(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, CbrotorError>;

    fn suspension(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<SuspensionRow>, CbrotorError>;
}
