//! Vendor dump market data source.
//!
//! Reads a directory of per-date CSV dumps laid out exactly like the feed
//! cache: one directory per trading date, one file per feed. Unlike the
//! cache, a missing or unreadable file here is a hard failure; a dump either
//! has the day or it does not. Decoding is header-driven, so extra vendor
//! columns (including a leading pandas index column) are ignored.

use crate::domain::error::CbrotorError;
use crate::domain::feed::{
    CallInfoRow, ConversionInfoRow, ConversionPriceRow, Feed, FeedRecord, IndicatorRow,
    InstrumentRow, PriceRow, PutInfoRow, SuspensionRow,
};
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvSource {
    data_dir: PathBuf,
}

impl CsvSource {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn feed_path(&self, date: NaiveDate, feed: Feed) -> PathBuf {
        self.data_dir
            .join(date.format("%Y-%m-%d").to_string())
            .join(feed.file_name())
    }

    fn read_feed<T: FeedRecord>(
        &self,
        date: NaiveDate,
        feed: Feed,
    ) -> Result<Vec<T>, CbrotorError> {
        let path = self.feed_path(date, feed);
        let content = fs::read_to_string(&path).map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                format!("no dump file at {}", path.display())
            } else {
                format!("failed to read {}: {}", path.display(), e)
            };
            feed_error(feed, date, reason)
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| {
                feed_error(feed, date, format!("bad header in {}: {}", path.display(), e))
            })?
            .iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                feed_error(feed, date, format!("parse error in {}: {}", path.display(), e))
            })?;
            let cells: Vec<String> = record.iter().map(String::from).collect();
            let row = T::decode(&columns, &cells).ok_or_else(|| {
                // Header line is line 1.
                feed_error(
                    feed,
                    date,
                    format!("undecodable row at line {} in {}", index + 2, path.display()),
                )
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

fn feed_error(feed: Feed, date: NaiveDate, reason: String) -> CbrotorError {
    CbrotorError::FeedUnavailable {
        feed: feed.name().to_string(),
        date: date.format("%Y-%m-%d").to_string(),
        reason,
    }
}

fn scoped<T, F>(rows: Vec<T>, order_book_ids: &[String], key_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let wanted: HashSet<&str> = order_book_ids.iter().map(String::as_str).collect();
    rows.into_iter()
        .filter(|row| wanted.contains(key_of(row)))
        .collect()
}

impl MarketDataPort for CsvSource {
    fn all_instruments(&self, date: NaiveDate) -> Result<Vec<InstrumentRow>, CbrotorError> {
        self.read_feed(date, Feed::AllInstruments)
    }

    /// A dump splits bars across the bond and underlying files; the key list
    /// decides which half the caller gets.
    fn price(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<PriceRow>, CbrotorError> {
        let mut rows: Vec<PriceRow> = self.read_feed(date, Feed::BondPrice)?;
        rows.extend(self.read_feed::<PriceRow>(date, Feed::StockPrice)?);
        Ok(scoped(rows, order_book_ids, |r| r.order_book_id.as_str()))
    }

    fn conversion_price(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<ConversionPriceRow>, CbrotorError> {
        let rows = self.read_feed(date, Feed::ConversionPrice)?;
        Ok(scoped(rows, order_book_ids, |r| r.order_book_id.as_str()))
    }

    fn conversion_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<ConversionInfoRow>, CbrotorError> {
        let rows = self.read_feed(date, Feed::ConversionInfo)?;
        Ok(scoped(rows, order_book_ids, |r| r.order_book_id.as_str()))
    }

    fn call_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Option<Vec<CallInfoRow>>, CbrotorError> {
        let rows: Vec<CallInfoRow> = self.read_feed(date, Feed::CallInfo)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(scoped(rows, order_book_ids, |r| {
            r.order_book_id.as_str()
        })))
    }

    fn put_info(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Option<Vec<PutInfoRow>>, CbrotorError> {
        let rows: Vec<PutInfoRow> = self.read_feed(date, Feed::PutInfo)?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(scoped(rows, order_book_ids, |r| {
            r.order_book_id.as_str()
        })))
    }

    fn indicators(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, CbrotorError> {
        let rows = self.read_feed(date, Feed::Indicators)?;
        Ok(scoped(rows, order_book_ids, |r| r.order_book_id.as_str()))
    }

    fn suspension(
        &self,
        order_book_ids: &[String],
        date: NaiveDate,
    ) -> Result<Vec<SuspensionRow>, CbrotorError> {
        let rows = self.read_feed(date, Feed::Suspended)?;
        Ok(scoped(rows, order_book_ids, |r| r.order_book_id.as_str()))
    }
}
