#![allow(dead_code)]

use cbrotor::domain::error::CbrotorError;
use cbrotor::domain::factor::FactorConfig;
use cbrotor::domain::feed::{
    CallInfoRow, ConversionInfoRow, ConversionPriceRow, IndicatorRow, InstrumentRow, PriceRow,
    PutInfoRow, SuspensionRow,
};
use cbrotor::domain::metrics::MetricsTable;
use cbrotor::domain::order::{FillReport, FillStatus, PositionEffect, Side};
use cbrotor::ports::execution_port::ExecutionPort;
use cbrotor::ports::journal_port::JournalPort;
use cbrotor::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::rc::Rc;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The trading date every mock feed reports.
pub fn trading_day() -> NaiveDate {
    date(2023, 4, 14)
}

pub fn make_instrument(order_book_id: &str, stock_code: &str) -> InstrumentRow {
    InstrumentRow {
        order_book_id: order_book_id.to_string(),
        symbol: format!("sym-{order_book_id}"),
        stock_code: stock_code.to_string(),
        listed_date: Some(date(2020, 1, 1)),
        de_listed_date: None,
        maturity_date: Some(date(2030, 1, 1)),
    }
}

pub fn make_bar(order_book_id: &str, close: f64) -> PriceRow {
    PriceRow {
        order_book_id: order_book_id.to_string(),
        date: Some(trading_day()),
        open: None,
        high: None,
        low: None,
        close: Some(close),
        volume: Some(10_000.0),
    }
}

/// Scripted in-memory market data source. Bond and stock bars live in one
/// pool and `price` serves whichever half the key list selects, like a real
/// source. Calls are logged through a shared handle so tests can watch live
/// traffic after the source moves into a fetcher.
pub struct MockMarketData {
    pub instruments: Vec<InstrumentRow>,
    pub bars: Vec<PriceRow>,
    pub conversion_prices: Vec<ConversionPriceRow>,
    pub call_info: Option<Vec<CallInfoRow>>,
    pub put_info: Option<Vec<PutInfoRow>>,
    pub indicators: Vec<IndicatorRow>,
    pub suspensions: Vec<SuspensionRow>,
    pub fail_capability: Option<&'static str>,
    pub calls: Rc<RefCell<Vec<&'static str>>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            instruments: Vec::new(),
            bars: Vec::new(),
            conversion_prices: Vec::new(),
            call_info: None,
            put_info: None,
            indicators: Vec::new(),
            suspensions: Vec::new(),
            fail_capability: None,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with_instrument(mut self, order_book_id: &str, stock_code: &str) -> Self {
        self.instruments
            .push(make_instrument(order_book_id, stock_code));
        self
    }

    pub fn with_bar(mut self, order_book_id: &str, close: f64) -> Self {
        self.bars.push(make_bar(order_book_id, close));
        self
    }

    pub fn with_conversion_price(mut self, order_book_id: &str, price: f64) -> Self {
        self.conversion_prices.push(ConversionPriceRow {
            order_book_id: order_book_id.to_string(),
            effective_date: Some(trading_day()),
            conversion_price: Some(price),
        });
        self
    }

    pub fn with_call_announcement(mut self, order_book_id: &str) -> Self {
        self.call_info.get_or_insert_with(Vec::new).push(CallInfoRow {
            order_book_id: order_book_id.to_string(),
            info_date: Some(trading_day()),
        });
        self
    }

    pub fn with_indicator(mut self, order_book_id: &str, name: &str, value: f64) -> Self {
        self.indicators.push(IndicatorRow {
            order_book_id: order_book_id.to_string(),
            date: Some(trading_day()),
            values: BTreeMap::from([(name.to_string(), value)]),
        });
        self
    }

    pub fn with_suspension(mut self, order_book_id: &str) -> Self {
        self.suspensions.push(SuspensionRow {
            order_book_id: order_book_id.to_string(),
            date: Some(trading_day()),
            suspended: true,
        });
        self
    }

    pub fn failing(mut self, capability: &'static str) -> Self {
        self.fail_capability = Some(capability);
        self
    }

    fn record(&self, capability: &'static str) -> Result<(), CbrotorError> {
        self.calls.borrow_mut().push(capability);
        if self.fail_capability == Some(capability) {
            return Err(CbrotorError::FeedUnavailable {
                feed: capability.to_string(),
                date: trading_day().to_string(),
                reason: "mock failure".to_string(),
            });
        }
        Ok(())
    }

    fn scoped<T: Clone>(rows: &[T], order_book_ids: &[String], key_of: fn(&T) -> &str) -> Vec<T> {
        let keys: HashSet<&str> = order_book_ids.iter().map(String::as_str).collect();
        rows.iter()
            .filter(|row| keys.contains(key_of(row)))
            .cloned()
            .collect()
    }
}

impl MarketDataPort for MockMarketData {
    fn all_instruments(&self, _date: NaiveDate) -> Result<Vec<InstrumentRow>, CbrotorError> {
        self.record("all_instruments")?;
        Ok(self.instruments.clone())
    }

    fn price(
        &self,
        order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<PriceRow>, CbrotorError> {
        self.record("price")?;
        Ok(Self::scoped(&self.bars, order_book_ids, |r| {
            r.order_book_id.as_str()
        }))
    }

    fn conversion_price(
        &self,
        order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<ConversionPriceRow>, CbrotorError> {
        self.record("conversion_price")?;
        Ok(Self::scoped(&self.conversion_prices, order_book_ids, |r| {
            r.order_book_id.as_str()
        }))
    }

    fn conversion_info(
        &self,
        _order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<ConversionInfoRow>, CbrotorError> {
        self.record("conversion_info")?;
        Ok(Vec::new())
    }

    fn call_info(
        &self,
        _order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Option<Vec<CallInfoRow>>, CbrotorError> {
        self.record("call_info")?;
        Ok(self.call_info.clone())
    }

    fn put_info(
        &self,
        _order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Option<Vec<PutInfoRow>>, CbrotorError> {
        self.record("put_info")?;
        Ok(self.put_info.clone())
    }

    fn indicators(
        &self,
        order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<IndicatorRow>, CbrotorError> {
        self.record("indicators")?;
        Ok(Self::scoped(&self.indicators, order_book_ids, |r| {
            r.order_book_id.as_str()
        }))
    }

    fn suspension(
        &self,
        order_book_ids: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<SuspensionRow>, CbrotorError> {
        self.record("suspension")?;
        Ok(Self::scoped(&self.suspensions, order_book_ids, |r| {
            r.order_book_id.as_str()
        }))
    }
}

/// Recording execution collaborator. Holdings are whatever the test seeds;
/// instructions are acknowledged and logged without moving anything.
pub struct MockExecution {
    pub held: BTreeSet<String>,
    pub partial_fills: HashSet<String>,
    pub rejections: HashSet<String>,
    pub calls: Vec<(String, f64)>,
    pub cycle_dates: Vec<NaiveDate>,
}

impl MockExecution {
    pub fn new() -> Self {
        Self {
            held: BTreeSet::new(),
            partial_fills: HashSet::new(),
            rejections: HashSet::new(),
            calls: Vec::new(),
            cycle_dates: Vec::new(),
        }
    }

    pub fn holding(mut self, order_book_id: &str) -> Self {
        self.held.insert(order_book_id.to_string());
        self
    }

    pub fn partially_filling(mut self, order_book_id: &str) -> Self {
        self.partial_fills.insert(order_book_id.to_string());
        self
    }

    pub fn rejecting(mut self, order_book_id: &str) -> Self {
        self.rejections.insert(order_book_id.to_string());
        self
    }
}

impl ExecutionPort for MockExecution {
    fn holdings(&self) -> Result<BTreeSet<String>, CbrotorError> {
        Ok(self.held.clone())
    }

    fn begin_cycle(&mut self, date: NaiveDate, _metrics: &MetricsTable) {
        self.cycle_dates.push(date);
    }

    fn set_target_weight(
        &mut self,
        order_book_id: &str,
        weight: f64,
    ) -> Result<Option<FillReport>, CbrotorError> {
        self.calls.push((order_book_id.to_string(), weight));
        let status = if self.rejections.contains(order_book_id) {
            FillStatus::Rejected
        } else if self.partial_fills.contains(order_book_id) {
            FillStatus::PartiallyFilled
        } else {
            FillStatus::Filled
        };
        let closing = weight == 0.0;
        Ok(Some(FillReport {
            order_book_id: order_book_id.to_string(),
            side: if closing { Side::Sell } else { Side::Buy },
            effect: if closing {
                PositionEffect::Close
            } else {
                PositionEffect::Open
            },
            status,
            avg_price: 100.0,
            filled_quantity: match status {
                FillStatus::Rejected => 0,
                FillStatus::PartiallyFilled => 500,
                FillStatus::Filled => 1_000,
            },
            created_at: trading_day().and_hms_opt(15, 0, 0).unwrap(),
        }))
    }
}

/// Journal sink that keeps appended fills in memory.
#[derive(Default)]
pub struct MemoryJournal {
    pub entries: Vec<FillReport>,
}

impl JournalPort for MemoryJournal {
    fn append(&mut self, fill: &FillReport) -> Result<(), CbrotorError> {
        self.entries.push(fill.clone());
        Ok(())
    }
}

pub fn factor_config(weights: &[(&str, f64)], top: usize) -> FactorConfig {
    FactorConfig {
        weights: weights.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
        top,
    }
}
