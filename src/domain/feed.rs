//! Feed identities and typed per-feed row schemas.
//!
//! Every feed the pipeline touches has an explicit row struct with named,
//! typed fields, decoded from header-driven CSV cells at the cache/source
//! boundary. Unreadable numeric cells and non-finite values decode to `None`
//! rather than failing the row.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The nine feeds assembled into the per-date metrics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feed {
    AllInstruments,
    BondPrice,
    StockPrice,
    ConversionPrice,
    ConversionInfo,
    CallInfo,
    PutInfo,
    Indicators,
    Suspended,
}

impl Feed {
    pub const ALL: [Feed; 9] = [
        Feed::AllInstruments,
        Feed::BondPrice,
        Feed::StockPrice,
        Feed::ConversionPrice,
        Feed::ConversionInfo,
        Feed::CallInfo,
        Feed::PutInfo,
        Feed::Indicators,
        Feed::Suspended,
    ];

    /// Stable token used in config values and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Feed::AllInstruments => "all_instruments",
            Feed::BondPrice => "bond_price",
            Feed::StockPrice => "stock_price",
            Feed::ConversionPrice => "conversion_price",
            Feed::ConversionInfo => "conversion_info",
            Feed::CallInfo => "call_info",
            Feed::PutInfo => "put_info",
            Feed::Indicators => "indicators",
            Feed::Suspended => "suspended",
        }
    }

    /// File name inside a per-date cache directory. The layout is a stable
    /// on-disk interface; do not rename.
    pub fn file_name(&self) -> &'static str {
        match self {
            Feed::AllInstruments => "all_instruments.csv",
            Feed::BondPrice => "bond_price.csv",
            Feed::StockPrice => "stock_price.csv",
            Feed::ConversionPrice => "conversion_price.csv",
            Feed::ConversionInfo => "conversion_info.csv",
            Feed::CallInfo => "call_info.csv",
            Feed::PutInfo => "put_info.csv",
            Feed::Indicators => "indicators.csv",
            Feed::Suspended => "suspended.csv",
        }
    }

    pub fn from_name(name: &str) -> Option<Feed> {
        Feed::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header-driven CSV mapping for one feed's row type.
pub trait FeedRecord: Sized {
    /// Fixed columns every table of this type carries.
    fn base_columns() -> &'static [&'static str];

    /// Columns for a concrete set of rows. Record types with dynamic value
    /// columns override this; everything else uses the fixed set.
    fn table_columns(rows: &[Self]) -> Vec<String> {
        let _ = rows;
        Self::base_columns().iter().map(|c| c.to_string()).collect()
    }

    /// Decode one row against the file header. `None` means the row cannot
    /// be represented (key column absent or empty).
    fn decode(columns: &[String], cells: &[String]) -> Option<Self>;

    /// Encode one row in the given column order.
    fn encode(&self, columns: &[String]) -> Vec<String>;
}

fn field<'a>(columns: &[String], cells: &'a [String], name: &str) -> Option<&'a str> {
    let idx = columns.iter().position(|c| c == name)?;
    cells.get(idx).map(|s| s.as_str())
}

fn parse_f64(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

fn parse_date(cell: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell.trim(), "%Y-%m-%d").ok()
}

fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

fn key_field(columns: &[String], cells: &[String], name: &str) -> Option<String> {
    let value = field(columns, cells, name)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn fmt_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn fmt_f64(value: &Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One instrument in the convertible universe.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentRow {
    pub order_book_id: String,
    pub symbol: String,
    pub stock_code: String,
    pub listed_date: Option<NaiveDate>,
    pub de_listed_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
}

impl FeedRecord for InstrumentRow {
    fn base_columns() -> &'static [&'static str] {
        &[
            "order_book_id",
            "symbol",
            "stock_code",
            "listed_date",
            "de_listed_date",
            "maturity_date",
        ]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(InstrumentRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            symbol: field(columns, cells, "symbol")?.to_string(),
            stock_code: field(columns, cells, "stock_code")?.to_string(),
            listed_date: field(columns, cells, "listed_date").and_then(parse_date),
            de_listed_date: field(columns, cells, "de_listed_date").and_then(parse_date),
            maturity_date: field(columns, cells, "maturity_date").and_then(parse_date),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "symbol" => self.symbol.clone(),
                "stock_code" => self.stock_code.clone(),
                "listed_date" => fmt_date(&self.listed_date),
                "de_listed_date" => fmt_date(&self.de_listed_date),
                "maturity_date" => fmt_date(&self.maturity_date),
                _ => String::new(),
            })
            .collect()
    }
}

/// One daily bar. Used for both the bond feed (keyed by bond id) and the
/// underlying feed (keyed by stock code).
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub order_book_id: String,
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl FeedRecord for PriceRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "date", "open", "high", "low", "close", "volume"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(PriceRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            date: field(columns, cells, "date").and_then(parse_date),
            open: field(columns, cells, "open").and_then(parse_f64),
            high: field(columns, cells, "high").and_then(parse_f64),
            low: field(columns, cells, "low").and_then(parse_f64),
            close: field(columns, cells, "close").and_then(parse_f64),
            volume: field(columns, cells, "volume").and_then(parse_f64),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "date" => fmt_date(&self.date),
                "open" => fmt_f64(&self.open),
                "high" => fmt_f64(&self.high),
                "low" => fmt_f64(&self.low),
                "close" => fmt_f64(&self.close),
                "volume" => fmt_f64(&self.volume),
                _ => String::new(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPriceRow {
    pub order_book_id: String,
    pub effective_date: Option<NaiveDate>,
    pub conversion_price: Option<f64>,
}

impl FeedRecord for ConversionPriceRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "effective_date", "conversion_price"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(ConversionPriceRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            effective_date: field(columns, cells, "effective_date").and_then(parse_date),
            conversion_price: field(columns, cells, "conversion_price").and_then(parse_f64),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "effective_date" => fmt_date(&self.effective_date),
                "conversion_price" => fmt_f64(&self.conversion_price),
                _ => String::new(),
            })
            .collect()
    }
}

/// Conversion terms feed. Fetched and cached but never merged; usually
/// suppressed outright via `treat_as_empty`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionInfoRow {
    pub order_book_id: String,
    pub effective_date: Option<NaiveDate>,
    pub conversion_price: Option<f64>,
}

impl FeedRecord for ConversionInfoRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "effective_date", "conversion_price"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(ConversionInfoRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            effective_date: field(columns, cells, "effective_date").and_then(parse_date),
            conversion_price: field(columns, cells, "conversion_price").and_then(parse_f64),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "effective_date" => fmt_date(&self.effective_date),
                "conversion_price" => fmt_f64(&self.conversion_price),
                _ => String::new(),
            })
            .collect()
    }
}

/// A forced-redemption announcement for one bond.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfoRow {
    pub order_book_id: String,
    pub info_date: Option<NaiveDate>,
}

impl FeedRecord for CallInfoRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "info_date"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(CallInfoRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            info_date: field(columns, cells, "info_date").and_then(parse_date),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "info_date" => fmt_date(&self.info_date),
                _ => String::new(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutInfoRow {
    pub order_book_id: String,
    pub info_date: Option<NaiveDate>,
}

impl FeedRecord for PutInfoRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "info_date"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(PutInfoRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            info_date: field(columns, cells, "info_date").and_then(parse_date),
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "info_date" => fmt_date(&self.info_date),
                _ => String::new(),
            })
            .collect()
    }
}

/// Per-bond valuation indicators. The value columns are vendor-defined and
/// vary between dates, so the schema is open: fixed key columns plus a
/// name-to-value map for everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub order_book_id: String,
    pub date: Option<NaiveDate>,
    pub values: BTreeMap<String, f64>,
}

impl FeedRecord for IndicatorRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "date"]
    }

    fn table_columns(rows: &[Self]) -> Vec<String> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for row in rows {
            names.extend(row.values.keys().map(|k| k.as_str()));
        }
        let mut columns: Vec<String> =
            Self::base_columns().iter().map(|c| c.to_string()).collect();
        columns.extend(names.into_iter().map(|n| n.to_string()));
        columns
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        let order_book_id = key_field(columns, cells, "order_book_id")?;
        let date = field(columns, cells, "date").and_then(parse_date);
        let mut values = BTreeMap::new();
        for (column, cell) in columns.iter().zip(cells.iter()) {
            if Self::base_columns().contains(&column.as_str()) {
                continue;
            }
            // A serialized row index is never a value column.
            if column.is_empty() || column == "Unnamed: 0" {
                continue;
            }
            if let Some(v) = parse_f64(cell) {
                values.insert(column.clone(), v);
            }
        }
        Some(IndicatorRow {
            order_book_id,
            date,
            values,
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "date" => fmt_date(&self.date),
                name => self
                    .values
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Trading-halt flag for one bond on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspensionRow {
    pub order_book_id: String,
    pub date: Option<NaiveDate>,
    pub suspended: bool,
}

impl FeedRecord for SuspensionRow {
    fn base_columns() -> &'static [&'static str] {
        &["order_book_id", "date", "suspended"]
    }

    fn decode(columns: &[String], cells: &[String]) -> Option<Self> {
        Some(SuspensionRow {
            order_book_id: key_field(columns, cells, "order_book_id")?,
            date: field(columns, cells, "date").and_then(parse_date),
            suspended: field(columns, cells, "suspended").and_then(parse_flag)?,
        })
    }

    fn encode(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| match c.as_str() {
                "order_book_id" => self.order_book_id.clone(),
                "date" => fmt_date(&self.date),
                "suspended" => self.suspended.to_string(),
                _ => String::new(),
            })
            .collect()
    }
}
