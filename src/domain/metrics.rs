//! Per-date instrument metrics table and the feed merge.

use crate::domain::feed::{
    CallInfoRow, ConversionPriceRow, IndicatorRow, InstrumentRow, PriceRow, SuspensionRow,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// One instrument's merged attribute set for a single trading date.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentMetrics {
    pub order_book_id: String,
    pub symbol: String,
    pub stock_code: String,
    pub listed_date: Option<NaiveDate>,
    pub de_listed_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub stock_price: Option<f64>,
    pub bond_price: Option<f64>,
    pub conversion_price: Option<f64>,
    pub call_info_date: Option<NaiveDate>,
    pub suspended: Option<bool>,
    pub indicators: BTreeMap<String, f64>,
}

impl InstrumentMetrics {
    /// Resolve a factor name against the price columns, then the indicator
    /// map. `None` means the instrument has no value for that factor.
    pub fn factor_value(&self, name: &str) -> Option<f64> {
        match name {
            "bond_price" => self.bond_price,
            "stock_price" => self.stock_price,
            "conversion_price" => self.conversion_price,
            _ => self.indicators.get(name).copied(),
        }
    }
}

/// Instrument-indexed metrics for one trading date.
///
/// Row order follows the universe feed and is the stable tie-break for
/// selection. The table is read-only once built; subsets are new tables.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    date: NaiveDate,
    rows: Vec<InstrumentMetrics>,
    index: HashMap<String, usize>,
}

impl MetricsTable {
    /// Build a table, deduplicating by instrument key. A repeated key keeps
    /// its first position and the last-observed row content.
    pub fn new(date: NaiveDate, rows: Vec<InstrumentMetrics>) -> Self {
        let mut deduped: Vec<InstrumentMetrics> = Vec::with_capacity(rows.len());
        let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
        for row in rows {
            match index.get(&row.order_book_id) {
                Some(&i) => deduped[i] = row,
                None => {
                    index.insert(row.order_book_id.clone(), deduped.len());
                    deduped.push(row);
                }
            }
        }
        Self {
            date,
            rows: deduped,
            index,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[InstrumentMetrics] {
        &self.rows
    }

    pub fn get(&self, order_book_id: &str) -> Option<&InstrumentMetrics> {
        self.index.get(order_book_id).map(|&i| &self.rows[i])
    }

    pub fn contains(&self, order_book_id: &str) -> bool {
        self.index.contains_key(order_book_id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.order_book_id.as_str())
    }

    /// New table holding only the rows the predicate keeps, in order.
    pub fn filtered<F>(&self, keep: F) -> MetricsTable
    where
        F: Fn(&InstrumentMetrics) -> bool,
    {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        MetricsTable::new(self.date, rows)
    }
}

/// Join the fetched feed tables into one metrics table, keyed by instrument.
///
/// All joins are left joins against the universe, each feed reduced to one
/// observation per key first (last observation wins; conversion price takes
/// the per-key minimum instead). The underlying price feed joins through the
/// instrument's `stock_code`. The result has exactly one row per universe
/// instrument regardless of what the other feeds contain.
pub fn merge(
    date: NaiveDate,
    universe: &[InstrumentRow],
    conversion_price: &[ConversionPriceRow],
    bond_price: &[PriceRow],
    stock_price: &[PriceRow],
    call_info: &[CallInfoRow],
    indicators: &[IndicatorRow],
    suspended: &[SuspensionRow],
) -> MetricsTable {
    let mut stock_close: HashMap<&str, Option<f64>> = HashMap::new();
    for row in stock_price {
        stock_close.insert(&row.order_book_id, row.close);
    }

    let mut bond_close: HashMap<&str, Option<f64>> = HashMap::new();
    for row in bond_price {
        bond_close.insert(&row.order_book_id, row.close);
    }

    let mut conversion_min: HashMap<&str, f64> = HashMap::new();
    for row in conversion_price {
        if let Some(price) = row.conversion_price {
            conversion_min
                .entry(&row.order_book_id)
                .and_modify(|m| *m = m.min(price))
                .or_insert(price);
        }
    }

    let mut call_date: HashMap<&str, Option<NaiveDate>> = HashMap::new();
    for row in call_info {
        call_date.insert(&row.order_book_id, row.info_date);
    }

    let mut indicator_values: HashMap<&str, &BTreeMap<String, f64>> = HashMap::new();
    for row in indicators {
        indicator_values.insert(&row.order_book_id, &row.values);
    }

    let mut suspension: HashMap<&str, bool> = HashMap::new();
    for row in suspended {
        suspension.insert(&row.order_book_id, row.suspended);
    }

    let rows = universe
        .iter()
        .map(|inst| InstrumentMetrics {
            order_book_id: inst.order_book_id.clone(),
            symbol: inst.symbol.clone(),
            stock_code: inst.stock_code.clone(),
            listed_date: inst.listed_date,
            de_listed_date: inst.de_listed_date,
            maturity_date: inst.maturity_date,
            stock_price: stock_close
                .get(inst.stock_code.as_str())
                .copied()
                .flatten(),
            bond_price: bond_close
                .get(inst.order_book_id.as_str())
                .copied()
                .flatten(),
            conversion_price: conversion_min.get(inst.order_book_id.as_str()).copied(),
            call_info_date: call_date
                .get(inst.order_book_id.as_str())
                .copied()
                .flatten(),
            suspended: suspension.get(inst.order_book_id.as_str()).copied(),
            indicators: indicator_values
                .get(inst.order_book_id.as_str())
                .map(|v| (*v).clone())
                .unwrap_or_default(),
        })
        .collect();

    MetricsTable::new(date, rows)
}
