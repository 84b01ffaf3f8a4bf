//! Cache-or-live assembly of the per-date metrics table.
//!
//! Each feed is served from the on-disk cache when present, otherwise from
//! the live source and written through. Live calls are scoped to the
//! instrument universe resolved at the start of the same invocation, so the
//! source is never asked about keys outside that day's universe.

use crate::adapters::feed_cache::FeedCache;
use crate::domain::error::CbrotorError;
use crate::domain::feed::{
    CallInfoRow, ConversionInfoRow, ConversionPriceRow, Feed, FeedRecord, IndicatorRow,
    InstrumentRow, PriceRow, PutInfoRow, SuspensionRow,
};
use crate::domain::metrics::{MetricsTable, merge};
use crate::ports::fetch_port::FetchPort;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

pub struct CachedFetcher {
    cache: FeedCache,
    source: Box<dyn MarketDataPort>,
    treat_as_empty: HashSet<Feed>,
}

impl CachedFetcher {
    pub fn new(
        cache: FeedCache,
        source: Box<dyn MarketDataPort>,
        treat_as_empty: HashSet<Feed>,
    ) -> Self {
        Self {
            cache,
            source,
            treat_as_empty,
        }
    }

    /// Resolve one feed: suppressed feeds are empty without touching cache or
    /// source, cached tables win over live calls, and live results are
    /// written through before they are used.
    fn load<T, F>(&self, date: NaiveDate, feed: Feed, live: F) -> Result<Vec<T>, CbrotorError>
    where
        T: FeedRecord,
        F: FnOnce() -> Result<Vec<T>, CbrotorError>,
    {
        if self.treat_as_empty.contains(&feed) {
            log::debug!("{date}: {feed} suppressed by config, using empty table");
            return Ok(Vec::new());
        }
        if let Some(rows) = self.cache.read(date, feed)? {
            log::debug!("{date}: {feed} served from cache ({} rows)", rows.len());
            return Ok(rows);
        }
        log::info!("{date}: fetching {feed} from live source");
        let rows = live()?;
        self.cache.write(date, feed, &rows)?;
        Ok(rows)
    }
}

impl FetchPort for CachedFetcher {
    fn fetch(&self, date: NaiveDate) -> Result<MetricsTable, CbrotorError> {
        let universe: Vec<InstrumentRow> = self.load(date, Feed::AllInstruments, || {
            self.source.all_instruments(date)
        })?;

        let bond_keys: Vec<String> = universe.iter().map(|r| r.order_book_id.clone()).collect();
        let mut seen = HashSet::new();
        let stock_keys: Vec<String> = universe
            .iter()
            .map(|r| r.stock_code.clone())
            .filter(|code| !code.is_empty() && seen.insert(code.clone()))
            .collect();

        let bond_price: Vec<PriceRow> = self.load(date, Feed::BondPrice, || {
            self.source.price(&bond_keys, date)
        })?;
        let stock_price: Vec<PriceRow> = self.load(date, Feed::StockPrice, || {
            self.source.price(&stock_keys, date)
        })?;
        let conversion_price: Vec<ConversionPriceRow> =
            self.load(date, Feed::ConversionPrice, || {
                self.source.conversion_price(&bond_keys, date)
            })?;

        // Cached for completeness when not suppressed; the merge never
        // consumes these two feeds.
        self.load::<ConversionInfoRow, _>(date, Feed::ConversionInfo, || {
            self.source.conversion_info(&bond_keys, date)
        })?;

        // `Ok(None)` from the source means no announcements were recorded,
        // which becomes an empty table and is cached like any other result.
        // A source error still aborts the fetch.
        let call_info: Vec<CallInfoRow> = self.load(date, Feed::CallInfo, || {
            Ok(self.source.call_info(&bond_keys, date)?.unwrap_or_default())
        })?;
        self.load::<PutInfoRow, _>(date, Feed::PutInfo, || {
            Ok(self.source.put_info(&bond_keys, date)?.unwrap_or_default())
        })?;

        let indicators: Vec<IndicatorRow> = self.load(date, Feed::Indicators, || {
            self.source.indicators(&bond_keys, date)
        })?;
        let suspended: Vec<SuspensionRow> = self.load(date, Feed::Suspended, || {
            self.source.suspension(&bond_keys, date)
        })?;

        Ok(merge(
            date,
            &universe,
            &conversion_price,
            &bond_price,
            &stock_price,
            &call_info,
            &indicators,
            &suspended,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config_validation::default_treat_as_empty;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, 14).unwrap()
    }

    fn inst(order_book_id: &str, stock_code: &str) -> InstrumentRow {
        InstrumentRow {
            order_book_id: order_book_id.to_string(),
            symbol: format!("sym-{order_book_id}"),
            stock_code: stock_code.to_string(),
            listed_date: NaiveDate::from_ymd_opt(2020, 1, 1),
            de_listed_date: None,
            maturity_date: NaiveDate::from_ymd_opt(2026, 1, 1),
        }
    }

    fn bar(order_book_id: &str, close: f64) -> PriceRow {
        PriceRow {
            order_book_id: order_book_id.to_string(),
            date: Some(day()),
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
        }
    }

    // The fetcher takes ownership of its source, so the call logs are shared
    // `Rc` handles cloned out before the move.
    #[derive(Default)]
    struct ScriptedSource {
        instruments: Vec<InstrumentRow>,
        prices: Vec<PriceRow>,
        conversion_prices: Vec<ConversionPriceRow>,
        call_info: Option<Vec<CallInfoRow>>,
        indicators: Vec<IndicatorRow>,
        suspension: Vec<SuspensionRow>,
        fail_capability: Option<&'static str>,
        calls: Rc<RefCell<Vec<&'static str>>>,
        price_keys: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl ScriptedSource {
        fn record(&self, capability: &'static str) -> Result<(), CbrotorError> {
            self.calls.borrow_mut().push(capability);
            if self.fail_capability == Some(capability) {
                return Err(CbrotorError::FeedUnavailable {
                    feed: capability.to_string(),
                    date: day().to_string(),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }

    impl MarketDataPort for ScriptedSource {
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
            self.price_keys.borrow_mut().push(order_book_ids.to_vec());
            let keys: HashSet<&str> = order_book_ids.iter().map(String::as_str).collect();
            Ok(self
                .prices
                .iter()
                .filter(|r| keys.contains(r.order_book_id.as_str()))
                .cloned()
                .collect())
        }

        fn conversion_price(
            &self,
            _order_book_ids: &[String],
            _date: NaiveDate,
        ) -> Result<Vec<ConversionPriceRow>, CbrotorError> {
            self.record("conversion_price")?;
            Ok(self.conversion_prices.clone())
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
            Ok(None)
        }

        fn indicators(
            &self,
            _order_book_ids: &[String],
            _date: NaiveDate,
        ) -> Result<Vec<IndicatorRow>, CbrotorError> {
            self.record("indicators")?;
            Ok(self.indicators.clone())
        }

        fn suspension(
            &self,
            _order_book_ids: &[String],
            _date: NaiveDate,
        ) -> Result<Vec<SuspensionRow>, CbrotorError> {
            self.record("suspension")?;
            Ok(self.suspension.clone())
        }
    }

    fn sample_source() -> ScriptedSource {
        ScriptedSource {
            instruments: vec![inst("110030.XSHG", "600185.XSHG"), inst("128035.XSHE", "002475.XSHE")],
            prices: vec![
                bar("110030.XSHG", 104.2),
                bar("128035.XSHE", 98.5),
                bar("600185.XSHG", 51.0),
                bar("002475.XSHE", 23.4),
            ],
            conversion_prices: vec![ConversionPriceRow {
                order_book_id: "110030.XSHG".to_string(),
                effective_date: Some(day()),
                conversion_price: Some(7.2),
            }],
            call_info: None,
            indicators: vec![IndicatorRow {
                order_book_id: "110030.XSHG".to_string(),
                date: Some(day()),
                values: BTreeMap::from([("conversion_premium".to_string(), -2.5)]),
            }],
            suspension: vec![SuspensionRow {
                order_book_id: "128035.XSHE".to_string(),
                date: Some(day()),
                suspended: true,
            }],
            ..ScriptedSource::default()
        }
    }

    fn fetcher_over(dir: &TempDir, source: ScriptedSource) -> CachedFetcher {
        CachedFetcher::new(
            FeedCache::new(dir.path().to_path_buf()),
            Box::new(source),
            default_treat_as_empty(),
        )
    }

    #[test]
    fn fetch_merges_every_feed_into_one_row_per_instrument() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher_over(&dir, sample_source());

        let metrics = fetcher.fetch(day()).unwrap();
        assert_eq!(metrics.len(), 2);

        let a = metrics.get("110030.XSHG").unwrap();
        assert_eq!(a.bond_price, Some(104.2));
        assert_eq!(a.stock_price, Some(51.0));
        assert_eq!(a.conversion_price, Some(7.2));
        assert_eq!(a.indicators.get("conversion_premium"), Some(&-2.5));
        assert_eq!(a.suspended, None);

        let b = metrics.get("128035.XSHE").unwrap();
        assert_eq!(b.bond_price, Some(98.5));
        assert_eq!(b.stock_price, Some(23.4));
        assert_eq!(b.suspended, Some(true));
    }

    #[test]
    fn second_fetch_is_served_entirely_from_cache() {
        let dir = TempDir::new().unwrap();
        let source = sample_source();
        let calls = Rc::clone(&source.calls);
        let fetcher = fetcher_over(&dir, source);

        let first = fetcher.fetch(day()).unwrap();
        let calls_after_first = calls.borrow().len();
        assert!(calls_after_first > 0);

        let second = fetcher.fetch(day()).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.borrow().len(), calls_after_first);
    }

    #[test]
    fn live_calls_are_scoped_to_the_resolved_universe() {
        let dir = TempDir::new().unwrap();
        // Two bonds over the same underlying: the stock request deduplicates.
        let mut source = sample_source();
        source.instruments = vec![inst("110030.XSHG", "600185.XSHG"), inst("110045.XSHG", "600185.XSHG")];
        let price_keys = Rc::clone(&source.price_keys);
        let fetcher = fetcher_over(&dir, source);

        fetcher.fetch(day()).unwrap();

        let recorded = price_keys.borrow();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0], vec!["110030.XSHG", "110045.XSHG"]);
        assert_eq!(recorded[1], vec!["600185.XSHG"]);
    }

    #[test]
    fn suppressed_feeds_touch_neither_source_nor_disk() {
        let dir = TempDir::new().unwrap();
        let source = sample_source();
        let calls = Rc::clone(&source.calls);
        let fetcher = fetcher_over(&dir, source);

        fetcher.fetch(day()).unwrap();

        let recorded = calls.borrow();
        assert!(!recorded.contains(&"conversion_info"));
        assert!(!recorded.contains(&"put_info"));

        let date_dir = dir.path().join("2023-04-14");
        assert!(!date_dir.join("conversion_info.csv").exists());
        assert!(!date_dir.join("put_info.csv").exists());
        assert!(date_dir.join("bond_price.csv").exists());
    }

    #[test]
    fn call_info_without_announcements_caches_an_empty_table() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher_over(&dir, sample_source());

        let metrics = fetcher.fetch(day()).unwrap();
        assert!(metrics.rows().iter().all(|r| r.call_info_date.is_none()));

        let cached = fs::read_to_string(dir.path().join("2023-04-14").join("call_info.csv")).unwrap();
        assert_eq!(cached, "order_book_id,info_date\n");
    }

    #[test]
    fn zero_length_cached_feed_skips_its_live_call() {
        let dir = TempDir::new().unwrap();
        let date_dir = dir.path().join("2023-04-14");
        fs::create_dir_all(&date_dir).unwrap();
        fs::write(date_dir.join("bond_price.csv"), "").unwrap();

        let source = sample_source();
        let calls = Rc::clone(&source.calls);
        let fetcher = fetcher_over(&dir, source);

        let metrics = fetcher.fetch(day()).unwrap();
        // Recovered as empty: every bond price is null, no error raised.
        assert_eq!(metrics.len(), 2);
        assert!(metrics.rows().iter().all(|r| r.bond_price.is_none()));
        assert!(metrics.rows().iter().any(|r| r.stock_price.is_some()));

        // Only the stock leg of the price capability went live.
        assert_eq!(calls.borrow().iter().filter(|c| **c == "price").count(), 1);
    }

    #[test]
    fn live_failure_aborts_the_fetch() {
        let dir = TempDir::new().unwrap();
        let mut source = sample_source();
        source.fail_capability = Some("indicators");
        let fetcher = fetcher_over(&dir, source);

        let err = fetcher.fetch(day()).unwrap_err();
        assert!(matches!(err, CbrotorError::FeedUnavailable { feed, .. } if feed == "indicators"));
    }
}
