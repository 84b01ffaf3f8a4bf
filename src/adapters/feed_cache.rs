//! Per-date, per-feed on-disk CSV cache.
//!
//! Layout: one directory per trading date under the cache root, one file per
//! feed inside it. A malformed or empty file is recovered as an empty table
//! and never surfaces as an error; only real I/O failures do.

use crate::domain::error::CbrotorError;
use crate::domain::feed::{Feed, FeedRecord};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FeedCache {
    root: PathBuf,
}

impl FeedCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    fn feed_path(&self, date: NaiveDate, feed: Feed) -> PathBuf {
        self.date_dir(date).join(feed.file_name())
    }

    /// Read a cached feed table. `Ok(None)` means there is no cache entry and
    /// the caller must fetch live. A present entry always yields rows, empty
    /// if the file cannot be decoded as this feed's table.
    pub fn read<T: FeedRecord>(
        &self,
        date: NaiveDate,
        feed: Feed,
    ) -> Result<Option<Vec<T>>, CbrotorError> {
        let path = self.feed_path(date, feed);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(cache_error(
                    feed,
                    date,
                    format!("failed to read {}: {}", path.display(), e),
                ));
            }
        };

        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                log::warn!("{date}: cache file for {feed} is not text, using empty table");
                return Ok(Some(Vec::new()));
            }
        };
        if content.trim().is_empty() {
            log::warn!("{date}: cache file for {feed} is empty, using empty table");
            return Ok(Some(Vec::new()));
        }

        let Some((mut columns, mut rows)) = read_table(&content) else {
            log::warn!("{date}: cache file for {feed} is malformed, using empty table");
            return Ok(Some(Vec::new()));
        };

        // A leading unnamed column is the row index an earlier writer
        // serialized by accident. Strip it and normalize the file on disk so
        // it never accumulates.
        if has_stray_index_column(&columns) {
            log::warn!("{date}: stripping stray index column from {feed} cache");
            columns.remove(0);
            for row in &mut rows {
                if !row.is_empty() {
                    row.remove(0);
                }
            }
            write_table(&path, &columns, &rows).map_err(|e| {
                cache_error(
                    feed,
                    date,
                    format!("failed to rewrite {}: {}", path.display(), e),
                )
            })?;
        }

        let mut decoded = Vec::with_capacity(rows.len());
        for cells in &rows {
            match T::decode(&columns, cells) {
                Some(row) => decoded.push(row),
                None => {
                    log::warn!("{date}: undecodable row in {feed} cache, using empty table");
                    return Ok(Some(Vec::new()));
                }
            }
        }
        Ok(Some(decoded))
    }

    /// Persist a feed table, overwriting any previous entry for the date.
    /// Empty tables round-trip as header-only files.
    pub fn write<T: FeedRecord>(
        &self,
        date: NaiveDate,
        feed: Feed,
        rows: &[T],
    ) -> Result<(), CbrotorError> {
        let dir = self.date_dir(date);
        fs::create_dir_all(&dir).map_err(|e| {
            cache_error(feed, date, format!("failed to create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(feed.file_name());
        let columns = T::table_columns(rows);
        let encoded: Vec<Vec<String>> = rows.iter().map(|r| r.encode(&columns)).collect();
        write_table(&path, &columns, &encoded).map_err(|e| {
            cache_error(feed, date, format!("failed to write {}: {}", path.display(), e))
        })
    }
}

fn cache_error(feed: Feed, date: NaiveDate, reason: String) -> CbrotorError {
    CbrotorError::Cache {
        feed: feed.name().to_string(),
        date: date.format("%Y-%m-%d").to_string(),
        reason,
    }
}

fn read_table(content: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let columns: Vec<String> = reader.headers().ok()?.iter().map(String::from).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        rows.push(record.iter().map(String::from).collect());
    }
    Some((columns, rows))
}

fn has_stray_index_column(columns: &[String]) -> bool {
    matches!(
        columns.first().map(String::as_str),
        Some("") | Some("Unnamed: 0")
    )
}

fn write_table(path: &Path, columns: &[String], rows: &[Vec<String>]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
