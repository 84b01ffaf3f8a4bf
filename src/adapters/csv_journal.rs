//! Append-only CSV order journal.
//!
//! The column set and encodings are a stable interface consumed by
//! downstream order loaders: `side` is 1 for buy and 2 for sell,
//! `positionEffect` is 1 for open and 2 for close, and `symbol` carries the
//! counter-style exchange prefix. Reruns append; nothing is ever rewritten.

use crate::domain::error::CbrotorError;
use crate::domain::order::{FillReport, PositionEffect, Side};
use crate::ports::journal_port::JournalPort;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

const HEADER: [&str; 6] = ["symbol", "side", "positionEffect", "price", "volume", "createdAt"];

#[derive(Debug)]
pub struct CsvJournal {
    writer: csv::Writer<fs::File>,
}

impl CsvJournal {
    /// Open (or create) the journal at `path`, writing the header only when
    /// the file does not already have one.
    pub fn new(path: &Path) -> Result<Self, CbrotorError> {
        let needs_header = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                return Err(journal_error(format!(
                    "failed to stat {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| journal_error(format!("failed to open {}: {}", path.display(), e)))?;
        let mut writer = csv::Writer::from_writer(file);

        if needs_header {
            writer
                .write_record(HEADER)
                .map_err(|e| journal_error(format!("failed to write header: {}", e)))?;
            writer
                .flush()
                .map_err(|e| journal_error(format!("failed to write header: {}", e)))?;
        }
        Ok(Self { writer })
    }
}

/// Shenzhen listings map to `SZSE.`, everything else to `SHSE.`.
fn journal_symbol(order_book_id: &str) -> String {
    let code: String = order_book_id.chars().take(6).collect();
    if order_book_id.ends_with("XSHE") {
        format!("SZSE.{code}")
    } else {
        format!("SHSE.{code}")
    }
}

fn journal_error(reason: String) -> CbrotorError {
    CbrotorError::Journal { reason }
}

impl JournalPort for CsvJournal {
    fn append(&mut self, fill: &FillReport) -> Result<(), CbrotorError> {
        let side = match fill.side {
            Side::Buy => "1",
            Side::Sell => "2",
        };
        let effect = match fill.effect {
            PositionEffect::Open => "1",
            PositionEffect::Close => "2",
        };
        let record = [
            journal_symbol(&fill.order_book_id),
            side.to_string(),
            effect.to_string(),
            fill.avg_price.to_string(),
            fill.filled_quantity.to_string(),
            fill.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        self.writer
            .write_record(&record)
            .map_err(|e| journal_error(format!("failed to append record: {}", e)))?;
        self.writer
            .flush()
            .map_err(|e| journal_error(format!("failed to flush journal: {}", e)))
    }
}
