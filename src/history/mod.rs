//! Append-only destinations for materialized book states.

use crate::error::Result;
use crate::record::BookStateRecord;

#[cfg(feature = "history")]
mod columnar;

#[cfg(feature = "history")]
pub use self::columnar::{BookParquetHistory, LevelParquetHistory, ParquetSink, RowSink};

/// Receives one record per applied event, in order.
pub trait HistoryRecorder {
    fn record(&mut self, record: BookStateRecord) -> Result<()>;

    /// Persist everything accumulated so far. Called once when the run ends;
    /// implementations must tolerate repeated calls.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<H: HistoryRecorder + ?Sized> HistoryRecorder for Box<H> {
    fn record(&mut self, record: BookStateRecord) -> Result<()> {
        (**self).record(record)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    records: Vec<BookStateRecord>,
    flushes: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[BookStateRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<BookStateRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&BookStateRecord> {
        self.records.last()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl HistoryRecorder for MemoryHistory {
    fn record(&mut self, record: BookStateRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
