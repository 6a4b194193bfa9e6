use arrow::array::{ArrayRef, Float64Builder, ListBuilder, StringBuilder, UInt64Builder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

use super::HistoryRecorder;
use crate::error::{Error, Result};
use crate::protocol::{PriceLevel, Side};
use crate::record::BookStateRecord;

pub trait RowSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct ParquetSink<W: Write + Seek + Send> {
    writer: Option<ArrowWriter<W>>,
}

impl ParquetSink<File> {
    /// Creates `path` and writes ZSTD-compressed row groups into it.
    pub fn try_new(path: impl AsRef<Path>, schema: SchemaRef) -> Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(file, schema, Some(zstd_properties()))
    }
}

impl<W: Write + Seek + Send> ParquetSink<W> {
    pub fn from_writer(
        writer: W,
        schema: SchemaRef,
        props: Option<WriterProperties>,
    ) -> Result<Self> {
        let writer = ArrowWriter::try_new(writer, Arc::clone(&schema), props)?;
        Ok(Self {
            writer: Some(writer),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl<W: Write + Seek + Send> RowSink for ParquetSink<W> {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::HistoryClosed);
        };
        writer.write(&batch)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let _ = writer.close()?;
        }
        Ok(())
    }
}

fn zstd_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build()
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// One row per record, full depth stored as list columns.
pub struct BookParquetHistory<S: RowSink = ParquetSink<File>> {
    sink: S,
    schema: SchemaRef,
    pending: Vec<BookStateRecord>,
    batch_rows: usize,
    rows_written: u64,
}

impl BookParquetHistory {
    pub fn create(path: impl AsRef<Path>, batch_rows: usize) -> Result<Self> {
        let schema = Self::schema();
        let sink = ParquetSink::try_new(path, Arc::clone(&schema))?;
        Ok(Self::with_sink(sink, batch_rows))
    }
}

impl<S: RowSink> BookParquetHistory<S> {
    pub fn with_sink(sink: S, batch_rows: usize) -> Self {
        let batch_rows = batch_rows.max(1);
        Self {
            sink,
            schema: Self::schema(),
            pending: Vec::with_capacity(batch_rows),
            batch_rows,
            rows_written: 0,
        }
    }

    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("update_count", DataType::UInt64, false),
            Field::new("timestamp", DataType::UInt64, false),
            Field::new("kind", DataType::Utf8, false),
            Field::new("first_update_id", DataType::UInt64, false),
            Field::new("final_update_id", DataType::UInt64, false),
            Field::new("bid_prices", DataType::new_list(DataType::Float64, true), false),
            Field::new("bid_sizes", DataType::new_list(DataType::Float64, true), false),
            Field::new("ask_prices", DataType::new_list(DataType::Float64, true), false),
            Field::new("ask_sizes", DataType::new_list(DataType::Float64, true), false),
            Field::new("best_bid", DataType::Float64, true),
            Field::new("best_ask", DataType::Float64, true),
            Field::new("spread", DataType::Float64, true),
            Field::new("midprice", DataType::Float64, true),
            Field::new("length", DataType::UInt64, false),
        ]))
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn write_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = self.pending.len();
        let mut update_count = UInt64Builder::with_capacity(rows);
        let mut timestamp = UInt64Builder::with_capacity(rows);
        let mut kind = StringBuilder::new();
        let mut first_id = UInt64Builder::with_capacity(rows);
        let mut final_id = UInt64Builder::with_capacity(rows);
        let mut bid_prices = ListBuilder::new(Float64Builder::new());
        let mut bid_sizes = ListBuilder::new(Float64Builder::new());
        let mut ask_prices = ListBuilder::new(Float64Builder::new());
        let mut ask_sizes = ListBuilder::new(Float64Builder::new());
        let mut best_bid = Float64Builder::with_capacity(rows);
        let mut best_ask = Float64Builder::with_capacity(rows);
        let mut spread = Float64Builder::with_capacity(rows);
        let mut midprice = Float64Builder::with_capacity(rows);
        let mut length = UInt64Builder::with_capacity(rows);

        for record in &self.pending {
            update_count.append_value(record.ordinal);
            timestamp.append_value(record.event_time_ms);
            kind.append_value(record.kind.as_str());
            first_id.append_value(record.first_update_id);
            final_id.append_value(record.final_update_id);
            append_levels(&mut bid_prices, &mut bid_sizes, &record.bids);
            append_levels(&mut ask_prices, &mut ask_sizes, &record.asks);
            best_bid.append_option(record.best_bid.map(to_f64));
            best_ask.append_option(record.best_ask.map(to_f64));
            spread.append_option(record.spread.map(to_f64));
            midprice.append_option(record.midprice.map(to_f64));
            length.append_value(record.length as u64);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(update_count.finish()),
            Arc::new(timestamp.finish()),
            Arc::new(kind.finish()),
            Arc::new(first_id.finish()),
            Arc::new(final_id.finish()),
            Arc::new(bid_prices.finish()),
            Arc::new(bid_sizes.finish()),
            Arc::new(ask_prices.finish()),
            Arc::new(ask_sizes.finish()),
            Arc::new(best_bid.finish()),
            Arc::new(best_ask.finish()),
            Arc::new(spread.finish()),
            Arc::new(midprice.finish()),
            Arc::new(length.finish()),
        ];
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), columns)?;
        self.sink.write_batch(batch)?;
        self.rows_written += rows as u64;
        self.pending.clear();
        Ok(())
    }
}

fn append_levels(
    prices: &mut ListBuilder<Float64Builder>,
    sizes: &mut ListBuilder<Float64Builder>,
    levels: &[PriceLevel],
) {
    for level in levels {
        prices.values().append_value(to_f64(level.price));
        sizes.values().append_value(to_f64(level.size));
    }
    prices.append(true);
    sizes.append(true);
}

impl<S: RowSink> HistoryRecorder for BookParquetHistory<S> {
    fn record(&mut self, record: BookStateRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_rows {
            self.write_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.write_pending()?;
        self.sink.finish()
    }
}

/// One row per resting level per record (long format, both sides in one file).
///
/// A record whose book is empty on both sides has no levels and so writes no
/// rows: its `update_count` is simply absent from the file. Use the book
/// layout when every applied event must be visible.
pub struct LevelParquetHistory<S: RowSink = ParquetSink<File>> {
    sink: S,
    schema: SchemaRef,
    pending: Vec<BookStateRecord>,
    batch_records: usize,
    rows_written: u64,
}

impl LevelParquetHistory {
    pub fn create(path: impl AsRef<Path>, batch_records: usize) -> Result<Self> {
        let schema = Self::schema();
        let sink = ParquetSink::try_new(path, Arc::clone(&schema))?;
        Ok(Self::with_sink(sink, batch_records))
    }
}

impl<S: RowSink> LevelParquetHistory<S> {
    pub fn with_sink(sink: S, batch_records: usize) -> Self {
        let batch_records = batch_records.max(1);
        Self {
            sink,
            schema: Self::schema(),
            pending: Vec::with_capacity(batch_records),
            batch_records,
            rows_written: 0,
        }
    }

    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("update_count", DataType::UInt64, false),
            Field::new("timestamp", DataType::UInt64, false),
            Field::new("side", DataType::Utf8, false),
            Field::new("price", DataType::Float64, false),
            Field::new("size", DataType::Float64, false),
        ]))
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn write_pending(&mut self) -> Result<()> {
        let rows: usize = self.pending.iter().map(|record| record.length).sum();
        if rows == 0 {
            self.pending.clear();
            return Ok(());
        }
        let mut update_count = UInt64Builder::with_capacity(rows);
        let mut timestamp = UInt64Builder::with_capacity(rows);
        let mut side = StringBuilder::new();
        let mut price = Float64Builder::with_capacity(rows);
        let mut size = Float64Builder::with_capacity(rows);

        for record in &self.pending {
            let sides = [(Side::Bid, &record.bids), (Side::Ask, &record.asks)];
            for (level_side, levels) in sides {
                for level in levels.iter() {
                    update_count.append_value(record.ordinal);
                    timestamp.append_value(record.event_time_ms);
                    side.append_value(level_side.as_str());
                    price.append_value(to_f64(level.price));
                    size.append_value(to_f64(level.size));
                }
            }
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(update_count.finish()),
            Arc::new(timestamp.finish()),
            Arc::new(side.finish()),
            Arc::new(price.finish()),
            Arc::new(size.finish()),
        ];
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), columns)?;
        self.sink.write_batch(batch)?;
        self.rows_written += rows as u64;
        self.pending.clear();
        Ok(())
    }
}

impl<S: RowSink> HistoryRecorder for LevelParquetHistory<S> {
    fn record(&mut self, record: BookStateRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_records {
            self.write_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.write_pending()?;
        self.sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;
    use arrow::array::{Array, Float64Array, ListArray, StringArray, UInt64Array};

    #[derive(Default)]
    struct CollectSink {
        batches: Vec<RecordBatch>,
        finished: usize,
    }

    impl RowSink for CollectSink {
        fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
            self.batches.push(batch);
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn record(ordinal: u64, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> BookStateRecord {
        let mut book = crate::book::PriceLevelBook::new();
        for (p, s) in bids {
            book.apply_level(Side::Bid, d(p), d(s));
        }
        for (p, s) in asks {
            book.apply_level(Side::Ask, d(p), d(s));
        }
        BookStateRecord::from_view(
            RecordKind::Diff,
            ordinal,
            1_000 + ordinal,
            (ordinal, ordinal),
            book.snapshot_view(),
        )
    }

    #[test]
    fn book_rows_are_batched() {
        let mut history = BookParquetHistory::with_sink(CollectSink::default(), 2);
        history.record(record(0, &[("99", "5")], &[("101", "3")])).unwrap();
        assert!(history.sink.batches.is_empty());
        history.record(record(1, &[], &[("101", "3")])).unwrap();
        assert_eq!(history.sink.batches.len(), 1);
        history.record(record(2, &[("98", "1")], &[])).unwrap();
        history.flush().unwrap();

        assert_eq!(history.rows_written(), 3);
        assert_eq!(history.sink.batches.len(), 2);
        assert_eq!(history.sink.finished, 1);

        let first = &history.sink.batches[0];
        let best_bid = first
            .column(9)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(best_bid.value(0), 99.0);
        assert!(best_bid.is_null(1));

        let spread = first
            .column(11)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(spread.value(0), 2.0);
        assert!(spread.is_null(1));

        let bid_prices = first
            .column(5)
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert_eq!(bid_prices.value_length(0), 1);
        assert_eq!(bid_prices.value_length(1), 0);
    }

    #[test]
    fn flush_without_rows_only_closes() {
        let mut history = BookParquetHistory::with_sink(CollectSink::default(), 8);
        history.flush().unwrap();
        history.flush().unwrap();
        assert!(history.sink.batches.is_empty());
        assert_eq!(history.sink.finished, 2);
    }

    #[test]
    fn level_rows_are_long_format() {
        let mut history = LevelParquetHistory::with_sink(CollectSink::default(), 16);
        history
            .record(record(0, &[("99", "5"), ("98", "2")], &[("101", "3")]))
            .unwrap();
        history.record(record(1, &[], &[])).unwrap();
        history.flush().unwrap();

        assert_eq!(history.rows_written(), 3);
        let batch = &history.sink.batches[0];
        assert_eq!(batch.num_rows(), 3);
        let side = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let price = batch
            .column(3)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        let ordinal = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt64Array>()
            .unwrap();
        assert_eq!(side.value(0), "bid");
        assert_eq!(price.value(0), 99.0);
        assert_eq!(price.value(1), 98.0);
        assert_eq!(side.value(2), "ask");
        assert_eq!(ordinal.value(2), 0);
        // The empty book at ordinal 1 leaves no row behind.
        assert!(ordinal.values().iter().all(|&o| o == 0));
    }
}
