use std::io::Write;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dictionary::{make_dictionary_writers, DictionaryIndex, DictionaryWriters};
use super::read::{CalibrationData, EndReasonData, PoreData, RunInfoData};
use super::table::{SchemaMetadata, TableStream, TableSummary};


///////////////////////////////
/// One row of the reads table, with metadata already resolved to
/// dictionary indices
#[derive(Debug, Clone)]
pub struct ReadData {
    pub read_id: Uuid,
    pub pore: DictionaryIndex,
    pub calibration: DictionaryIndex,
    pub read_number: u32,
    pub start_sample: u64,
    pub median_before: f32,
    pub end_reason: DictionaryIndex,
    pub run_info: DictionaryIndex,
}


///////////////////////////////
/// A batch of read rows in column order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadBatch {
    pub read_ids: Vec<Uuid>,
    pub pores: Vec<DictionaryIndex>,
    pub calibrations: Vec<DictionaryIndex>,
    pub read_numbers: Vec<u32>,
    pub start_samples: Vec<u64>,
    pub medians_before: Vec<f32>,
    pub end_reasons: Vec<DictionaryIndex>,
    pub run_infos: Vec<DictionaryIndex>,
    pub signal_rows: Vec<Vec<u64>>,
}

impl ReadBatch {
    pub fn len(&self) -> usize {
        self.read_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_ids.is_empty()
    }

    fn push(&mut self, read: &ReadData, signal_rows: Vec<u64>) {
        self.read_ids.push(read.read_id);
        self.pores.push(read.pore);
        self.calibrations.push(read.calibration);
        self.read_numbers.push(read.read_number);
        self.start_samples.push(read.start_sample);
        self.medians_before.push(read.median_before);
        self.end_reasons.push(read.end_reason);
        self.run_infos.push(read.run_info);
        self.signal_rows.push(signal_rows);
    }
}


///////////////////////////////
/// Streams read rows as batched frames. Dictionaries accumulate across
/// the whole table and serialize once, just before the terminator.
#[derive(Debug)]
pub struct ReadTableWriter<W: Write> {
    stream: TableStream<W>,
    dictionaries: DictionaryWriters,
    batch: ReadBatch,
    batch_size: usize,
    rows_written: u64,
}

impl<W: Write> ReadTableWriter<W> {
    pub fn create(
        writer: W,
        schema: &SchemaMetadata,
        batch_size: usize,
    ) -> Result<ReadTableWriter<W>> {
        anyhow::ensure!(batch_size > 0, "read table batch size must be nonzero");
        Ok(ReadTableWriter {
            stream: TableStream::create(writer, schema)?,
            dictionaries: make_dictionary_writers(),
            batch: ReadBatch::default(),
            batch_size,
            rows_written: 0,
        })
    }

    /// Append one row, referencing the signal table rows that hold the
    /// read's chunks. Returns the row index the read landed on.
    pub fn add_read(&mut self, read: &ReadData, signal_rows: Vec<u64>) -> Result<u64> {
        let row = self.rows_written;
        self.batch.push(read, signal_rows);
        self.rows_written += 1;
        if self.batch.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(row)
    }

    pub fn add_pore(&mut self, pore: &PoreData) -> DictionaryIndex {
        self.dictionaries.pores.add(pore)
    }

    pub fn add_calibration(&mut self, calibration: &CalibrationData) -> DictionaryIndex {
        self.dictionaries.calibrations.add(calibration)
    }

    pub fn add_end_reason(&mut self, end_reason: &EndReasonData) -> DictionaryIndex {
        self.dictionaries.end_reasons.add(end_reason)
    }

    pub fn add_run_info(&mut self, run_info: &RunInfoData) -> DictionaryIndex {
        self.dictionaries.run_infos.add(run_info)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Totals of the flushed batches so far
    pub fn summary(&self) -> &TableSummary {
        self.stream.summary()
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let row_count = self.batch.len() as u64;
        let batch = std::mem::take(&mut self.batch);
        self.stream.write_batch(&batch, row_count)?;
        Ok(())
    }

    /// Flush the partial batch, serialize the dictionaries and write the
    /// terminator. Returns the underlying writer and the final totals.
    pub fn close(mut self) -> Result<(W, TableSummary)> {
        self.flush_batch()?;
        let frame = self.dictionaries.to_frame();
        self.stream.write_dictionaries(&frame)?;
        self.stream.finish()
    }
}
