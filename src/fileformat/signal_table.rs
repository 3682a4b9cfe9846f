use std::io::Write;

use anyhow::bail;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::signal_compression::{compress_signal, signal_to_le_bytes, SignalCompression};
use super::table::{SchemaMetadata, TableStream, TableSummary};


///////////////////////////////
/// A batch of signal rows in column order. Each row is one chunk of one
/// read's signal, already encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalBatch {
    pub read_ids: Vec<Uuid>,
    pub chunks: Vec<Vec<u8>>,
    pub sample_counts: Vec<u32>,
}

impl SignalBatch {
    pub fn len(&self) -> usize {
        self.read_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_ids.is_empty()
    }
}


///////////////////////////////
/// Streams signal chunks as batched frames. Rows arrive either as raw
/// samples, encoded here, or as bytes a producer encoded earlier, which
/// are stored verbatim.
#[derive(Debug)]
pub struct SignalTableWriter<W: Write> {
    stream: TableStream<W>,
    encoding: SignalCompression,
    batch: SignalBatch,
    batch_size: usize,
    rows_written: u64,
    samples_written: u64,
}

impl<W: Write> SignalTableWriter<W> {
    pub fn create(
        writer: W,
        schema: &SchemaMetadata,
        batch_size: usize,
    ) -> Result<SignalTableWriter<W>> {
        anyhow::ensure!(batch_size > 0, "signal table batch size must be nonzero");
        Ok(SignalTableWriter {
            stream: TableStream::create(writer, schema)?,
            encoding: schema.signal_encoding,
            batch: SignalBatch::default(),
            batch_size,
            rows_written: 0,
            samples_written: 0,
        })
    }

    /// Encode one chunk of raw samples and append it as a row. Returns
    /// the row index.
    pub fn add_signal(&mut self, read_id: &Uuid, samples: &[i16]) -> Result<u64> {
        let chunk = match self.encoding {
            SignalCompression::Deflate => compress_signal(samples)?,
            SignalCompression::Uncompressed => signal_to_le_bytes(samples)?,
        };
        self.push_row(read_id, chunk, samples.len() as u32)
    }

    /// Append an already-encoded chunk as a row, byte for byte. Only
    /// meaningful when the file's signal encoding matches how the chunk
    /// was produced, so uncompressed files refuse it.
    pub fn add_pre_compressed_signal(
        &mut self,
        read_id: &Uuid,
        chunk: &[u8],
        sample_count: u32,
    ) -> Result<u64> {
        if self.encoding == SignalCompression::Uncompressed {
            bail!("pre-compressed signal requires a file with compressed signal encoding");
        }
        self.push_row(read_id, chunk.to_vec(), sample_count)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Totals of the flushed batches so far
    pub fn summary(&self) -> &TableSummary {
        self.stream.summary()
    }

    fn push_row(&mut self, read_id: &Uuid, chunk: Vec<u8>, sample_count: u32) -> Result<u64> {
        let row = self.rows_written;
        self.batch.read_ids.push(*read_id);
        self.batch.chunks.push(chunk);
        self.batch.sample_counts.push(sample_count);
        self.rows_written += 1;
        self.samples_written += sample_count as u64;
        if self.batch.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(row)
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

    /// Flush the partial batch and write the terminator. Returns the
    /// underlying writer and the final totals.
    pub fn close(mut self) -> Result<(W, TableSummary)> {
        self.flush_batch()?;
        self.stream.finish()
    }
}
