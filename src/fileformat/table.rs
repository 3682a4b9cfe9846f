use std::io::Write;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::frame::{read_frame, write_end_frame, write_frame, FrameKind};
use super::signal_compression::SignalCompression;


///////////////////////////////
/// Which table a stream holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    Reads,
    Signal,
}


///////////////////////////////
/// Schema frame written at the head of every table stream. Identifies
/// the file it belongs to and how signal rows are encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub file_identifier: Uuid,
    pub software: String,
    pub format_version: String,
    pub table: TableKind,
    pub signal_encoding: SignalCompression,
}


///////////////////////////////
/// Running totals for one table stream. Reported in the footer so a
/// reader can size buffers without scanning the stream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TableSummary {
    pub batch_count: u32,
    pub row_count: u64,
    pub byte_count: u64,
}


///////////////////////////////
/// A table stream: schema frame, then batch and dictionary frames,
/// closed by a terminator frame
#[derive(Debug)]
pub struct TableStream<W: Write> {
    writer: W,
    summary: TableSummary,
}

impl<W: Write> TableStream<W> {
    pub fn create(mut writer: W, schema: &SchemaMetadata) -> Result<TableStream<W>> {
        let payload = bincode::serialize(schema)?;
        let mut summary = TableSummary::default();
        summary.byte_count += write_frame(&mut writer, FrameKind::Schema, &payload)?;
        Ok(TableStream { writer, summary })
    }

    /// Serialize one batch of rows as a frame. The caller reports how
    /// many rows the batch holds.
    pub fn write_batch<T: Serialize>(&mut self, batch: &T, row_count: u64) -> Result<()> {
        let payload = bincode::serialize(batch)?;
        self.summary.byte_count += write_frame(&mut self.writer, FrameKind::Batch, &payload)?;
        self.summary.batch_count += 1;
        self.summary.row_count += row_count;
        Ok(())
    }

    /// Serialize the stream's dictionaries. Written once, just before
    /// the terminator.
    pub fn write_dictionaries<T: Serialize>(&mut self, dictionaries: &T) -> Result<()> {
        let payload = bincode::serialize(dictionaries)?;
        self.summary.byte_count += write_frame(&mut self.writer, FrameKind::Dictionary, &payload)?;
        Ok(())
    }

    /// Write the terminator frame and hand back the underlying writer
    /// together with the final totals
    pub fn finish(mut self) -> Result<(W, TableSummary)> {
        self.summary.byte_count += write_end_frame(&mut self.writer)?;
        self.writer.flush()?;
        Ok((self.writer, self.summary))
    }

    pub fn summary(&self) -> &TableSummary {
        &self.summary
    }
}


///////////////////////////////
/// Read back the schema frame that create() wrote
pub fn read_schema<R: std::io::Read>(reader: &mut R) -> Result<SchemaMetadata> {
    let (kind, payload) = read_frame(reader)?;
    anyhow::ensure!(
        kind == FrameKind::Schema,
        "expected a schema frame, found {:?}",
        kind
    );
    Ok(bincode::deserialize(&payload)?)
}

/// Decode a batch frame payload
pub fn decode_batch<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}
