use std::path::Path;

use anyhow::Result;
use log::warn;

use super::file_writer::{
    create_combined_file_writer, create_split_file_writer, FileWriter, FileWriterOptions,
};
use super::read::{Read, ReadSignal};
use super::read_table::ReadData;


///////////////////////////////
/// High level writer taking whole reads. Metadata is resolved to
/// dictionary entries and signal is stored raw or passed through
/// pre-compressed, depending on how the read carries it.
#[derive(Debug)]
pub struct Writer {
    file_writer: FileWriter,
    deprecation_notices: u64,
}

impl Writer {
    /// Combined file with default options
    pub fn create(path: impl AsRef<Path>) -> Result<Writer> {
        Writer::create_with_options(path, FileWriterOptions::default())
    }

    pub fn create_with_options(
        path: impl AsRef<Path>,
        options: FileWriterOptions,
    ) -> Result<Writer> {
        Ok(Writer {
            file_writer: create_combined_file_writer(path, options)?,
            deprecation_notices: 0,
        })
    }

    /// Signal and reads tables in two separate files
    pub fn create_split(
        signal_path: impl AsRef<Path>,
        reads_path: impl AsRef<Path>,
        options: FileWriterOptions,
    ) -> Result<Writer> {
        Ok(Writer {
            file_writer: create_split_file_writer(signal_path, reads_path, options)?,
            deprecation_notices: 0,
        })
    }

    /// Store one read. Raw signal is chunked and encoded here, signal
    /// the producer already encoded is stored byte for byte, never
    /// encoded a second time.
    pub fn add_read(&mut self, read: Read) -> Result<()> {
        read.validate()?;
        let Read {
            read_id,
            pore,
            calibration,
            read_number,
            start_sample,
            median_before,
            end_reason,
            run_info,
            signal,
        } = read;

        let pore = self.file_writer.add_pore(&pore)?;
        let calibration = self.file_writer.add_calibration(&calibration)?;
        let end_reason = self.file_writer.add_end_reason(&end_reason)?;
        let run_info = self.file_writer.add_run_info(&run_info)?;

        let row = ReadData {
            read_id,
            pore,
            calibration,
            read_number,
            start_sample,
            median_before,
            end_reason,
            run_info,
        };

        match signal {
            ReadSignal::Raw(samples) => {
                self.file_writer.add_complete_read(&row, &samples)?;
            }
            ReadSignal::Compressed {
                chunks,
                chunk_sample_counts,
            } => {
                let mut signal_rows = Vec::with_capacity(chunks.len());
                for (chunk, sample_count) in chunks.iter().zip(chunk_sample_counts.iter()) {
                    signal_rows.push(self.file_writer.add_pre_compressed_signal(
                        &read_id,
                        chunk,
                        *sample_count,
                    )?);
                }
                self.file_writer
                    .add_complete_read_from_rows(&row, signal_rows)?;
            }
        }
        Ok(())
    }

    pub fn add_reads(&mut self, reads: impl IntoIterator<Item = Read>) -> Result<()> {
        for read in reads {
            self.add_read(read)?;
        }
        Ok(())
    }

    /// Former name of add_read. Behaves identically, apart from leaving
    /// a deprecation notice on every call.
    #[deprecated(since = "0.2.0", note = "renamed to add_read")]
    pub fn add_read_object(&mut self, read: Read) -> Result<()> {
        self.deprecation_notices += 1;
        warn!("add_read_object is deprecated, use add_read instead");
        self.add_read(read)
    }

    /// How many times a deprecated entry point has been called on this
    /// writer
    pub fn deprecation_notices(&self) -> u64 {
        self.deprecation_notices
    }

    pub fn reads_written(&self) -> u64 {
        self.file_writer.reads_written()
    }

    /// The low level writer underneath, for callers needing dictionary
    /// or row level control
    pub fn file_writer(&self) -> &FileWriter {
        &self.file_writer
    }

    pub fn file_writer_mut(&mut self) -> &mut FileWriter {
        &mut self.file_writer
    }

    /// Seal the file. Harmless to call twice.
    pub fn close(&mut self) -> Result<()> {
        self.file_writer.close()
    }
}
