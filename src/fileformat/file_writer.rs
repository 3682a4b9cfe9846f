use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, error, info};
use uuid::Uuid;

use super::container::{
    pad_to_boundary, write_combined_header, write_footer, write_section_marker, FileFooter,
    FileInfo, SectionInfo, DEFAULT_SOFTWARE_NAME, FORMAT_VERSION,
};
use super::dictionary::DictionaryIndex;
use super::read::{CalibrationData, EndReasonData, PoreData, RunInfoData};
use super::read_table::{ReadData, ReadTableWriter};
use super::signal_compression::SignalCompression;
use super::signal_table::SignalTableWriter;
use super::table::{SchemaMetadata, TableKind, TableSummary};


/// Reads are merged into a combined file in chunks of this size at close
const MERGE_BUFFER_SIZE: usize = 10 * 1024 * 1024;

pub const DEFAULT_SIGNAL_CHUNK_SIZE: u32 = 102_400;
pub const DEFAULT_READ_TABLE_BATCH_SIZE: usize = 1000;
pub const DEFAULT_SIGNAL_TABLE_BATCH_SIZE: usize = 100;


///////////////////////////////
/// Tuning knobs for a new file
#[derive(Debug, Clone)]
pub struct FileWriterOptions {
    /// Longest run of samples stored as one signal row
    pub max_signal_chunk_size: u32,
    pub signal_compression: SignalCompression,
    pub read_table_batch_size: usize,
    pub signal_table_batch_size: usize,
    /// Producer name recorded in schemas and the footer
    pub software_name: String,
}

impl Default for FileWriterOptions {
    fn default() -> FileWriterOptions {
        FileWriterOptions {
            max_signal_chunk_size: DEFAULT_SIGNAL_CHUNK_SIZE,
            signal_compression: SignalCompression::Deflate,
            read_table_batch_size: DEFAULT_READ_TABLE_BATCH_SIZE,
            signal_table_batch_size: DEFAULT_SIGNAL_TABLE_BATCH_SIZE,
            software_name: DEFAULT_SOFTWARE_NAME.to_string(),
        }
    }
}

impl FileWriterOptions {
    fn validate(&self) -> Result<()> {
        if self.max_signal_chunk_size == 0 {
            bail!("Invalid options: signal chunk size must be nonzero");
        }
        if self.read_table_batch_size == 0 || self.signal_table_batch_size == 0 {
            bail!("Invalid options: table batch sizes must be nonzero");
        }
        Ok(())
    }
}


///////////////////////////////
/// Where the two tables of one file go while writing
#[derive(Debug, Clone)]
enum WriterTarget {
    /// One destination holding both tables. Signal streams straight into
    /// it, reads stream into a sidecar merged at close.
    Combined {
        path: PathBuf,
        reads_tmp_path: PathBuf,
    },
    /// Each table streams into its own destination
    Split {
        signal_path: PathBuf,
        reads_path: PathBuf,
    },
}


///////////////////////////////
/// Low level writer pairing a signal table with a reads table. Callers
/// resolve read metadata to dictionary indices through add_pore and
/// friends, push signal, then push read rows.
#[derive(Debug)]
pub struct FileWriter {
    file_identifier: Uuid,
    options: FileWriterOptions,
    target: WriterTarget,
    signal_table: Option<SignalTableWriter<BufWriter<File>>>,
    read_table: Option<ReadTableWriter<BufWriter<File>>>,
}

impl FileWriter {
    pub fn file_identifier(&self) -> &Uuid {
        &self.file_identifier
    }

    pub fn options(&self) -> &FileWriterOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.signal_table.is_none()
    }

    fn signal_table_mut(&mut self) -> Result<&mut SignalTableWriter<BufWriter<File>>> {
        match self.signal_table.as_mut() {
            Some(table) => Ok(table),
            None => bail!("File writer closed, cannot write further data"),
        }
    }

    fn read_table_mut(&mut self) -> Result<&mut ReadTableWriter<BufWriter<File>>> {
        match self.read_table.as_mut() {
            Some(table) => Ok(table),
            None => bail!("File writer closed, cannot write further data"),
        }
    }

    ///////////////////////////// dictionary entries

    pub fn add_pore(&mut self, pore: &PoreData) -> Result<DictionaryIndex> {
        Ok(self.read_table_mut()?.add_pore(pore))
    }

    pub fn add_calibration(&mut self, calibration: &CalibrationData) -> Result<DictionaryIndex> {
        Ok(self.read_table_mut()?.add_calibration(calibration))
    }

    pub fn add_end_reason(&mut self, end_reason: &EndReasonData) -> Result<DictionaryIndex> {
        Ok(self.read_table_mut()?.add_end_reason(end_reason))
    }

    pub fn add_run_info(&mut self, run_info: &RunInfoData) -> Result<DictionaryIndex> {
        Ok(self.read_table_mut()?.add_run_info(run_info))
    }

    ///////////////////////////// signal rows

    /// Split raw samples into chunks of at most max_signal_chunk_size
    /// and store each as one signal row. Returns the rows used, in
    /// order. An empty signal stores no rows but a closed writer still
    /// fails.
    pub fn add_signal(&mut self, read_id: &Uuid, samples: &[i16]) -> Result<Vec<u64>> {
        let chunk_size = self.options.max_signal_chunk_size as usize;
        let table = self.signal_table_mut()?;
        let mut rows = Vec::with_capacity(samples.len() / chunk_size + 1);
        for chunk in samples.chunks(chunk_size) {
            rows.push(table.add_signal(read_id, chunk)?);
        }
        Ok(rows)
    }

    /// Store one chunk some producer already encoded, byte for byte
    pub fn add_pre_compressed_signal(
        &mut self,
        read_id: &Uuid,
        chunk: &[u8],
        sample_count: u32,
    ) -> Result<u64> {
        self.signal_table_mut()?
            .add_pre_compressed_signal(read_id, chunk, sample_count)
    }

    ///////////////////////////// read rows

    /// Store a read's signal and its row in one call
    pub fn add_complete_read(&mut self, read: &ReadData, samples: &[i16]) -> Result<u64> {
        let signal_rows = self.add_signal(&read.read_id, samples)?;
        self.add_complete_read_from_rows(read, signal_rows)
    }

    /// Store a read row referencing signal rows written earlier
    pub fn add_complete_read_from_rows(
        &mut self,
        read: &ReadData,
        signal_rows: Vec<u64>,
    ) -> Result<u64> {
        self.read_table_mut()?.add_read(read, signal_rows)
    }

    pub fn reads_written(&self) -> u64 {
        self.read_table.as_ref().map_or(0, |t| t.rows_written())
    }

    pub fn signal_rows_written(&self) -> u64 {
        self.signal_table.as_ref().map_or(0, |t| t.rows_written())
    }

    ///////////////////////////// closing

    /// Finish both tables and seal the destination. Harmless to call on
    /// a writer that is already closed.
    pub fn close(&mut self) -> Result<()> {
        let signal_table = match self.signal_table.take() {
            Some(table) => table,
            None => return Ok(()),
        };
        let read_table = match self.read_table.take() {
            Some(table) => table,
            None => bail!("File writer tables out of step, reads table missing at close"),
        };

        match self.target.clone() {
            WriterTarget::Combined {
                path,
                reads_tmp_path,
            } => self.close_combined(signal_table, read_table, &path, &reads_tmp_path),
            WriterTarget::Split {
                signal_path,
                reads_path,
            } => self.close_split(signal_table, read_table, &signal_path, &reads_path),
        }
    }

    fn close_combined(
        &mut self,
        signal_table: SignalTableWriter<BufWriter<File>>,
        read_table: ReadTableWriter<BufWriter<File>>,
        path: &Path,
        reads_tmp_path: &Path,
    ) -> Result<()> {
        let (signal_writer, signal_summary) = signal_table.close()?;
        let (reads_writer, reads_summary) = read_table.close()?;

        let mut dest = signal_writer
            .into_inner()
            .context("Failed flushing the signal section")?;
        let tmp_file = reads_writer
            .into_inner()
            .context("Failed flushing the reads sidecar")?;
        drop(tmp_file);

        // Signal section starts right after the opening signature and
        // section marker
        let signal_section = SectionInfo {
            offset: 8 + 16,
            length: signal_summary.byte_count,
            summary: signal_summary,
        };

        let position = dest.stream_position()?;
        let position = pad_to_boundary(&mut dest, position)?;
        let position = position + write_section_marker(&mut dest, &self.file_identifier)?;

        let reads_section = SectionInfo {
            offset: position,
            length: reads_summary.byte_count,
            summary: reads_summary,
        };

        debug!(
            "Merging reads sidecar {} into {}",
            reads_tmp_path.display(),
            path.display()
        );
        let mut tmp = File::open(reads_tmp_path)
            .with_context(|| format!("Cannot reopen reads sidecar {}", reads_tmp_path.display()))?;
        let mut buffer = vec![0u8; MERGE_BUFFER_SIZE];
        let mut position = position;
        loop {
            let n = tmp.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            dest.write_all(&buffer[..n])?;
            position += n as u64;
        }
        drop(tmp);
        std::fs::remove_file(reads_tmp_path).with_context(|| {
            format!(
                "Failed to remove temporary file: {}",
                reads_tmp_path.display()
            )
        })?;

        pad_to_boundary(&mut dest, position)?;
        write_section_marker(&mut dest, &self.file_identifier)?;

        let footer = FileFooter {
            info: FileInfo {
                file_identifier: self.file_identifier,
                software: self.options.software_name.clone(),
                format_version: FORMAT_VERSION.to_string(),
            },
            signal: signal_section,
            reads: reads_section,
        };
        write_footer(&mut dest, &footer)?;
        dest.flush()?;

        info!(
            "Closed {} with {} reads over {} signal rows",
            path.display(),
            reads_section.summary.row_count,
            signal_section.summary.row_count
        );
        Ok(())
    }

    fn close_split(
        &mut self,
        signal_table: SignalTableWriter<BufWriter<File>>,
        read_table: ReadTableWriter<BufWriter<File>>,
        signal_path: &Path,
        reads_path: &Path,
    ) -> Result<()> {
        let (signal_writer, signal_summary) = signal_table.close()?;
        let (reads_writer, reads_summary) = read_table.close()?;
        let mut signal_file = signal_writer
            .into_inner()
            .context("Failed flushing the signal table")?;
        let mut reads_file = reads_writer
            .into_inner()
            .context("Failed flushing the reads table")?;
        signal_file.flush()?;
        reads_file.flush()?;

        info!(
            "Closed {} ({} signal rows) and {} ({} reads)",
            signal_path.display(),
            signal_summary.row_count,
            reads_path.display(),
            reads_summary.row_count
        );
        Ok(())
    }

    /// Totals for both tables while the writer is open
    pub fn summaries(&self) -> (TableSummary, TableSummary) {
        let signal = self
            .signal_table
            .as_ref()
            .map_or_else(TableSummary::default, |t| *t.summary());
        let reads = self
            .read_table
            .as_ref()
            .map_or_else(TableSummary::default, |t| *t.summary());
        (signal, reads)
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.close() {
                error!("Failed to close pod5 writer: {:#}", e);
            }
        }
    }
}


///////////////////////////////
/// Create a file that must not exist yet
fn create_new_file(path: &Path) -> Result<File> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            bail!("Unable to create new file '{}', already exists", path.display())
        }
        Err(e) => {
            Err(e).with_context(|| format!("Unable to create new file '{}'", path.display()))
        }
    }
}

/// The reads sidecar lives next to the destination as a hidden file,
/// `.<name>.tmp-reads`
fn make_reads_tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(base) = path.file_name() {
        name.push(base);
    }
    name.push(".tmp-reads");
    path.with_file_name(name)
}

fn schema_for(
    table: TableKind,
    file_identifier: Uuid,
    options: &FileWriterOptions,
) -> SchemaMetadata {
    SchemaMetadata {
        file_identifier,
        software: options.software_name.clone(),
        format_version: FORMAT_VERSION.to_string(),
        table,
        signal_encoding: options.signal_compression,
    }
}

/// One destination file with the signal section first and the reads
/// section appended at close
pub fn create_combined_file_writer(
    path: impl AsRef<Path>,
    options: FileWriterOptions,
) -> Result<FileWriter> {
    options.validate()?;
    let path = path.as_ref().to_path_buf();
    let file_identifier = Uuid::new_v4();

    let mut dest = create_new_file(&path)?;
    write_combined_header(&mut dest, &file_identifier)?;

    let reads_tmp_path = make_reads_tmp_path(&path);
    // Sidecar is internal state, a leftover from a crashed run gets
    // truncated rather than refused
    let tmp = File::create(&reads_tmp_path)
        .with_context(|| format!("Cannot create reads sidecar {}", reads_tmp_path.display()))?;

    debug!(
        "Writing combined pod5 file {} (id {})",
        path.display(),
        file_identifier
    );

    let signal_table = SignalTableWriter::create(
        BufWriter::new(dest),
        &schema_for(TableKind::Signal, file_identifier, &options),
        options.signal_table_batch_size,
    )?;
    let read_table = ReadTableWriter::create(
        BufWriter::new(tmp),
        &schema_for(TableKind::Reads, file_identifier, &options),
        options.read_table_batch_size,
    )?;

    Ok(FileWriter {
        file_identifier,
        options,
        target: WriterTarget::Combined {
            path,
            reads_tmp_path,
        },
        signal_table: Some(signal_table),
        read_table: Some(read_table),
    })
}

/// Two destination files, one per table
pub fn create_split_file_writer(
    signal_path: impl AsRef<Path>,
    reads_path: impl AsRef<Path>,
    options: FileWriterOptions,
) -> Result<FileWriter> {
    options.validate()?;
    let signal_path = signal_path.as_ref().to_path_buf();
    let reads_path = reads_path.as_ref().to_path_buf();
    let file_identifier = Uuid::new_v4();

    let mut signal_file = create_new_file(&signal_path)?;
    let mut reads_file = create_new_file(&reads_path)?;
    write_combined_header(&mut signal_file, &file_identifier)?;
    write_combined_header(&mut reads_file, &file_identifier)?;

    debug!(
        "Writing split pod5 files {} / {} (id {})",
        signal_path.display(),
        reads_path.display(),
        file_identifier
    );

    let signal_table = SignalTableWriter::create(
        BufWriter::new(signal_file),
        &schema_for(TableKind::Signal, file_identifier, &options),
        options.signal_table_batch_size,
    )?;
    let read_table = ReadTableWriter::create(
        BufWriter::new(reads_file),
        &schema_for(TableKind::Reads, file_identifier, &options),
        options.read_table_batch_size,
    )?;

    Ok(FileWriter {
        file_identifier,
        options,
        target: WriterTarget::Split {
            signal_path,
            reads_path,
        },
        signal_table: Some(signal_table),
        read_table: Some(read_table),
    })
}



#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_read_data(read_id: Uuid, read_number: u32) -> ReadData {
        ReadData {
            read_id,
            pore: 0,
            calibration: 0,
            read_number,
            start_sample: 0,
            median_before: 200.0,
            end_reason: 0,
            run_info: 0,
        }
    }

    #[test]
    fn test_signal_is_chunked_to_the_configured_size() {
        let dir = tempdir().unwrap();
        let mut options = FileWriterOptions::default();
        options.max_signal_chunk_size = 100;
        options.signal_table_batch_size = 2;
        let mut writer =
            create_combined_file_writer(dir.path().join("chunked.pod5"), options).unwrap();

        let read_id = Uuid::new_v4();
        let samples = vec![12i16; 250];
        let rows = writer.add_signal(&read_id, &samples).unwrap();
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(writer.signal_rows_written(), 3);

        // Two rows flushed as a full batch, the third still pending
        let (signal_summary, _) = writer.summaries();
        assert_eq!(signal_summary.batch_count, 1);
        assert_eq!(signal_summary.row_count, 2);

        let empty = writer.add_signal(&read_id, &[]).unwrap();
        assert!(empty.is_empty());

        writer
            .add_complete_read_from_rows(&test_read_data(read_id, 0), rows)
            .unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_closed_writer_refuses_further_data() {
        let dir = tempdir().unwrap();
        let mut writer = create_combined_file_writer(
            dir.path().join("closed.pod5"),
            FileWriterOptions::default(),
        )
        .unwrap();

        let read_id = Uuid::new_v4();
        writer
            .add_complete_read(&test_read_data(read_id, 0), &[1, 2, 3])
            .unwrap();
        writer.close().unwrap();
        // A second close is a no-op
        writer.close().unwrap();

        let err = writer
            .add_complete_read(&test_read_data(read_id, 1), &[4, 5, 6])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "File writer closed, cannot write further data"
        );

        // Even an empty signal, which writes no rows, is refused
        let err = writer.add_signal(&read_id, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File writer closed, cannot write further data"
        );
    }

    #[test]
    fn test_existing_files_are_never_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("once.pod5");
        let writer = create_combined_file_writer(&path, FileWriterOptions::default());
        assert!(writer.is_ok());
        drop(writer);

        let err = create_combined_file_writer(&path, FileWriterOptions::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_reads_sidecar_is_a_hidden_sibling() {
        assert_eq!(
            make_reads_tmp_path(Path::new("/data/run/out.pod5")),
            PathBuf::from("/data/run/.out.pod5.tmp-reads")
        );
    }

    #[test]
    fn test_close_merges_the_sidecar_and_removes_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merged.pod5");
        let mut writer =
            create_combined_file_writer(&path, FileWriterOptions::default()).unwrap();

        // While the writer is open the sidecar exists, as a hidden file
        assert!(dir.path().join(".merged.pod5.tmp-reads").exists());
        assert!(!dir.path().join("merged.pod5.tmp-reads").exists());

        let read_id = Uuid::new_v4();
        writer
            .add_complete_read(&test_read_data(read_id, 0), &[7i16; 500])
            .unwrap();
        writer.close().unwrap();

        assert!(path.exists());
        assert!(!make_reads_tmp_path(&path).exists());
        // Footer trails the file, sections are aligned
        let len = std::fs::metadata(&path).unwrap().len();
        assert!(len > 24 + 16);
    }
}
