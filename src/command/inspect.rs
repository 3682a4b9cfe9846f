use std::fs::File;
use std::io::{Read as IoRead, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use itertools::izip;
use log::debug;

use crate::fileformat::container::{
    check_file_signature, check_section_marker, check_section_trailer, parse_footer, FileFooter,
};
use crate::fileformat::frame::{read_frame, FrameKind};
use crate::fileformat::signal_compression::{decompress_signal, SignalCompression};
use crate::fileformat::signal_table::SignalBatch;
use crate::fileformat::table::{decode_batch, read_schema, TableKind};


///////////////////////////////
/// Parameters for summarizing one combined file
pub struct InspectParams {
    pub path_in: PathBuf,
    /// Decode every signal row and check the counts add up
    pub verify_signal: bool,
}


pub struct Inspect {}

impl Inspect {
    pub fn run(params: &Arc<InspectParams>) -> Result<()> {
        let mut file = File::open(&params.path_in)
            .with_context(|| format!("Cannot open file {}", params.path_in.display()))?;

        check_file_signature(&mut file)?;
        let footer = parse_footer(&mut file)?;
        file.seek(SeekFrom::Start(8))?;
        check_section_marker(&mut file, &footer.info.file_identifier)?;
        check_section_trailer(&mut file, &footer.signal, &footer.info.file_identifier)?;
        check_section_trailer(&mut file, &footer.reads, &footer.info.file_identifier)?;

        println!("File:            {}", params.path_in.display());
        println!("Identifier:      {}", footer.info.file_identifier);
        println!("Software:        {}", footer.info.software);
        println!("Format version:  {}", footer.info.format_version);
        println!(
            "Reads:           {} rows in {} batches ({} bytes)",
            footer.reads.summary.row_count,
            footer.reads.summary.batch_count,
            footer.reads.length
        );
        println!(
            "Signal:          {} rows in {} batches ({} bytes)",
            footer.signal.summary.row_count,
            footer.signal.summary.batch_count,
            footer.signal.length
        );

        if params.verify_signal {
            let samples = verify_signal_section(&mut file, &footer)?;
            println!("Signal verified: {} samples decode cleanly", samples);
        }
        Ok(())
    }
}


/// Walk the signal section, decode every row and count samples. The row
/// total has to match the footer.
fn verify_signal_section(file: &mut File, footer: &FileFooter) -> Result<u64> {
    file.seek(SeekFrom::Start(footer.signal.offset))?;
    let mut section = file.by_ref().take(footer.signal.length);

    let schema = read_schema(&mut section)?;
    if schema.table != TableKind::Signal {
        bail!("signal section holds a {:?} table", schema.table);
    }
    if schema.file_identifier != footer.info.file_identifier {
        bail!("signal section belongs to a different file");
    }

    let mut rows = 0u64;
    let mut samples = 0u64;
    loop {
        let (kind, payload) = read_frame(&mut section)?;
        match kind {
            FrameKind::Batch => {
                let batch: SignalBatch = decode_batch(&payload)?;
                for (chunk, sample_count) in izip!(&batch.chunks, &batch.sample_counts) {
                    match schema.signal_encoding {
                        SignalCompression::Deflate => {
                            decompress_signal(chunk, *sample_count as usize)?;
                        }
                        SignalCompression::Uncompressed => {
                            if chunk.len() != *sample_count as usize * 2 {
                                bail!(
                                    "signal row declares {} samples but holds {} bytes",
                                    sample_count,
                                    chunk.len()
                                );
                            }
                        }
                    }
                    rows += 1;
                    samples += *sample_count as u64;
                }
                debug!("Verified a batch of {} signal rows", batch.len());
            }
            FrameKind::End => break,
            other => bail!("unexpected {:?} frame in the signal section", other),
        }
    }

    if rows != footer.signal.summary.row_count {
        bail!(
            "signal section holds {} rows but the footer records {}",
            rows,
            footer.signal.summary.row_count
        );
    }
    Ok(samples)
}
