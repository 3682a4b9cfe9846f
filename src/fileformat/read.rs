use anyhow::bail;
use serde::{Deserialize, Serialize};
use uuid::Uuid;


///////////////////////////////
/////////////////////////////// The identity of a read
///////////////////////////////

/// Reads, files and section markers are all identified by UUIDs
pub type ReadId = Uuid;



///////////////////////////////
/////////////////////////////// Dictionary-encoded metadata rows
///////////////////////////////


/// The pore a read was acquired from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoreData {
    pub channel: u16,
    pub well: u8,
    pub pore_type: String,
}


/// Calibration from ADC counts to picoamperes: pa = (adc + offset) * scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationData {
    pub offset: f32,
    pub scale: f32,
}

// f32 fields keep CalibrationData from deriving Eq/Hash; compare and hash
// the bit patterns instead so it can be deduplicated like the other rows
impl PartialEq for CalibrationData {
    fn eq(&self, other: &Self) -> bool {
        self.offset.to_bits() == other.offset.to_bits() && self.scale.to_bits() == other.scale.to_bits()
    }
}
impl Eq for CalibrationData {}
impl std::hash::Hash for CalibrationData {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.offset.to_bits().hash(state);
        self.scale.to_bits().hash(state);
    }
}


/// Why the sequencer stopped acquiring this read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndReason {
    Unknown,
    MuxChange,
    UnblockMuxChange,
    DataServiceUnblockMuxChange,
    SignalPositive,
    SignalNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndReasonData {
    pub reason: EndReason,
    pub forced: bool,
}


/// Acquisition metadata, shared by every read of one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunInfoData {
    pub acquisition_id: String,
    pub acquisition_start_time_ms: i64,
    pub adc_min: i16,
    pub adc_max: i16,
    pub flow_cell_id: String,
    pub protocol_name: String,
    pub sample_id: String,
    pub sample_rate: u32,
    pub sequencing_kit: String,
    pub software: String,
}



///////////////////////////////
/////////////////////////////// One read record, as submitted to a Writer
///////////////////////////////


/// The signal payload of a read. The writer branches on this tag, so the
/// raw-vs-precompressed decision is exhaustive rather than guessed from
/// attribute shapes
#[derive(Debug, Clone)]
pub enum ReadSignal {
    /// Uncompressed ADC samples; the writer chunks and compresses these
    Raw(Vec<i16>),
    /// Payload already in the file codec representation, one entry per
    /// signal chunk. The writer persists these bytes as-is
    Compressed {
        chunks: Vec<Vec<u8>>,
        chunk_sample_counts: Vec<u32>,
    },
}


/// A single sequencing read. Ownership transfers to the Writer on
/// submission; the writer decides when it is flushed to the backing file
#[derive(Debug, Clone)]
pub struct Read {
    pub read_id: ReadId,
    pub pore: PoreData,
    pub calibration: CalibrationData,
    pub read_number: u32,
    pub start_sample: u64,
    pub median_before: f32,
    pub end_reason: EndReasonData,
    pub run_info: RunInfoData,
    pub signal: ReadSignal,
}

impl Read {

    /// A read carrying raw signal samples
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        read_id: ReadId,
        pore: PoreData,
        calibration: CalibrationData,
        read_number: u32,
        start_sample: u64,
        median_before: f32,
        end_reason: EndReasonData,
        run_info: RunInfoData,
        samples: Vec<i16>,
    ) -> Read {
        Read {
            read_id,
            pore,
            calibration,
            read_number,
            start_sample,
            median_before,
            end_reason,
            run_info,
            signal: ReadSignal::Raw(samples),
        }
    }

    /// The CompressedRead form: same record, but the signal chunks are
    /// already encoded in the writer's codec representation
    #[allow(clippy::too_many_arguments)]
    pub fn pre_compressed(
        read_id: ReadId,
        pore: PoreData,
        calibration: CalibrationData,
        read_number: u32,
        start_sample: u64,
        median_before: f32,
        end_reason: EndReasonData,
        run_info: RunInfoData,
        chunks: Vec<Vec<u8>>,
        chunk_sample_counts: Vec<u32>,
    ) -> Read {
        Read {
            read_id,
            pore,
            calibration,
            read_number,
            start_sample,
            median_before,
            end_reason,
            run_info,
            signal: ReadSignal::Compressed {
                chunks,
                chunk_sample_counts,
            },
        }
    }

    pub fn is_pre_compressed(&self) -> bool {
        matches!(self.signal, ReadSignal::Compressed { .. })
    }

    /// Total number of signal samples, whichever form the payload is in
    pub fn sample_count(&self) -> u64 {
        match &self.signal {
            ReadSignal::Raw(samples) => samples.len() as u64,
            ReadSignal::Compressed {
                chunk_sample_counts, ..
            } => chunk_sample_counts.iter().map(|n| *n as u64).sum(),
        }
    }

    /// Reject malformed records before anything reaches the backing store
    pub fn validate(&self) -> anyhow::Result<()> {
        if let ReadSignal::Compressed {
            chunks,
            chunk_sample_counts,
        } = &self.signal
        {
            if chunks.len() != chunk_sample_counts.len() {
                bail!(
                    "malformed pre-compressed read {}: {} signal chunks but {} chunk sample counts",
                    self.read_id,
                    chunks.len(),
                    chunk_sample_counts.len()
                );
            }
        }
        Ok(())
    }
}
