use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::simulate::Simulate;
use crate::command::simulate::SimulateParams;
use crate::fileformat::file_writer::DEFAULT_SIGNAL_CHUNK_SIZE;

pub const DEFAULT_NUM_READS: usize = 100;
pub const DEFAULT_MIN_SAMPLES: usize = 2000;
pub const DEFAULT_MAX_SAMPLES: usize = 20000;


/// Commandline option: write a file of simulated reads
#[derive(Args)]
pub struct SimulateCmd {
    #[arg(short = 'o', value_parser = clap::value_parser!(PathBuf))]
    pub path_out: PathBuf,

    #[arg(short = 'n', long = "reads", default_value_t = DEFAULT_NUM_READS)]
    pub num_reads: usize,

    #[arg(long = "seed", default_value_t = 1)]
    pub seed: u64,

    #[arg(long = "min-samples", default_value_t = DEFAULT_MIN_SAMPLES)]
    pub min_samples: usize,

    #[arg(long = "max-samples", default_value_t = DEFAULT_MAX_SAMPLES)]
    pub max_samples: usize,

    // Fraction of reads handed to the writer already encoded
    #[arg(long = "pre-compressed", default_value_t = 0.0)]
    pub pre_compressed_fraction: f64,

    #[arg(long = "chunk-size", default_value_t = DEFAULT_SIGNAL_CHUNK_SIZE)]
    pub signal_chunk_size: u32,

    // Store signal as plain little endian samples
    #[arg(long = "uncompressed")]
    pub uncompressed: bool,
}

impl SimulateCmd {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let params = SimulateParams {
            path_out: self.path_out.clone(),
            num_reads: self.num_reads,
            seed: self.seed,
            min_samples: self.min_samples,
            max_samples: self.max_samples,
            pre_compressed_fraction: self.pre_compressed_fraction,
            signal_chunk_size: self.signal_chunk_size,
            uncompressed: self.uncompressed,
        };

        let written = Simulate::run(&Arc::new(params))?;

        println!("Simulation has finished, {} reads written!", written);
        Ok(())
    }
}
