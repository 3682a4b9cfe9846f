use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crossbeam::channel::{Receiver, Sender};
use log::{debug, info};
use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::fileformat::{FileWriterOptions, Read, SignalCompression, Writer};
use crate::simulate::ReadSimulator;


///////////////////////////////
/// Parameters for synthesizing a file of simulated reads
pub struct SimulateParams {
    pub path_out: PathBuf,
    pub num_reads: usize,
    pub seed: u64,
    pub min_samples: usize,
    pub max_samples: usize,
    /// Fraction of reads handed to the writer already encoded
    pub pre_compressed_fraction: f64,
    pub signal_chunk_size: u32,
    pub uncompressed: bool,
}

impl SimulateParams {
    fn validate(&self) -> Result<()> {
        if self.min_samples == 0 || self.min_samples > self.max_samples {
            bail!(
                "Invalid read length range {}..{}",
                self.min_samples,
                self.max_samples
            );
        }
        if !(0.0..=1.0).contains(&self.pre_compressed_fraction) {
            bail!("Pre-compressed fraction must lie in 0..1");
        }
        if self.uncompressed && self.pre_compressed_fraction > 0.0 {
            bail!("Uncompressed files cannot take pre-compressed reads");
        }
        Ok(())
    }
}


pub struct Simulate {}

impl Simulate {
    /// Generate reads on this thread and stream them to a writer thread
    pub fn run(params: &Arc<SimulateParams>) -> Result<u64> {
        params.validate()?;

        let thread_pool = threadpool::ThreadPool::new(1);
        let (tx, done_rx) = create_writer_thread(params, &thread_pool)?;

        let mut simulator = ReadSimulator::new(params.seed);
        // Separate stream for the shape decisions, so signal content and
        // read lengths replay independently
        let mut rng = SmallRng::seed_from_u64(params.seed.wrapping_add(1));
        let length_range = Uniform::new_inclusive(params.min_samples, params.max_samples);
        let chance_range = Uniform::new(0.0f64, 1.0);

        for i in 0..params.num_reads {
            let sample_count = length_range.sample(&mut rng);
            let read = if chance_range.sample(&mut rng) < params.pre_compressed_fraction {
                simulator
                    .next_read_pre_compressed(sample_count, params.signal_chunk_size as usize)?
            } else {
                simulator.next_read(sample_count)
            };
            // A failed send means the writer thread stopped early and
            // parked its error on the result channel, picked up below
            if tx.send(Some(read)).is_err() {
                break;
            }
            if (i + 1) % 1000 == 0 {
                debug!("Queued {} reads", i + 1);
            }
        }
        let _ = tx.send(None);

        let written = done_rx
            .recv()
            .context("Writer thread dropped without reporting")??;
        thread_pool.join();

        info!(
            "Simulated {} reads into {}",
            written,
            params.path_out.display()
        );
        Ok(written)
    }
}


fn writer_options(params: &SimulateParams) -> FileWriterOptions {
    let mut options = FileWriterOptions::default();
    options.max_signal_chunk_size = params.signal_chunk_size;
    if params.uncompressed {
        options.signal_compression = SignalCompression::Uncompressed;
    }
    options
}

fn create_writer_thread(
    params: &Arc<SimulateParams>,
    thread_pool: &threadpool::ThreadPool,
) -> Result<(Arc<Sender<Option<Read>>>, Receiver<Result<u64>>)> {
    let path_out = params.path_out.clone();
    let options = writer_options(params);

    let (tx, rx) = crossbeam::channel::bounded::<Option<Read>>(1000);
    let tx = Arc::new(tx);
    let (done_tx, done_rx) = crossbeam::channel::bounded::<Result<u64>>(1);

    thread_pool.execute(move || {
        let outcome = write_reads(&path_out, options, rx);
        let _ = done_tx.send(outcome);
    });

    Ok((tx, done_rx))
}

fn write_reads(
    path_out: &Path,
    options: FileWriterOptions,
    rx: Receiver<Option<Read>>,
) -> Result<u64> {
    info!("Creating output file: {}", path_out.display());
    let mut writer = Writer::create_with_options(path_out, options)?;
    while let Ok(Some(read)) = rx.recv() {
        writer.add_read(read)?;
    }
    let written = writer.reads_written();
    writer.close()?;
    Ok(written)
}



#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_params(path_out: PathBuf) -> SimulateParams {
        SimulateParams {
            path_out,
            num_reads: 20,
            seed: 42,
            min_samples: 500,
            max_samples: 3000,
            pre_compressed_fraction: 0.5,
            signal_chunk_size: 1024,
            uncompressed: false,
        }
    }

    #[test]
    fn test_simulation_writes_the_requested_reads() {
        let dir = tempdir().unwrap();
        let params = test_params(dir.path().join("sim.pod5"));
        let written = Simulate::run(&Arc::new(params)).unwrap();
        assert_eq!(written, 20);
        assert!(dir.path().join("sim.pod5").exists());
    }

    #[test]
    fn test_contradictory_params_are_refused() {
        let dir = tempdir().unwrap();
        let mut params = test_params(dir.path().join("bad.pod5"));
        params.uncompressed = true;
        let err = Simulate::run(&Arc::new(params)).unwrap_err();
        assert!(err.to_string().contains("pre-compressed"));
    }

    #[test]
    fn test_writer_errors_survive_a_dead_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taken.pod5");
        std::fs::write(&path, b"occupied").unwrap();

        // Enough reads to outlive the channel buffer after the writer
        // thread has already failed and hung up
        let mut params = test_params(path);
        params.num_reads = 1500;
        params.min_samples = 50;
        params.max_samples = 100;

        let err = Simulate::run(&Arc::new(params)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
