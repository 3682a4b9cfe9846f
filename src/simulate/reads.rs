use anyhow::Result;
use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use uuid::Uuid;

use crate::fileformat::container::DEFAULT_SOFTWARE_NAME;
use crate::fileformat::read::{
    CalibrationData, EndReason, EndReasonData, PoreData, Read, RunInfoData,
};
use crate::fileformat::signal_compression::compress_signal;


///////////////////////////////
/// Generates synthetic reads with a pore-current-like signal, for
/// exercising writers and producing test data. Fully deterministic for
/// a given seed.
pub struct ReadSimulator {
    rng: SmallRng,
    run_info: RunInfoData,
    calibration: CalibrationData,
    read_number: u32,
    next_start_sample: u64,
    channel_range: Uniform<u16>,
    well_range: Uniform<u8>,
    gap_range: Uniform<u64>,
    dwell_range: Uniform<usize>,
    level_distr: Normal<f32>,
    noise_distr: Normal<f32>,
    median_distr: Normal<f32>,
}

impl ReadSimulator {
    pub fn new(seed: u64) -> ReadSimulator {
        ReadSimulator::with_run_info(seed, simulated_run_info(seed))
    }

    pub fn with_run_info(seed: u64, run_info: RunInfoData) -> ReadSimulator {
        ReadSimulator {
            rng: SmallRng::seed_from_u64(seed),
            run_info,
            calibration: CalibrationData {
                offset: -243.0,
                scale: 0.1755,
            },
            read_number: 0,
            next_start_sample: 0,
            channel_range: Uniform::new(1, 513),
            well_range: Uniform::new(1, 5),
            gap_range: Uniform::new(100, 5000),
            dwell_range: Uniform::new(20, 200),
            level_distr: Normal::new(450.0, 60.0).unwrap(),
            noise_distr: Normal::new(0.0, 12.0).unwrap(),
            median_distr: Normal::new(250.0, 30.0).unwrap(),
        }
    }

    /// One read carrying raw samples
    pub fn next_read(&mut self, sample_count: usize) -> Read {
        let samples = self.simulate_signal(sample_count);
        Read::new(
            self.next_read_id(),
            self.next_pore(),
            self.calibration.clone(),
            self.next_read_number(),
            self.claim_start_sample(sample_count),
            self.median_distr.sample(&mut self.rng),
            self.next_end_reason(),
            self.run_info.clone(),
            samples,
        )
    }

    /// One read whose signal is already split into chunks and encoded,
    /// the way a live acquisition hands data over
    pub fn next_read_pre_compressed(
        &mut self,
        sample_count: usize,
        chunk_size: usize,
    ) -> Result<Read> {
        let samples = self.simulate_signal(sample_count);
        let mut chunks = Vec::new();
        let mut chunk_sample_counts = Vec::new();
        for chunk in samples.chunks(chunk_size.max(1)) {
            chunks.push(compress_signal(chunk)?);
            chunk_sample_counts.push(chunk.len() as u32);
        }
        Ok(Read::pre_compressed(
            self.next_read_id(),
            self.next_pore(),
            self.calibration.clone(),
            self.next_read_number(),
            self.claim_start_sample(sample_count),
            self.median_distr.sample(&mut self.rng),
            self.next_end_reason(),
            self.run_info.clone(),
            chunks,
            chunk_sample_counts,
        ))
    }

    /// Piecewise-constant current levels with gaussian noise, clamped
    /// to the acquisition's ADC range
    pub fn simulate_signal(&mut self, sample_count: usize) -> Vec<i16> {
        let adc_min = self.run_info.adc_min as f32;
        let adc_max = self.run_info.adc_max as f32;
        let mut samples = Vec::with_capacity(sample_count);
        let mut level = self.level_distr.sample(&mut self.rng);
        let mut dwell = self.dwell_range.sample(&mut self.rng);
        for _ in 0..sample_count {
            if dwell == 0 {
                level = self.level_distr.sample(&mut self.rng);
                dwell = self.dwell_range.sample(&mut self.rng);
            }
            dwell -= 1;
            let value = level + self.noise_distr.sample(&mut self.rng);
            samples.push(value.round().clamp(adc_min, adc_max) as i16);
        }
        samples
    }

    pub fn run_info(&self) -> &RunInfoData {
        &self.run_info
    }

    fn next_read_id(&mut self) -> Uuid {
        // Drawn from the seeded rng rather than the OS, so runs replay
        uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid()
    }

    fn next_pore(&mut self) -> PoreData {
        PoreData {
            channel: self.channel_range.sample(&mut self.rng),
            well: self.well_range.sample(&mut self.rng),
            pore_type: "not_set".to_string(),
        }
    }

    fn next_read_number(&mut self) -> u32 {
        let n = self.read_number;
        self.read_number += 1;
        n
    }

    fn claim_start_sample(&mut self, sample_count: usize) -> u64 {
        let start = self.next_start_sample;
        self.next_start_sample += sample_count as u64 + self.gap_range.sample(&mut self.rng);
        start
    }

    fn next_end_reason(&mut self) -> EndReasonData {
        let raw = self.rng.gen_range(0..100);
        if raw < 80 {
            EndReasonData {
                reason: EndReason::SignalPositive,
                forced: false,
            }
        } else if raw < 90 {
            EndReasonData {
                reason: EndReason::Unknown,
                forced: false,
            }
        } else {
            EndReasonData {
                reason: EndReason::UnblockMuxChange,
                forced: true,
            }
        }
    }
}


fn simulated_run_info(seed: u64) -> RunInfoData {
    RunInfoData {
        acquisition_id: format!("simulated_{:08x}", seed),
        acquisition_start_time_ms: 1_700_000_000_000,
        adc_min: -4096,
        adc_max: 4095,
        flow_cell_id: "FSIM0001".to_string(),
        protocol_name: "simulated_sequencing".to_string(),
        sample_id: "synthetic_sample".to_string(),
        sample_rate: 4000,
        sequencing_kit: "sqk-sim001".to_string(),
        software: DEFAULT_SOFTWARE_NAME.to_string(),
    }
}
