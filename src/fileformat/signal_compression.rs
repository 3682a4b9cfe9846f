use std::io::Read;
use std::io::Write;

use anyhow::{bail, Context};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};


/// How signal chunks are stored in the signal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalCompression {
    /// Zig-zag delta transform followed by DEFLATE
    Deflate,
    /// Little-endian i16 samples, stored as-is
    Uncompressed,
}


// Nanopore current traces move in small steps, so the deltas between
// consecutive samples are near zero. Zig-zag maps them to small unsigned
// values, which DEFLATE then packs down well.

#[inline]
fn zigzag_encode(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

#[inline]
fn zigzag_decode(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}


/// Compress one chunk of raw samples into the codec representation
pub fn compress_signal(samples: &[i16]) -> anyhow::Result<Vec<u8>> {
    let mut deltas = Vec::with_capacity(samples.len() * 4);
    let mut prev: i32 = 0;
    for s in samples {
        let delta = *s as i32 - prev;
        deltas.write_u32::<LittleEndian>(zigzag_encode(delta))?;
        prev = *s as i32;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&deltas)
        .context("could not compress signal chunk")?;
    let out = encoder.finish().context("could not compress signal chunk")?;
    Ok(out)
}


/// Decompress one chunk back into samples, validating the declared count
pub fn decompress_signal(bytes: &[u8], sample_count: usize) -> anyhow::Result<Vec<i16>> {
    let mut deltas = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut deltas)
        .context("could not decompress signal chunk")?;

    if deltas.len() != sample_count * 4 {
        bail!(
            "signal chunk declares {} samples but decompressed to {} bytes",
            sample_count,
            deltas.len()
        );
    }

    let mut samples = Vec::with_capacity(sample_count);
    let mut cursor = &deltas[..];
    let mut prev: i32 = 0;
    for _ in 0..sample_count {
        let delta = zigzag_decode(cursor.read_u32::<LittleEndian>()?);
        let value = prev
            .checked_add(delta)
            .context("corrupt signal chunk: delta overflows the sample range")?;
        if value < i16::MIN as i32 || value > i16::MAX as i32 {
            bail!("corrupt signal chunk: sample {} outside the i16 range", value);
        }
        samples.push(value as i16);
        prev = value;
    }
    Ok(samples)
}


/// The uncompressed on-disk form, for writers configured without compression
pub fn signal_to_le_bytes(samples: &[i16]) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.write_i16::<LittleEndian>(*s)?;
    }
    Ok(out)
}
