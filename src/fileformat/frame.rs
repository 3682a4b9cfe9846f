use std::io::Read;
use std::io::Write;

use anyhow::bail;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};


/// Table streams are a sequence of frames:
/// `[payload_len: u64 LE][kind: u8][payload]`, terminated by an End frame
/// with zero length. The kind byte keeps decoding unambiguous even for
/// streams with no batches at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    End,
    Schema,
    Batch,
    Dictionary,
}

impl FrameKind {
    fn to_u8(self) -> u8 {
        match self {
            FrameKind::End => 0,
            FrameKind::Schema => 1,
            FrameKind::Batch => 2,
            FrameKind::Dictionary => 3,
        }
    }

    fn from_u8(v: u8) -> anyhow::Result<FrameKind> {
        match v {
            0 => Ok(FrameKind::End),
            1 => Ok(FrameKind::Schema),
            2 => Ok(FrameKind::Batch),
            3 => Ok(FrameKind::Dictionary),
            other => bail!("unknown frame kind {}", other),
        }
    }
}


// Refuse to allocate for absurd lengths when reading a damaged file
const MAX_FRAME_LEN: u64 = 1 << 31;


/// Write one frame, returning the number of bytes it occupies on disk
pub fn write_frame<W: Write>(
    writer: &mut W,
    kind: FrameKind,
    payload: &[u8],
) -> anyhow::Result<u64> {
    writer.write_u64::<LittleEndian>(payload.len() as u64)?;
    writer.write_u8(kind.to_u8())?;
    writer.write_all(payload)?;
    Ok(8 + 1 + payload.len() as u64)
}

/// Write the stream terminator
pub fn write_end_frame<W: Write>(writer: &mut W) -> anyhow::Result<u64> {
    write_frame(writer, FrameKind::End, &[])
}


/// Read the next frame. The End frame comes back with an empty payload.
pub fn read_frame<R: Read>(reader: &mut R) -> anyhow::Result<(FrameKind, Vec<u8>)> {
    let len = reader.read_u64::<LittleEndian>()?;
    if len > MAX_FRAME_LEN {
        bail!("frame length {} exceeds the sane maximum", len);
    }
    let kind = FrameKind::from_u8(reader.read_u8()?)?;
    if kind == FrameKind::End && len != 0 {
        bail!("end frame carries a payload of {} bytes", len);
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    Ok((kind, payload))
}
