use std::io::{Read, Seek, SeekFrom, Write};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use const_format::concatcp;
use lazy_static::lazy_static;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::table::TableSummary;


/// Eight byte signature opening and closing every combined file
pub const FILE_SIGNATURE: [u8; 8] = *b"\x8bPOD\r\n\x1a\n";

/// Sections align to this boundary before a marker or the footer
pub const SECTION_ALIGNMENT: u64 = 8;

/// Version stamp recorded in schemas and the footer
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded when the caller does not set one
pub const DEFAULT_SOFTWARE_NAME: &str = concatcp!("pod5-rs ", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref SUPPORTED_FORMAT_VERSIONS: VersionReq = VersionReq::parse("^0.2").unwrap();
}

pub fn check_format_version(version: &str) -> Result<()> {
    let parsed = Version::parse(version)
        .with_context(|| format!("unparseable format version '{}'", version))?;
    if !SUPPORTED_FORMAT_VERSIONS.matches(&parsed) {
        bail!(
            "unsupported format version '{}', this build reads {}",
            version,
            *SUPPORTED_FORMAT_VERSIONS
        );
    }
    Ok(())
}


///////////////////////////////
/// Identity of one file, recorded in the footer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub file_identifier: Uuid,
    pub software: String,
    pub format_version: String,
}

/// Placement of one table's byte range inside a combined file
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SectionInfo {
    pub offset: u64,
    pub length: u64,
    pub summary: TableSummary,
}

/// Trailer of a combined file, pointing at both embedded tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFooter {
    pub info: FileInfo,
    pub signal: SectionInfo,
    pub reads: SectionInfo,
}


///////////////////////////////
/// Signature plus section marker that open a combined file. Returns the
/// number of bytes written.
pub fn write_combined_header<W: Write>(writer: &mut W, file_identifier: &Uuid) -> Result<u64> {
    writer.write_all(&FILE_SIGNATURE)?;
    writer.write_all(file_identifier.as_bytes())?;
    Ok(FILE_SIGNATURE.len() as u64 + 16)
}

/// Zero-fill from the given position up to the next section boundary.
/// Returns the position after padding.
pub fn pad_to_boundary<W: Write>(writer: &mut W, position: u64) -> Result<u64> {
    let misaligned = position % SECTION_ALIGNMENT;
    if misaligned == 0 {
        return Ok(position);
    }
    let padding = SECTION_ALIGNMENT - misaligned;
    let zeros = [0u8; SECTION_ALIGNMENT as usize];
    writer.write_all(&zeros[..padding as usize])?;
    Ok(position + padding)
}

/// Section marker: the file identifier repeated at each section edge
pub fn write_section_marker<W: Write>(writer: &mut W, file_identifier: &Uuid) -> Result<u64> {
    writer.write_all(file_identifier.as_bytes())?;
    Ok(16)
}

/// Footer, its length and the closing signature. Always the last bytes
/// of a combined file.
pub fn write_footer<W: Write>(writer: &mut W, footer: &FileFooter) -> Result<u64> {
    let payload = bincode::serialize(footer)?;
    writer.write_all(&payload)?;
    writer.write_u64::<LittleEndian>(payload.len() as u64)?;
    writer.write_all(&FILE_SIGNATURE)?;
    Ok(payload.len() as u64 + 8 + FILE_SIGNATURE.len() as u64)
}


///////////////////////////////
/// Check the 8 opening bytes of a combined file
pub fn check_file_signature<R: Read>(reader: &mut R) -> Result<()> {
    let mut opening = [0u8; 8];
    reader
        .read_exact(&mut opening)
        .context("file too short to hold a signature")?;
    if opening != FILE_SIGNATURE {
        bail!("file signature mismatch, not a pod5 container");
    }
    Ok(())
}

/// Check one section marker against the file identifier
pub fn check_section_marker<R: Read>(reader: &mut R, file_identifier: &Uuid) -> Result<()> {
    let mut marker = [0u8; 16];
    reader
        .read_exact(&mut marker)
        .context("file too short to hold a section marker")?;
    if &marker != file_identifier.as_bytes() {
        bail!("section marker does not match the file identifier");
    }
    Ok(())
}

/// Check that a section is followed by zero padding up to the next
/// boundary and then by the section marker
pub fn check_section_trailer<R: Read + Seek>(
    file: &mut R,
    section: &SectionInfo,
    file_identifier: &Uuid,
) -> Result<()> {
    let end = section.offset + section.length;
    file.seek(SeekFrom::Start(end))?;
    let misaligned = end % SECTION_ALIGNMENT;
    if misaligned != 0 {
        let mut padding = [0u8; SECTION_ALIGNMENT as usize];
        let padding = &mut padding[..(SECTION_ALIGNMENT - misaligned) as usize];
        file.read_exact(padding)
            .context("file too short to hold section padding")?;
        if padding.iter().any(|byte| *byte != 0) {
            bail!("nonzero padding after a section");
        }
    }
    check_section_marker(file, file_identifier)
}

/// Locate and decode the trailer of a combined file
pub fn parse_footer<R: Read + Seek>(file: &mut R) -> Result<FileFooter> {
    let file_length = file.seek(SeekFrom::End(0))?;
    let trailer = 8 + FILE_SIGNATURE.len() as u64;
    if file_length < FILE_SIGNATURE.len() as u64 + trailer {
        bail!("file too short to hold a footer");
    }

    file.seek(SeekFrom::End(-(FILE_SIGNATURE.len() as i64)))?;
    let mut closing = [0u8; 8];
    file.read_exact(&mut closing)?;
    if closing != FILE_SIGNATURE {
        bail!("closing signature mismatch, file is truncated or not a pod5 container");
    }

    file.seek(SeekFrom::End(-(trailer as i64)))?;
    let footer_length = file.read_u64::<LittleEndian>()?;
    if footer_length > file_length - trailer {
        bail!("footer length {} exceeds the file", footer_length);
    }

    file.seek(SeekFrom::End(-((trailer + footer_length) as i64)))?;
    let mut payload = vec![0u8; footer_length as usize];
    file.read_exact(&mut payload)?;
    let footer: FileFooter =
        bincode::deserialize(&payload).context("footer does not deserialize")?;
    check_format_version(&footer.info.format_version)?;
    Ok(footer)
}
