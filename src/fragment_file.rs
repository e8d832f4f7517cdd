//! On-disk fragment files
//!
//! Each fragment is stored as a fixed little-endian header followed by
//! `block_size` payload bytes:
//!
//! ```text
//! magic        8   "RSVFRAG\0"
//! version      1
//! index        1   fragment index in 0..k+m
//! k            1
//! m            1
//! block_size   4
//! object_size  8   length of the original object
//! checksum     4   CRC32 of the fields above (magic excluded) and the payload
//! payload      block_size
//! ```

use binrw::{BinRead, BinWrite};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FORMAT_VERSION: u8 = 1;

/// Size of the encoded header including the magic
pub const HEADER_LEN: usize = 8 + 4 + 4 + 8 + 4;

/// Extension used for fragment files
pub const FRAGMENT_EXTENSION: &str = "frag";

#[derive(Debug, Error)]
pub enum FragmentFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed fragment header: {0}")]
    Format(#[from] binrw::Error),

    #[error("Unsupported fragment format version {0}")]
    UnsupportedVersion(u8),

    #[error("Fragment {index} payload truncated: expected {expected} bytes, found {actual}")]
    Truncated {
        index: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Fragment {index} checksum mismatch: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch { index: u8, expected: u32, actual: u32 },

    #[error("Fragment parameter {0} does not fit the header field")]
    FieldOverflow(&'static str),
}

pub type Result<T> = std::result::Result<T, FragmentFileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"RSVFRAG\0")]
pub struct FragmentHeader {
    pub version: u8,
    pub index: u8,
    pub k: u8,
    pub m: u8,
    pub block_size: u32,
    pub object_size: u64,
    pub checksum: u32,
}

impl FragmentHeader {
    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }

    /// Whether two headers describe fragments of the same object
    pub fn same_object(&self, other: &FragmentHeader) -> bool {
        self.k == other.k
            && self.m == other.m
            && self.block_size == other.block_size
            && self.object_size == other.object_size
    }

    /// CRC32 over every header field except `checksum`, then the payload
    pub fn compute_checksum(&self, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.version, self.index, self.k, self.m]);
        hasher.update(&self.block_size.to_le_bytes());
        hasher.update(&self.object_size.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}

/// A fragment header together with its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub header: FragmentHeader,
    pub payload: Vec<u8>,
}

impl Fragment {
    /// Wrap a payload, computing its checksum
    pub fn new(index: usize, k: usize, m: usize, object_size: u64, payload: Vec<u8>) -> Result<Self> {
        let mut header = FragmentHeader {
            version: FORMAT_VERSION,
            index: u8::try_from(index).map_err(|_| FragmentFileError::FieldOverflow("index"))?,
            k: u8::try_from(k).map_err(|_| FragmentFileError::FieldOverflow("k"))?,
            m: u8::try_from(m).map_err(|_| FragmentFileError::FieldOverflow("m"))?,
            block_size: u32::try_from(payload.len())
                .map_err(|_| FragmentFileError::FieldOverflow("block_size"))?,
            object_size,
            checksum: 0,
        };
        header.checksum = header.compute_checksum(&payload);
        Ok(Self { header, payload })
    }

    pub fn index(&self) -> usize {
        self.header.index as usize
    }

    /// Read a fragment, verifying version and checksum
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let header = FragmentHeader::read(reader)?;
        if header.version != FORMAT_VERSION {
            return Err(FragmentFileError::UnsupportedVersion(header.version));
        }

        let expected = header.block_size();
        let mut payload = Vec::new();
        reader
            .by_ref()
            .take(expected as u64)
            .read_to_end(&mut payload)?;
        if payload.len() != expected {
            return Err(FragmentFileError::Truncated {
                index: header.index,
                expected,
                actual: payload.len(),
            });
        }

        let actual = header.compute_checksum(&payload);
        if actual != header.checksum {
            return Err(FragmentFileError::ChecksumMismatch {
                index: header.index,
                expected: header.checksum,
                actual,
            });
        }

        Ok(Self { header, payload })
    }

    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.header.write(writer)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// `<dir>/<stem>.<index>.frag`
pub fn fragment_path(dir: &Path, stem: &str, index: usize) -> PathBuf {
    dir.join(format!("{stem}.{index}.{FRAGMENT_EXTENSION}"))
}
