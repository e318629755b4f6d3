//! Fixed 54-byte archive header.
//!
//! All integer fields are little-endian.  Section positions are absolute
//! offsets from the start of the archive, not from the end of the header.
//!
//! | offset | size | field                 |
//! |--------|------|-----------------------|
//! | 0      | 9    | magic                 |
//! | 9      | 1    | format_version        |
//! | 10     | 8    | index_length (i64)    |
//! | 18     | 8    | index_pos (i64)       |
//! | 26     | 8    | storage_info_length   |
//! | 34     | 8    | storage_info_pos      |
//! | 42     | 12   | storage_info_type     |

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

pub const HEADER_SIZE: usize = 54;
pub const MAGIC_LEN: usize = 9;
pub const STORAGE_TYPE_LEN: usize = 12;

/// Start bytes written by the reference archiver.  Never checked by the
/// rewriter, which copies whatever magic it finds.
pub const CLIP_MAGIC: [u8; MAGIC_LEN] = [0x89, 0x43, 0x4C, 0x49, 0x50, 0x0D, 0x0A, 0x1A, 0x0A];
pub const FORMAT_VERSION: u8 = 0x01;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("header truncated: need {HEADER_SIZE} bytes, got {available}")]
    Truncated { available: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── StorageTypeTag ───────────────────────────────────────────────────────────

/// NUL-padded ASCII tag naming the storage descriptor variant.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StorageTypeTag(pub [u8; STORAGE_TYPE_LEN]);

impl StorageTypeTag {
    /// Returns `None` if `name` does not fit in 12 bytes.
    pub fn from_name(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > STORAGE_TYPE_LEN {
            return None;
        }
        let mut raw = [0u8; STORAGE_TYPE_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Some(Self(raw))
    }

    /// Tag text with NUL bytes stripped from both ends.  Non-UTF-8 tags are
    /// rendered lossily; they never match a registered variant anyway.
    pub fn name(&self) -> String {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(STORAGE_TYPE_LEN);
        let end = self.0.iter().rposition(|&b| b != 0).map_or(start, |i| i + 1);
        String::from_utf8_lossy(&self.0[start..end]).into_owned()
    }
}

impl fmt::Debug for StorageTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageTypeTag({:?})", self.name())
    }
}

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Index,
    StorageInfo,
}

impl SectionKind {
    pub const ALL: [SectionKind; 2] = [SectionKind::Index, SectionKind::StorageInfo];

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Index       => "index",
            SectionKind::StorageInfo => "storage-info",
        }
    }
}

/// A byte range inside the archive as recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub pos: i64,
    pub len: i64,
}

impl Section {
    /// End offset, or `None` on overflow.
    pub fn end(&self) -> Option<i64> {
        self.pos.checked_add(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{section} section has negative bounds (pos {pos}, len {len})")]
    Negative { section: &'static str, pos: i64, len: i64 },
    #[error("{section} section [{pos}, +{len}) overlaps the header")]
    InsideHeader { section: &'static str, pos: i64, len: i64 },
    #[error("{section} section [{pos}, +{len}) exceeds archive length {total}")]
    OutOfBounds { section: &'static str, pos: i64, len: i64, total: u64 },
    #[error("{a} and {b} sections overlap")]
    Overlap { a: &'static str, b: &'static str },
}

// ── ArchiveHeader ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: [u8; MAGIC_LEN],
    pub format_version: u8,
    pub index_length: i64,
    pub index_pos: i64,
    pub storage_info_length: i64,
    pub storage_info_pos: i64,
    pub storage_info_type: StorageTypeTag,
}

impl ArchiveHeader {
    pub fn new(storage_info_type: StorageTypeTag) -> Self {
        Self {
            magic: CLIP_MAGIC,
            format_version: FORMAT_VERSION,
            index_length: 0,
            index_pos: 0,
            storage_info_length: 0,
            storage_info_pos: 0,
            storage_info_type,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u8(self.format_version)?;
        writer.write_i64::<LittleEndian>(self.index_length)?;
        writer.write_i64::<LittleEndian>(self.index_pos)?;
        writer.write_i64::<LittleEndian>(self.storage_info_length)?;
        writer.write_i64::<LittleEndian>(self.storage_info_pos)?;
        writer.write_all(&self.storage_info_type.0)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; MAGIC_LEN];
        reader.read_exact(&mut magic)?;
        let format_version = reader.read_u8()?;
        let index_length = reader.read_i64::<LittleEndian>()?;
        let index_pos = reader.read_i64::<LittleEndian>()?;
        let storage_info_length = reader.read_i64::<LittleEndian>()?;
        let storage_info_pos = reader.read_i64::<LittleEndian>()?;
        let mut tag = [0u8; STORAGE_TYPE_LEN];
        reader.read_exact(&mut tag)?;
        Ok(Self {
            magic,
            format_version,
            index_length,
            index_pos,
            storage_info_length,
            storage_info_pos,
            storage_info_type: StorageTypeTag(tag),
        })
    }

    /// Decode from the first 54 bytes of `bytes`; trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_SIZE {
            return Err(HeaderError::Truncated { available: bytes.len() });
        }
        Self::read(&bytes[..HEADER_SIZE])
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..9].copy_from_slice(&self.magic);
        buf[9] = self.format_version;
        LittleEndian::write_i64(&mut buf[10..18], self.index_length);
        LittleEndian::write_i64(&mut buf[18..26], self.index_pos);
        LittleEndian::write_i64(&mut buf[26..34], self.storage_info_length);
        LittleEndian::write_i64(&mut buf[34..42], self.storage_info_pos);
        buf[42..54].copy_from_slice(&self.storage_info_type.0);
        buf
    }

    pub fn section(&self, kind: SectionKind) -> Section {
        match kind {
            SectionKind::Index => Section { pos: self.index_pos, len: self.index_length },
            SectionKind::StorageInfo => Section {
                pos: self.storage_info_pos,
                len: self.storage_info_length,
            },
        }
    }

    pub fn set_section(&mut self, kind: SectionKind, section: Section) {
        match kind {
            SectionKind::Index => {
                self.index_pos = section.pos;
                self.index_length = section.len;
            }
            SectionKind::StorageInfo => {
                self.storage_info_pos = section.pos;
                self.storage_info_length = section.len;
            }
        }
    }

    /// Check every non-empty section against `total_len` and against each
    /// other.  Empty sections are only required to be non-negative.
    pub fn validate_layout(&self, total_len: u64) -> Result<(), LayoutError> {
        for kind in SectionKind::ALL {
            let s = self.section(kind);
            check_section(kind, s, total_len)?;
        }
        for (i, a) in SectionKind::ALL.iter().enumerate() {
            for b in &SectionKind::ALL[i + 1..] {
                if overlaps(self.section(*a), self.section(*b)) {
                    return Err(LayoutError::Overlap { a: a.name(), b: b.name() });
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn check_section(kind: SectionKind, s: Section, total_len: u64) -> Result<(), LayoutError> {
    let section = kind.name();
    if s.pos < 0 || s.len < 0 {
        return Err(LayoutError::Negative { section, pos: s.pos, len: s.len });
    }
    if s.is_empty() {
        return Ok(());
    }
    if s.pos < HEADER_SIZE as i64 {
        return Err(LayoutError::InsideHeader { section, pos: s.pos, len: s.len });
    }
    match s.end() {
        Some(end) if end as u64 <= total_len => Ok(()),
        _ => Err(LayoutError::OutOfBounds { section, pos: s.pos, len: s.len, total: total_len }),
    }
}

pub(crate) fn overlaps(a: Section, b: Section) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    match (a.end(), b.end()) {
        (Some(a_end), Some(b_end)) => a.pos < b_end && b.pos < a_end,
        _ => true,
    }
}
