//! Whole-archive assembly and inspection.
//!
//! ```no_run
//! use clipshift::archive::{build_archive, read_archive_info};
//! use clipshift::storage_info::{S3StorageInfo, StorageInfo};
//!
//! let info = StorageInfo::S3(S3StorageInfo {
//!     bucket: "images".into(),
//!     key: "00a9ff88327900f6.rclip".into(),
//!     ..Default::default()
//! });
//! let bytes = build_archive(b"opaque index bytes", &info)?;
//! let parsed = read_archive_info(&bytes)?;
//! assert_eq!(parsed.storage_info, info);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

use crate::header::{ArchiveHeader, HeaderError, LayoutError, SectionKind, CLIP_MAGIC, FORMAT_VERSION, HEADER_SIZE};
use crate::storage_info::{DescriptorError, StorageInfo};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Parsed view of an archive's header and storage descriptor.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub header: ArchiveHeader,
    pub storage_info: StorageInfo,
    pub total_len: u64,
}

impl ArchiveInfo {
    pub fn index_range(&self) -> std::ops::Range<usize> {
        let s = self.header.section(SectionKind::Index);
        s.pos as usize..(s.pos + s.len) as usize
    }
}

/// Lay out a complete archive with the standard magic and version: header,
/// index at offset 54, storage info immediately after the index.
pub fn build_archive(index: &[u8], storage_info: &StorageInfo) -> Result<Vec<u8>, ArchiveError> {
    build_archive_with(CLIP_MAGIC, FORMAT_VERSION, index, storage_info)
}

pub fn build_archive_with(
    magic: [u8; 9],
    format_version: u8,
    index: &[u8],
    storage_info: &StorageInfo,
) -> Result<Vec<u8>, ArchiveError> {
    let section = storage_info.to_section();

    let mut header = ArchiveHeader::new(storage_info.header_tag()?);
    header.magic = magic;
    header.format_version = format_version;
    header.index_pos = HEADER_SIZE as i64;
    header.index_length = index.len() as i64;
    header.storage_info_pos = header.index_pos + header.index_length;
    header.storage_info_length = section.len() as i64;

    let mut out = Vec::with_capacity(HEADER_SIZE + index.len() + section.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(index);
    out.extend_from_slice(&section);
    Ok(out)
}

/// Decode the header and storage descriptor of a complete archive, checking
/// the header's layout against the archive length first.
pub fn read_archive_info(bytes: &[u8]) -> Result<ArchiveInfo, ArchiveError> {
    let header = ArchiveHeader::from_bytes(bytes)?;
    header.validate_layout(bytes.len() as u64)?;
    let s = header.section(SectionKind::StorageInfo);
    let section = &bytes[s.pos as usize..(s.pos + s.len) as usize];
    let storage_info = StorageInfo::from_section(&header.storage_info_type, section)?;
    Ok(ArchiveInfo { header, storage_info, total_len: bytes.len() as u64 })
}
