//! Section splice engine.
//!
//! Replaces one header-addressed section of an archive with new bytes of
//! any length.  Bytes before and after the section are copied verbatim; the
//! header is re-encoded with the section's new length, and every other
//! section that starts at or after the old section's end is shifted by the
//! length difference so the header keeps describing the actual layout.
//!
//! ```text
//!  before:  [hdr][.. a ..][ old ][.. b ..]
//!  after:   [hdr][.. a ..][   new   ][.. b ..]    b.pos += new.len - old.len
//! ```

use thiserror::Error;

use crate::header::{check_section, overlaps, ArchiveHeader, LayoutError, SectionKind, Section, HEADER_SIZE};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpliceError {
    #[error("archive is {0} bytes, shorter than the header")]
    ArchiveTooShort(usize),
    #[error("{section} section cannot be rewritten: {source}")]
    InvalidTarget { section: &'static str, #[source] source: LayoutError },
    #[error("{target} section overlaps the {other} section")]
    Overlap { target: &'static str, other: &'static str },
    #[error("replacement of {0} bytes does not fit an i64 length")]
    TooLarge(usize),
    #[error("{section} section offset overflows after shifting by {delta}")]
    ShiftOverflow { section: &'static str, delta: i64 },
    #[error("spliced layout is inconsistent: {0}")]
    Layout(#[from] LayoutError),
    #[error("byte range {start}-{end} lies outside the archive")]
    RangeUnavailable { start: u64, end: u64 },
    #[error("rewritten archive records key {found:?}, expected {expected:?}")]
    KeyChanged { expected: String, found: String },
}

/// Result of a splice: the rewritten archive and the header encoded into it.
#[derive(Debug, Clone)]
pub struct Spliced {
    pub header: ArchiveHeader,
    pub bytes: Vec<u8>,
    /// `new_len - old_len` for the rewritten section.
    pub delta: i64,
}

/// Replace section `target` of `archive` with `replacement`.
///
/// `header` must be the header currently encoded in `archive`.  The region
/// between the header and the section is preserved, as is everything after
/// the section.  Fails if the old section lies outside the archive, inside
/// the header, or overlaps another non-empty section.
pub fn splice_section(
    archive: &[u8],
    header: &ArchiveHeader,
    target: SectionKind,
    replacement: &[u8],
) -> Result<Spliced, SpliceError> {
    if archive.len() < HEADER_SIZE {
        return Err(SpliceError::ArchiveTooShort(archive.len()));
    }
    let total = archive.len() as u64;
    let old = header.section(target);

    check_section(target, old, total)
        .map_err(|source| SpliceError::InvalidTarget { section: target.name(), source })?;
    // An empty section recorded at offset 0 has nowhere to grow; treat it as
    // located at the end of the header instead.
    let old = if old.is_empty() && old.pos < HEADER_SIZE as i64 {
        Section { pos: HEADER_SIZE as i64, len: 0 }
    } else {
        old
    };
    if old.pos as u64 > total {
        let source = LayoutError::OutOfBounds { section: target.name(), pos: old.pos, len: old.len, total };
        return Err(SpliceError::InvalidTarget { section: target.name(), source });
    }

    for other in SectionKind::ALL.into_iter().filter(|k| *k != target) {
        if overlaps(old, header.section(other)) {
            return Err(SpliceError::Overlap { target: target.name(), other: other.name() });
        }
    }

    let new_len = i64::try_from(replacement.len()).map_err(|_| SpliceError::TooLarge(replacement.len()))?;
    let delta = new_len - old.len;
    let start = old.pos as usize;
    let end = (old.pos + old.len) as usize;

    let mut out_header = header.clone();
    out_header.set_section(target, Section { pos: old.pos, len: new_len });
    for other in SectionKind::ALL.into_iter().filter(|k| *k != target) {
        let s = header.section(other);
        if s.pos >= old.pos + old.len && !(s.is_empty() && s.pos < HEADER_SIZE as i64) {
            let pos = s.pos.checked_add(delta).ok_or(SpliceError::ShiftOverflow {
                section: other.name(),
                delta,
            })?;
            out_header.set_section(other, Section { pos, len: s.len });
        }
    }

    let mut bytes = Vec::with_capacity(archive.len() - old.len as usize + replacement.len());
    bytes.extend_from_slice(&out_header.to_bytes());
    bytes.extend_from_slice(&archive[HEADER_SIZE..start]);
    bytes.extend_from_slice(replacement);
    bytes.extend_from_slice(&archive[end..]);

    out_header.validate_layout(bytes.len() as u64)?;

    Ok(Spliced { header: out_header, bytes, delta })
}
