use clipshift::header::{ArchiveHeader, LayoutError, SectionKind, StorageTypeTag, HEADER_SIZE};
use clipshift::splice::{splice_section, SpliceError};

/// Lay out `regions` after the header, recording the index and storage
/// sections at the given region numbers.
fn layout(regions: &[&[u8]], index: usize, storage: usize) -> (ArchiveHeader, Vec<u8>) {
    let mut header = ArchiveHeader::new(StorageTypeTag::from_name("s3").unwrap());
    let mut body = Vec::new();
    for (i, region) in regions.iter().enumerate() {
        let pos = (HEADER_SIZE + body.len()) as i64;
        let len = region.len() as i64;
        if i == index {
            header.index_pos = pos;
            header.index_length = len;
        }
        if i == storage {
            header.storage_info_pos = pos;
            header.storage_info_length = len;
        }
        body.extend_from_slice(region);
    }
    let mut archive = header.to_bytes().to_vec();
    archive.extend_from_slice(&body);
    (header, archive)
}

fn slice_of(bytes: &[u8], pos: i64, len: i64) -> &[u8] {
    &bytes[pos as usize..(pos + len) as usize]
}

#[test]
fn test_grow_trailing_section() {
    let (header, archive) = layout(&[b"INDEX-BYTES", b"old"], 0, 1);
    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"much longer descriptor").unwrap();

    assert_eq!(out.delta, 22 - 3);
    assert_eq!(out.bytes.len(), archive.len() + 19);
    assert_eq!(out.header.index_pos, header.index_pos);
    assert_eq!(out.header.storage_info_pos, header.storage_info_pos);
    assert_eq!(out.header.storage_info_length, 22);
    assert_eq!(ArchiveHeader::from_bytes(&out.bytes).unwrap(), out.header);
    assert_eq!(slice_of(&out.bytes, out.header.index_pos, out.header.index_length), b"INDEX-BYTES");
    assert!(out.bytes.ends_with(b"much longer descriptor"));
}

#[test]
fn test_shrink_trailing_section() {
    let (header, archive) = layout(&[b"idx", b"a fairly long old section"], 0, 1);
    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"tiny").unwrap();
    assert_eq!(out.delta, 4 - 25);
    assert_eq!(out.bytes.len(), HEADER_SIZE + 3 + 4);
    assert!(out.bytes.ends_with(b"idxtiny"));
}

#[test]
fn test_following_section_is_shifted() {
    let (header, archive) = layout(&[b"descriptor", b"the index", b"tail"], 1, 0);
    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"d").unwrap();

    assert_eq!(out.header.storage_info_pos, HEADER_SIZE as i64);
    assert_eq!(out.header.index_pos, header.index_pos - 9);
    assert_eq!(slice_of(&out.bytes, out.header.index_pos, out.header.index_length), b"the index");
    assert_eq!(&out.bytes[HEADER_SIZE..], b"dthe indextail");
    out.header.validate_layout(out.bytes.len() as u64).unwrap();
}

#[test]
fn test_unaddressed_regions_are_preserved() {
    let (header, archive) = layout(&[b"gap-before", b"index", b"gap-mid", b"desc", b"gap-after"], 1, 3);
    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"DESCRIPTOR").unwrap();
    assert_eq!(&out.bytes[HEADER_SIZE..], b"gap-beforeindexgap-midDESCRIPTORgap-after");
    assert_eq!(out.header.index_pos, header.index_pos);
}

#[test]
fn test_same_length_replacement_keeps_layout() {
    let (header, archive) = layout(&[b"index", b"abcd"], 0, 1);
    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"wxyz").unwrap();
    assert_eq!(out.delta, 0);
    assert_eq!(out.header, header);
    assert_eq!(&out.bytes[..HEADER_SIZE], &archive[..HEADER_SIZE]);
}

#[test]
fn test_index_can_be_spliced_too() {
    let (header, archive) = layout(&[b"index", b"descriptor"], 0, 1);
    let out = splice_section(&archive, &header, SectionKind::Index, b"bigger index").unwrap();
    assert_eq!(out.header.index_length, 12);
    assert_eq!(out.header.storage_info_pos, header.storage_info_pos + 7);
    assert!(out.bytes.ends_with(b"bigger indexdescriptor"));
}

#[test]
fn test_empty_section_at_origin_is_placed_after_header() {
    let (mut header, _) = layout(&[b"index"], 0, usize::MAX);
    header.storage_info_pos = 0;
    header.storage_info_length = 0;
    let mut archive = header.to_bytes().to_vec();
    archive.extend_from_slice(b"index");

    let out = splice_section(&archive, &header, SectionKind::StorageInfo, b"new").unwrap();
    assert_eq!(out.header.storage_info_pos, HEADER_SIZE as i64);
    assert_eq!(out.header.index_pos, HEADER_SIZE as i64 + 3);
    assert_eq!(&out.bytes[HEADER_SIZE..], b"newindex");
}

#[test]
fn test_section_past_end_rejected() {
    let (mut header, archive) = layout(&[b"index", b"desc"], 0, 1);
    header.storage_info_length = 100;
    let err = splice_section(&archive, &header, SectionKind::StorageInfo, b"x").unwrap_err();
    assert!(matches!(
        err,
        SpliceError::InvalidTarget { source: LayoutError::OutOfBounds { .. }, .. }
    ));
}

#[test]
fn test_section_inside_header_rejected() {
    let (mut header, archive) = layout(&[b"index", b"desc"], 0, 1);
    header.storage_info_pos = 10;
    let err = splice_section(&archive, &header, SectionKind::StorageInfo, b"x").unwrap_err();
    assert!(matches!(
        err,
        SpliceError::InvalidTarget { source: LayoutError::InsideHeader { .. }, .. }
    ));
}

#[test]
fn test_negative_length_rejected() {
    let (mut header, archive) = layout(&[b"index", b"desc"], 0, 1);
    header.storage_info_length = -4;
    let err = splice_section(&archive, &header, SectionKind::StorageInfo, b"x").unwrap_err();
    assert!(matches!(
        err,
        SpliceError::InvalidTarget { source: LayoutError::Negative { .. }, .. }
    ));
}

#[test]
fn test_overlapping_sections_rejected() {
    let (mut header, archive) = layout(&[b"0123456789", b"desc"], 0, 1);
    header.storage_info_pos = header.index_pos + 5;
    header.storage_info_length = 6;
    let err = splice_section(&archive, &header, SectionKind::StorageInfo, b"x").unwrap_err();
    assert_eq!(err, SpliceError::Overlap { target: "storage-info", other: "index" });
}

#[test]
fn test_archive_shorter_than_header() {
    let header = ArchiveHeader::new(StorageTypeTag::from_name("s3").unwrap());
    let err = splice_section(&[0u8; 30], &header, SectionKind::StorageInfo, b"x").unwrap_err();
    assert_eq!(err, SpliceError::ArchiveTooShort(30));
}
