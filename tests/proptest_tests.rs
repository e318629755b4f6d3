//! Property-based tests using proptest.
//!
//! These check the header codec, the descriptor codec and the splice engine
//! against randomly generated layouts and values.

use clipshift::codec;
use clipshift::header::{ArchiveHeader, SectionKind, StorageTypeTag, HEADER_SIZE};
use clipshift::splice::splice_section;
use clipshift::storage_info::{S3StorageInfo, StorageInfo};
use proptest::prelude::*;

fn header_strategy() -> impl Strategy<Value = ArchiveHeader> {
    (
        any::<[u8; 9]>(),
        any::<u8>(),
        any::<[i64; 4]>(),
        any::<[u8; 12]>(),
    )
        .prop_map(|(magic, format_version, n, tag)| ArchiveHeader {
            magic,
            format_version,
            index_length: n[0],
            index_pos: n[1],
            storage_info_length: n[2],
            storage_info_pos: n[3],
            storage_info_type: StorageTypeTag(tag),
        })
}

fn descriptor_strategy() -> impl Strategy<Value = S3StorageInfo> {
    (".{0,40}", ".{0,20}", ".{0,80}", ".{0,60}", any::<bool>()).prop_map(
        |(bucket, region, key, endpoint, force_path_style)| S3StorageInfo {
            bucket,
            region,
            key,
            endpoint,
            force_path_style,
        },
    )
}

proptest! {
    /// Any 54-byte header survives encode/decode unchanged.
    #[test]
    fn header_roundtrip(h in header_strategy()) {
        let bytes = h.to_bytes();
        prop_assert_eq!(ArchiveHeader::from_bytes(&bytes).unwrap(), h);
    }

    /// Descriptors survive the codec, including empty and non-ASCII fields.
    #[test]
    fn descriptor_roundtrip(info in descriptor_strategy()) {
        let decoded: S3StorageInfo = codec::decode(&codec::encode(&info)).unwrap();
        prop_assert_eq!(&decoded, &info);

        let wrapped = StorageInfo::S3(info);
        let tag = StorageTypeTag::from_name("s3").unwrap();
        prop_assert_eq!(StorageInfo::from_section(&tag, &wrapped.to_section()).unwrap(), wrapped);
    }

    /// The decoder rejects garbage with an error, never a panic.
    #[test]
    fn decode_arbitrary_bytes_does_not_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = codec::decode_record(&bytes);
    }

    /// After a splice the header describes the output exactly: sections in
    /// bounds, disjoint, and holding the expected bytes.
    #[test]
    fn splice_keeps_layout_consistent(
        lead in proptest::collection::vec(any::<u8>(), 0..16),
        index in proptest::collection::vec(any::<u8>(), 1..64),
        gap in proptest::collection::vec(any::<u8>(), 0..16),
        old in proptest::collection::vec(any::<u8>(), 0..64),
        tail in proptest::collection::vec(any::<u8>(), 0..16),
        replacement in proptest::collection::vec(any::<u8>(), 0..128),
        storage_first in any::<bool>(),
    ) {
        let mut header = ArchiveHeader::new(StorageTypeTag::from_name("s3").unwrap());
        let mut body = lead.clone();
        let (first, second) = if storage_first { (&old, &index) } else { (&index, &old) };

        let first_pos = (HEADER_SIZE + body.len()) as i64;
        body.extend_from_slice(first);
        body.extend_from_slice(&gap);
        let second_pos = (HEADER_SIZE + body.len()) as i64;
        body.extend_from_slice(second);
        body.extend_from_slice(&tail);

        let (index_pos, storage_pos) = if storage_first { (second_pos, first_pos) } else { (first_pos, second_pos) };
        header.index_pos = index_pos;
        header.index_length = index.len() as i64;
        header.storage_info_pos = storage_pos;
        header.storage_info_length = old.len() as i64;

        let mut archive = header.to_bytes().to_vec();
        archive.extend_from_slice(&body);

        let out = splice_section(&archive, &header, SectionKind::StorageInfo, &replacement).unwrap();
        let h = &out.header;

        prop_assert_eq!(out.bytes.len() as i64, archive.len() as i64 + out.delta);
        prop_assert_eq!(ArchiveHeader::from_bytes(&out.bytes).unwrap(), h.clone());
        prop_assert!(h.validate_layout(out.bytes.len() as u64).is_ok());

        let idx = &out.bytes[h.index_pos as usize..(h.index_pos + h.index_length) as usize];
        prop_assert_eq!(idx, index.as_slice());
        let desc = &out.bytes[h.storage_info_pos as usize..(h.storage_info_pos + h.storage_info_length) as usize];
        prop_assert_eq!(desc, replacement.as_slice());
        prop_assert!(out.bytes.ends_with(&tail));
        prop_assert_eq!(&out.bytes[HEADER_SIZE..HEADER_SIZE + lead.len()], lead.as_slice());
    }
}
