//! Storage descriptors: where an archive's payload object lives.
//!
//! The storage-info section holds a [`StorageInfoWrapper`] whose `data` is
//! the tagged-value encoding of one concrete descriptor.  The header's
//! `storage_info_type` names the variant; the registry in
//! [`StorageInfo::decode`] is closed, and unknown tags are rejected rather
//! than decoded on a best-effort basis.

use thiserror::Error;

use crate::codec::{self, DecodeError, FieldDef, FieldKind, FieldValue, Record, TaggedValue};
use crate::header::StorageTypeTag;

pub const STORAGE_TYPE_S3: &str = "s3";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("unsupported storage backend type {0:?}")]
    Unsupported(String),
    #[error("header names storage type {header:?} but section is tagged {wrapper:?}")]
    TagMismatch { header: String, wrapper: String },
    #[error("storage type {0:?} does not fit the 12-byte header tag")]
    TagTooLong(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

// ── Wrapper ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfoWrapper {
    pub type_tag: String,
    pub data: Vec<u8>,
}

impl TaggedValue for StorageInfoWrapper {
    const TYPE_NAME: &'static str = "StorageInfoWrapper";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("Type", FieldKind::String),
        FieldDef::new("Data", FieldKind::Bytes),
    ];

    fn field_values(&self) -> Vec<FieldValue<'_>> {
        vec![FieldValue::Str(&self.type_tag), FieldValue::Bytes(&self.data)]
    }

    fn from_record(mut record: Record) -> Result<Self, DecodeError> {
        Ok(Self {
            type_tag: record.take_string("Type")?,
            data: record.take_bytes("Data")?,
        })
    }
}

// ── Backend coordinates ──────────────────────────────────────────────────────

/// Everything about a backend a descriptor records, minus the object key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendCoordinates {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub force_path_style: bool,
}

/// A concrete descriptor variant.
pub trait Descriptor: TaggedValue {
    /// Value written to the header's `storage_info_type` and the wrapper.
    const TAG: &'static str;

    fn key(&self) -> &str;

    /// Same key, new backend.
    fn retarget(&self, target: &BackendCoordinates) -> Self;
}

// ── S3 ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct S3StorageInfo {
    pub bucket: String,
    pub region: String,
    pub key: String,
    pub endpoint: String,
    pub force_path_style: bool,
}

impl TaggedValue for S3StorageInfo {
    const TYPE_NAME: &'static str = "S3StorageInfo";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("Bucket", FieldKind::String),
        FieldDef::new("Region", FieldKind::String),
        FieldDef::new("Key", FieldKind::String),
        FieldDef::new("Endpoint", FieldKind::String),
        FieldDef::new("ForcePathStyle", FieldKind::Bool),
    ];

    fn field_values(&self) -> Vec<FieldValue<'_>> {
        vec![
            FieldValue::Str(&self.bucket),
            FieldValue::Str(&self.region),
            FieldValue::Str(&self.key),
            FieldValue::Str(&self.endpoint),
            FieldValue::Bool(self.force_path_style),
        ]
    }

    fn from_record(mut record: Record) -> Result<Self, DecodeError> {
        Ok(Self {
            bucket: record.take_string("Bucket")?,
            region: record.take_string("Region")?,
            key: record.take_string("Key")?,
            endpoint: record.take_string("Endpoint")?,
            force_path_style: record.take_bool("ForcePathStyle")?,
        })
    }
}

impl Descriptor for S3StorageInfo {
    const TAG: &'static str = STORAGE_TYPE_S3;

    fn key(&self) -> &str {
        &self.key
    }

    fn retarget(&self, target: &BackendCoordinates) -> Self {
        Self {
            bucket: target.bucket.clone(),
            region: target.region.clone(),
            key: self.key.clone(),
            endpoint: target.endpoint.clone(),
            force_path_style: target.force_path_style,
        }
    }
}

// ── StorageInfo ──────────────────────────────────────────────────────────────

/// Every descriptor variant this build understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageInfo {
    S3(S3StorageInfo),
}

impl From<S3StorageInfo> for StorageInfo {
    fn from(info: S3StorageInfo) -> Self {
        StorageInfo::S3(info)
    }
}

impl StorageInfo {
    pub fn is_supported(tag: &str) -> bool {
        matches!(tag, STORAGE_TYPE_S3)
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            StorageInfo::S3(_) => S3StorageInfo::TAG,
        }
    }

    pub fn header_tag(&self) -> Result<StorageTypeTag, DescriptorError> {
        StorageTypeTag::from_name(self.type_tag())
            .ok_or_else(|| DescriptorError::TagTooLong(self.type_tag().to_owned()))
    }

    pub fn key(&self) -> &str {
        match self {
            StorageInfo::S3(s) => s.key(),
        }
    }

    pub fn retarget(&self, target: &BackendCoordinates) -> StorageInfo {
        match self {
            StorageInfo::S3(s) => StorageInfo::S3(s.retarget(target)),
        }
    }

    /// Decode a descriptor payload for the variant named by `tag`.
    pub fn decode(tag: &str, data: &[u8]) -> Result<Self, DescriptorError> {
        match tag {
            STORAGE_TYPE_S3 => Ok(StorageInfo::S3(codec::decode(data)?)),
            other => Err(DescriptorError::Unsupported(other.to_owned())),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            StorageInfo::S3(s) => codec::encode(s),
        }
    }

    /// Decode a complete storage-info section.  The header tag is checked
    /// first so unknown variants are rejected before any payload parsing.
    pub fn from_section(tag: &StorageTypeTag, section: &[u8]) -> Result<Self, DescriptorError> {
        let header_tag = tag.name();
        if !Self::is_supported(&header_tag) {
            return Err(DescriptorError::Unsupported(header_tag));
        }
        let wrapper: StorageInfoWrapper = codec::decode(section)?;
        if wrapper.type_tag != header_tag {
            return Err(DescriptorError::TagMismatch { header: header_tag, wrapper: wrapper.type_tag });
        }
        Self::decode(&wrapper.type_tag, &wrapper.data)
    }

    /// Encode as a complete storage-info section (wrapper around payload).
    pub fn to_section(&self) -> Vec<u8> {
        let wrapper = StorageInfoWrapper {
            type_tag: self.type_tag().to_owned(),
            data: self.encode(),
        };
        codec::encode(&wrapper)
    }
}
