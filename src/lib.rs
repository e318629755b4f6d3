pub mod header;
pub mod codec;
pub mod storage_info;
pub mod splice;
pub mod archive;
pub mod store;
pub mod config;
pub mod migrate;

pub use header::{ArchiveHeader, SectionKind, StorageTypeTag, HEADER_SIZE};
pub use codec::{decode, encode, DecodeError, TaggedValue};
pub use storage_info::{BackendCoordinates, S3StorageInfo, StorageInfo};
pub use splice::{splice_section, SpliceError, Spliced};
pub use store::{LocalStore, MemoryStore, ObjectStore, StoreError};
pub use config::{BucketConfig, MigrateConfig};
pub use migrate::{MigrateError, MigrateOptions, MigrationFailure, MigrationReport, MigrationState, Migrator};
