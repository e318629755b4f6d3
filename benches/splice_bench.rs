use criterion::{black_box, criterion_group, criterion_main, Criterion};
use clipshift::archive::build_archive;
use clipshift::header::{ArchiveHeader, SectionKind};
use clipshift::migrate::Migrator;
use clipshift::splice::splice_section;
use clipshift::storage_info::{BackendCoordinates, S3StorageInfo, StorageInfo};
use clipshift::store::MemoryStore;

fn descriptor() -> StorageInfo {
    StorageInfo::S3(S3StorageInfo {
        bucket: "old-bkt".into(),
        region: "auto".into(),
        key: "00a9ff88327900f6.rclip".into(),
        endpoint: "https://old.example.com".into(),
        force_path_style: false,
    })
}

fn coordinates() -> BackendCoordinates {
    BackendCoordinates {
        bucket: "new-bkt".into(),
        region: "us-east-1".into(),
        endpoint: "https://new.example.com".into(),
        force_path_style: true,
    }
}

fn bench_codec(c: &mut Criterion) {
    let info = descriptor();
    let section = info.to_section();
    let tag = info.header_tag().unwrap();

    c.bench_function("descriptor_encode", |b| b.iter(|| black_box(&info).to_section()));
    c.bench_function("descriptor_decode", |b| {
        b.iter(|| StorageInfo::from_section(&tag, black_box(&section)).unwrap())
    });
}

fn bench_splice(c: &mut Criterion) {
    let index = vec![7u8; 4 * 1024 * 1024];
    let archive = build_archive(&index, &descriptor()).unwrap();
    let header = ArchiveHeader::from_bytes(&archive).unwrap();
    let replacement = descriptor().retarget(&coordinates()).to_section();

    c.bench_function("splice_4mb_index", |b| {
        b.iter(|| {
            splice_section(black_box(&archive), &header, SectionKind::StorageInfo, &replacement).unwrap()
        })
    });
}

fn bench_migrate(c: &mut Criterion) {
    let index = vec![7u8; 1024 * 1024];
    let source = MemoryStore::new("old-bkt");
    source.insert("bench.clip", build_archive(&index, &descriptor()).unwrap());
    let migrator = Migrator::new(source, MemoryStore::new("new-bkt"), coordinates());

    c.bench_function("migrate_1mb_memory", |b| b.iter(|| migrator.migrate(black_box("bench.clip")).unwrap()));
}

criterion_group!(benches, bench_codec, bench_splice, bench_migrate);
criterion_main!(benches);
