use clap::{Parser, Subcommand};
use clipshift::archive::read_archive_info;
use clipshift::config::MigrateConfig;
use clipshift::migrate::{MigrateOptions, Migrator};
use clipshift::storage_info::StorageInfo;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clipshift", about = "Repoint .clip archives at a new storage backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite archives from the source bucket into the target bucket
    Migrate {
        /// Archive keys to migrate
        keys: Vec<String>,
        /// JSON file with `source` and `target` bucket configuration
        #[arg(short, long)]
        config: PathBuf,
        /// Read additional keys from a file, one per line
        #[arg(long)]
        keys_from: Option<PathBuf>,
        /// Concurrent migrations (overrides the config file)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Retries after a transient failure (overrides the config file)
        #[arg(short, long)]
        retries: Option<u32>,
        /// Do everything except the upload
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the header and storage descriptor of a local archive file
    Inspect {
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipshift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse().command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Commands) -> Result<bool, Box<dyn std::error::Error>> {
    match command {

        // ── Migrate ──────────────────────────────────────────────────────────
        Commands::Migrate { mut keys, config, keys_from, workers, retries, dry_run } => {
            let cfg = MigrateConfig::from_file(&config)?;
            if let Some(path) = keys_from {
                let text = std::fs::read_to_string(&path)?;
                keys.extend(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));
            }
            if keys.is_empty() {
                return Err("no archive keys given".into());
            }

            let options = MigrateOptions {
                dry_run,
                retries: retries.unwrap_or(cfg.retries),
                workers: workers.unwrap_or(cfg.workers).max(1),
                ..MigrateOptions::default()
            };
            let migrator = Migrator::new(
                cfg.source.open_store()?,
                cfg.target.open_store()?,
                cfg.target.coordinates(),
            )
            .with_options(options);

            let results = migrator.migrate_all(&keys);
            let mut failed = 0usize;
            for result in &results {
                match result {
                    Ok(r) => println!(
                        "ok      {}  {} -> {} bytes (delta {:+})  blake3 {}{}",
                        r.key,
                        r.old_section_len,
                        r.new_section_len,
                        r.delta,
                        &r.digest[..16],
                        if r.uploaded { "" } else { "  [dry run]" },
                    ),
                    Err(f) => {
                        failed += 1;
                        println!("FAILED  {}  {}", f.key, f);
                    }
                }
            }
            println!("{} migrated, {} failed", results.len() - failed, failed);
            Ok(failed == 0)
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input } => {
            let bytes = std::fs::read(&input)?;
            let info = read_archive_info(&bytes)?;
            let h = &info.header;

            println!("── archive ──────────────────────────────────────────────");
            println!("  Path            {}", input.display());
            println!("  Size            {} B", info.total_len);
            println!("  Magic           {}", hex::encode(h.magic));
            println!("  Format version  {}", h.format_version);
            println!("  Index           {} B @ {}", h.index_length, h.index_pos);
            println!("  Storage info    {} B @ {}", h.storage_info_length, h.storage_info_pos);
            println!("  Storage type    {}", h.storage_info_type.name());
            match &info.storage_info {
                StorageInfo::S3(s3) => {
                    println!("  Bucket          {}", s3.bucket);
                    println!("  Region          {}", s3.region);
                    println!("  Key             {}", s3.key);
                    println!("  Endpoint        {}", s3.endpoint);
                    println!("  Path style      {}", s3.force_path_style);
                }
            }
            Ok(true)
        }
    }
}
