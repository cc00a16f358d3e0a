//! Command-line interface for lessonkit.
//!
//! Provides commands for importing bundles, manifests, files, URLs and
//! recordings, flushing the pending-import queue, and browsing the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapters::{AcquisitionAdapters, LoftyProber, RemoteAcquirer};
use crate::config::{self, paths, ResolvedConfig};
use crate::core::{ImportError, ImportProgress, ImportReport, Importer, ProgressReporter, SingleImport};
use crate::domain::Track;
use crate::library::FileLibrary;

pub mod library;
pub mod pending;

/// lessonkit - Deterministic audio-lesson importer
#[derive(Parser, Debug)]
#[command(name = "lessonkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import an embedded bundle (a directory holding manifest.json)
    ImportBundle {
        /// Bundle directory, or a bundle name under the assets directory
        bundle: String,
    },

    /// Fetch a remote manifest and import every track in it
    ImportManifest {
        /// Manifest URL (http or https)
        url: String,
    },

    /// Import a local audio or video file
    ImportFile {
        path: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Download and import an audio URL
    ImportUrl {
        url: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Import a microphone recording
    ImportRecording {
        path: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Manage the pending-import queue
    Pending {
        #[command(subcommand)]
        command: pending::PendingCommands,
    },

    /// Browse and edit the library
    Library {
        #[command(subcommand)]
        command: library::LibraryCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Where a single-source import lands
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Pack title (defaults to the configured default pack)
    #[arg(short, long)]
    pub pack: Option<String>,

    /// Track title (derived from the file name if not specified)
    #[arg(long)]
    pub title: Option<String>,

    /// Language code, e.g. "es" or "ja-JP"
    #[arg(short, long)]
    pub language: Option<String>,

    /// Tags to apply (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,
}

impl From<TargetArgs> for SingleImport {
    fn from(args: TargetArgs) -> Self {
        Self {
            pack_title: args.pack,
            title: args.title,
            language_code: args.language,
            tags: parse_tags(args.tags.as_deref()),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        match self.command {
            Commands::ImportBundle { bundle } => import_bundle(cfg, &bundle).await,
            Commands::ImportManifest { url } => import_manifest(cfg, &url).await,
            Commands::ImportFile { path, target } => {
                let importer = build_importer(cfg)?;
                run_single(|progress, cancel| async move {
                    importer.import_file(&path, &target.into(), &progress, &cancel).await
                })
                .await
            }
            Commands::ImportUrl { url, target } => {
                let importer = build_importer(cfg)?;
                run_single(|progress, cancel| async move {
                    importer.import_url(&url, &target.into(), &progress, &cancel).await
                })
                .await
            }
            Commands::ImportRecording { path, target } => {
                let importer = build_importer(cfg)?;
                run_single(|progress, cancel| async move {
                    importer
                        .import_recording(&path, &target.into(), &progress, &cancel)
                        .await
                })
                .await
            }
            Commands::Pending { command } => pending::execute(cfg, command).await,
            Commands::Library { command } => library::execute(cfg, command).await,
            Commands::Config => show_config(cfg),
        }
    }
}

/// Wire the standard adapters, prober and library for `cfg`
pub(crate) fn build_importer(cfg: &ResolvedConfig) -> Result<Importer> {
    let remote = Arc::new(
        RemoteAcquirer::new(
            paths::staging_dir(cfg),
            &cfg.import.user_agent,
            cfg.import.download_timeout(),
        )
        .context("Failed to create HTTP client")?,
    );
    let adapters = AcquisitionAdapters::standard(remote.clone());
    let library = Arc::new(FileLibrary::open(&cfg.library));

    Ok(
        Importer::new(library, adapters, remote, Arc::new(LoftyProber::new()))
            .with_settings(cfg.import_settings()),
    )
}

/// Cancellation token tripped by Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling import...");
            trigger.cancel();
        }
    });
    cancel
}

/// Progress reporter printing to stderr, plus the printer task.
///
/// The printer ends once every clone of the reporter is dropped.
pub(crate) fn progress_printer() -> (ProgressReporter, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ImportProgress>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            eprintln!("[{:>3.0}%] {}", update.fraction * 100.0, update.message);
        }
    });
    (ProgressReporter::new(tx), printer)
}

async fn run_single<F, Fut>(import: F) -> Result<()>
where
    F: FnOnce(ProgressReporter, CancellationToken) -> Fut,
    Fut: std::future::Future<Output = Result<Track, ImportError>>,
{
    let cancel = cancel_on_ctrl_c();
    let (progress, printer) = progress_printer();

    let result = import(progress, cancel).await;
    let _ = printer.await;

    let track = result?;
    print_track_summary(&track);
    Ok(())
}

async fn import_bundle(cfg: &ResolvedConfig, bundle: &str) -> Result<()> {
    let dir = resolve_bundle_dir(cfg, bundle)?;
    let importer = build_importer(cfg)?;
    let cancel = cancel_on_ctrl_c();
    let (progress, printer) = progress_printer();

    let result = importer.import_bundle(&dir, &progress, &cancel).await;
    drop(progress);
    let _ = printer.await;

    print_report(&result?);
    Ok(())
}

async fn import_manifest(cfg: &ResolvedConfig, url: &str) -> Result<()> {
    let importer = build_importer(cfg)?;
    let cancel = cancel_on_ctrl_c();
    let (progress, printer) = progress_printer();

    let result = importer.import_manifest_url(url, &progress, &cancel).await;
    drop(progress);
    let _ = printer.await;

    print_report(&result?);
    Ok(())
}

/// A path to a bundle directory, or a bundle name under the assets directory
fn resolve_bundle_dir(cfg: &ResolvedConfig, bundle: &str) -> Result<PathBuf> {
    let direct = Path::new(bundle);
    if direct.is_dir() {
        return Ok(direct.to_path_buf());
    }

    let named = paths::bundle_dir(cfg, bundle);
    if named.is_dir() {
        return Ok(named);
    }

    anyhow::bail!(
        "Bundle '{}' not found. Looked for:\n  - {}\n  - {}",
        bundle,
        direct.display(),
        named.display()
    )
}

pub(crate) fn print_report(report: &ImportReport) {
    eprintln!();
    eprintln!(
        "Imported {} track(s), skipped {}",
        report.committed.len(),
        report.skipped.len()
    );
    for track in &report.committed {
        println!("{}  {}", track.id, track.title);
    }
    for skipped in &report.skipped {
        warn!(track = %skipped.title, reason = %skipped.reason, "Skipped");
        eprintln!("  skipped '{}': {}", skipped.title, skipped.reason);
    }
}

fn print_track_summary(track: &Track) {
    eprintln!();
    eprintln!("Imported '{}'", track.title);
    eprintln!("   ID:       {}", track.id);
    eprintln!("   Pack:     {}", track.pack_id);
    eprintln!("   Duration: {}", format_duration(track.duration_ms));
    eprintln!("   File:     {}", track.local_path.display());
    println!("{}", track.id);
}

/// `m:ss` (or `h:mm:ss`) from milliseconds
pub(crate) fn format_duration(ms: u64) -> String {
    let total = ms / 1000;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub(crate) fn parse_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("lessonkit configuration");
    println!("═══════════════════════════════════════════════");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Library:  {}", cfg.library.display());
    println!("  Catalog:  {}", paths::catalog_file(cfg).display());
    println!("  Assets:   {}", cfg.assets.display());
    println!("  Pending:  {}", paths::pending_log(cfg).display());
    println!("  Inbox:    {}", paths::pending_inbox(cfg).display());
    println!("  Staging:  {}", paths::staging_dir(cfg).display());
    println!();
    println!("Import:");
    println!("  Default pack:       {}", cfg.import.default_pack_title);
    println!("  Fallback extension: {}", cfg.import.fallback_extension);
    println!("  User agent:         {}", cfg.import.user_agent);
    println!("  Download timeout:   {}s", cfg.import.download_timeout_seconds);

    Ok(())
}
