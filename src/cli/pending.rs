//! Pending-import queue commands.
//!
//! - `lessonkit pending enqueue <file>` - Hand a file off for later import
//! - `lessonkit pending list` - Show waiting files
//! - `lessonkit pending flush` - Import everything waiting

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use super::{build_importer, cancel_on_ctrl_c, print_report, progress_printer, TargetArgs};
use crate::config::ResolvedConfig;
use crate::core::SingleImport;
use crate::ingest::PendingQueue;

#[derive(Subcommand, Debug)]
pub enum PendingCommands {
    /// Copy a file into the inbox for a later flush
    Enqueue {
        path: PathBuf,

        /// Label used as the track title on import
        #[arg(short, long, default_value = "")]
        label: String,
    },

    /// List waiting files
    List {
        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Import every waiting file; failures stay queued
    Flush {
        #[command(flatten)]
        target: TargetArgs,
    },
}

pub async fn execute(cfg: &ResolvedConfig, command: PendingCommands) -> Result<()> {
    let queue = PendingQueue::open(&cfg.pending);

    match command {
        PendingCommands::Enqueue { path, label } => {
            let result = queue.enqueue(&path, &label).await?;
            if result.is_new() {
                eprintln!("Queued {} ({})", path.display(), result.id());
            } else {
                eprintln!("Already queued ({})", result.id());
            }
            Ok(())
        }
        PendingCommands::List { limit } => list(&queue, limit).await,
        PendingCommands::Flush { target } => flush(cfg, &queue, target.into()).await,
    }
}

async fn list(queue: &PendingQueue, limit: usize) -> Result<()> {
    let records = queue.drain().await?;

    if records.is_empty() {
        println!("No pending imports");
        return Ok(());
    }

    println!("{:<14} {:<30} {:<20}", "ID", "FILE", "QUEUED");
    println!("{}", "-".repeat(66));

    for record in records.iter().take(limit) {
        let file_name = if record.file_name.chars().count() > 28 {
            format!("{}...", record.file_name.chars().take(25).collect::<String>())
        } else {
            record.file_name.clone()
        };
        println!(
            "{:<14} {:<30} {:<20}",
            record.id,
            file_name,
            record.enqueued_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    if records.len() > limit {
        println!();
        println!("  (showing {} of {} items)", limit, records.len());
    }

    Ok(())
}

async fn flush(cfg: &ResolvedConfig, queue: &PendingQueue, target: SingleImport) -> Result<()> {
    let importer = build_importer(cfg)?;
    let cancel = cancel_on_ctrl_c();
    let (progress, printer) = progress_printer();

    let result = importer
        .import_pending(queue, &target, &progress, &cancel)
        .await;
    drop(progress);
    let _ = printer.await;

    print_report(&result?);
    Ok(())
}
