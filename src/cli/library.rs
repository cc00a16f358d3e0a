//! Library browsing commands.

use anyhow::{Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use super::format_duration;
use crate::config::ResolvedConfig;
use crate::domain::Track;
use crate::library::{FileLibrary, LibraryStore};

#[derive(Subcommand, Debug)]
pub enum LibraryCommands {
    /// List packs, or the tracks of one pack
    List {
        /// Pack ID (or unique prefix)
        pack: Option<String>,
    },

    /// Show details of a track
    Show {
        /// Track ID (or unique prefix)
        track: String,
    },

    /// Search track titles and tags
    Search { query: String },

    /// Remove a track and its media
    Remove {
        /// Track ID (or unique prefix)
        track: String,
    },
}

pub async fn execute(cfg: &ResolvedConfig, command: LibraryCommands) -> Result<()> {
    let library = FileLibrary::open(&cfg.library);

    match command {
        LibraryCommands::List { pack: None } => list_packs(&library).await,
        LibraryCommands::List { pack: Some(pack) } => list_pack(&library, &pack).await,
        LibraryCommands::Show { track } => show_track(&library, &track).await,
        LibraryCommands::Search { query } => search(&library, &query).await,
        LibraryCommands::Remove { track } => {
            let id = resolve_track_id(&library, &track).await?;
            match library.delete_track(id).await? {
                Some(track) => eprintln!("Removed '{}' ({})", track.title, track.id),
                None => eprintln!("Track not found: {}", id),
            }
            Ok(())
        }
    }
}

async fn list_packs(library: &FileLibrary) -> Result<()> {
    let catalog = library.snapshot().await?;

    if catalog.packs.is_empty() {
        println!("Library is empty. Use 'lessonkit import-bundle <dir>' to add lessons.");
        return Ok(());
    }

    println!("{:<38} {:<7} {:<40}", "PACK ID", "TRACKS", "TITLE");
    println!("{}", "-".repeat(86));
    for pack in &catalog.packs {
        println!("{:<38} {:<7} {:<40}", pack.id, pack.track_ids.len(), pack.title);
    }
    println!("\nTotal: {} pack(s), {} track(s)", catalog.packs.len(), catalog.len());

    Ok(())
}

async fn list_pack(library: &FileLibrary, prefix: &str) -> Result<()> {
    let packs = library.packs().await?;
    let pack = unique_prefix_match(packs.iter().map(|p| (p.id, p)), prefix, "pack")?;

    println!("{} ({})", pack.title, pack.id);
    if let Some(author) = &pack.author {
        println!("by {}", author);
    }
    println!();
    print_track_table(&library.tracks_in_pack(pack.id).await?);

    Ok(())
}

async fn show_track(library: &FileLibrary, prefix: &str) -> Result<()> {
    let id = resolve_track_id(library, prefix).await?;
    let track = library
        .track(id)
        .await?
        .with_context(|| format!("Track not found: {}", id))?;

    println!("  ID:        {}", track.id);
    println!("  Title:     {}", track.title);
    println!("  Pack:      {}", track.pack_id);
    println!("  Duration:  {}", format_duration(track.duration_ms));
    println!("  Source:    {}", track.source_type);
    if let Some(source) = &track.source {
        println!("  From:      {}", source);
    }
    if let Some(lang) = &track.language_code {
        println!("  Language:  {}", lang);
    }
    if !track.tags.is_empty() {
        println!("  Tags:      {}", track.tags.join(", "));
    }
    println!("  File:      {}", track.local_path.display());
    println!("  Imported:  {}", track.created_at);
    println!();
    for set in &track.practice_sets {
        println!(
            "  [{}] {} ({} clip(s)){}",
            set.display_order,
            set.title.as_deref().unwrap_or("Untitled"),
            set.clips.len(),
            if set.is_favorite { " *" } else { "" }
        );
    }
    if !track.transcripts.is_empty() {
        println!("  {} transcript span(s)", track.transcripts.len());
    }

    Ok(())
}

async fn search(library: &FileLibrary, query: &str) -> Result<()> {
    let catalog = library.snapshot().await?;
    let results: Vec<Track> = catalog.search(query).into_iter().cloned().collect();

    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s) for \"{}\":\n", results.len(), query);
    print_track_table(&results);
    Ok(())
}

fn print_track_table(tracks: &[Track]) {
    println!("{:<38} {:<9} {:<40}", "TRACK ID", "DURATION", "TITLE");
    println!("{}", "-".repeat(88));
    for track in tracks {
        println!(
            "{:<38} {:<9} {:<40}",
            track.id,
            format_duration(track.duration_ms),
            track.title
        );
    }
}

async fn resolve_track_id(library: &FileLibrary, prefix: &str) -> Result<Uuid> {
    let catalog = library.snapshot().await?;
    let track = unique_prefix_match(catalog.tracks.iter().map(|t| (t.id, t)), prefix, "track")?;
    Ok(track.id)
}

/// The single item whose id starts with `prefix`
fn unique_prefix_match<'a, T>(
    items: impl Iterator<Item = (Uuid, &'a T)>,
    prefix: &str,
    kind: &str,
) -> Result<&'a T> {
    let prefix = prefix.to_lowercase();
    let mut matches = items.filter(|(id, _)| id.to_string().starts_with(&prefix));

    match (matches.next(), matches.next()) {
        (Some((_, item)), None) => Ok(item),
        (None, _) => anyhow::bail!("No {} matches '{}'", kind, prefix),
        (Some(_), Some(_)) => anyhow::bail!("'{}' matches more than one {}", prefix, kind),
    }
}
