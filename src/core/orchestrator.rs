//! Import orchestrator.
//!
//! Every entry point converges on one per-track stage sequence:
//! acquire → persist media → probe duration → build entity graph → commit.
//! Bundle imports run that sequence once per manifest track, strictly in
//! manifest order, and apply the batch policy to each [`TrackResult`]:
//! content gaps and persistence failures skip the track, transport faults
//! abort the batch. Single-source imports abort on any failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::remote::url_extension;
use crate::adapters::{
    duration_ms_from_probe, require_http, AcquisitionAdapters, AcquisitionError,
    DurationProber, ManifestFetcher, SourceDescriptor,
};
use crate::domain::{
    identity, Clip, ClipKind, Pack, PracticeSet, SourceType, Track, TrackStage, TranscriptSpan,
};
use crate::ingest::PendingQueue;
use crate::library::{LibraryError, LibraryStore};
use crate::manifest::{self, BundleManifest, ManifestPack, ManifestPracticeSet, ManifestTrack};

use super::outcome::{ImportError, ImportReport, SkipReason, SkippedTrack, TrackResult};
use super::progress::{BatchProgress, ProgressReporter};

/// Manifest file name inside an embedded bundle directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Extension used when the acquired file has none
pub const DEFAULT_FALLBACK_EXTENSION: &str = "m4a";

/// Pack receiving single-source imports when the caller names none
pub const DEFAULT_PACK_TITLE: &str = "Imported";

/// Stored media file stem inside a track folder
pub const AUDIO_STEM: &str = "audio";

/// Share of a batch's progress spent before the first track
const MANIFEST_FRACTION: f64 = 0.1;

/// Tunables for the importer
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub fallback_extension: String,
    pub default_pack_title: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            fallback_extension: DEFAULT_FALLBACK_EXTENSION.to_string(),
            default_pack_title: DEFAULT_PACK_TITLE.to_string(),
        }
    }
}

/// Target and metadata for a single-source import
#[derive(Debug, Clone, Default)]
pub struct SingleImport {
    /// Pack to import into (defaults to [`ImportSettings::default_pack_title`])
    pub pack_title: Option<String>,

    /// Track title (defaults to one derived from the file or URL name)
    pub title: Option<String>,

    pub language_code: Option<String>,

    pub tags: Vec<String>,
}

/// Where manifest-relative references resolve
#[derive(Debug, Clone)]
enum ManifestOrigin {
    Embedded { root: PathBuf },
    Remote { manifest_url: Url },
}

/// Everything the stage sequence needs for one track
#[derive(Debug, Clone)]
struct TrackPlan {
    pack: Pack,
    track_id: Uuid,
    title: String,
    source: SourceDescriptor,
    source_key: String,
    language_code: Option<String>,
    tags: Vec<String>,
    practice_sets: Option<Vec<ManifestPracticeSet>>,
    transcripts: Vec<TranscriptSpan>,
}

/// Follows one track through its stages
struct StageTracker<'a> {
    title: &'a str,
    stage: TrackStage,
}

impl<'a> StageTracker<'a> {
    fn new(title: &'a str) -> Self {
        Self {
            title,
            stage: TrackStage::Pending,
        }
    }

    fn advance(&mut self, next: TrackStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "illegal track stage transition {} -> {}",
            self.stage,
            next
        );
        debug!(track = %self.title, from = %self.stage, to = %next, "Track stage");
        self.stage = next;
    }

    /// Cancellation boundary; only legal when leaving a checked stage
    fn checkpoint(&self, cancel: &CancellationToken) -> Result<(), ImportError> {
        if self.stage.checks_cancellation() && cancel.is_cancelled() {
            info!(track = %self.title, stage = %self.stage, "Import cancelled");
            return Err(ImportError::Cancelled);
        }
        Ok(())
    }
}

/// Imports sources into a library
pub struct Importer {
    library: Arc<dyn LibraryStore>,
    adapters: AcquisitionAdapters,
    fetcher: Arc<dyn ManifestFetcher>,
    prober: Arc<dyn DurationProber>,
    settings: ImportSettings,
}

impl Importer {
    /// Create an importer over `library` using the given collaborators
    pub fn new(
        library: Arc<dyn LibraryStore>,
        adapters: AcquisitionAdapters,
        fetcher: Arc<dyn ManifestFetcher>,
        prober: Arc<dyn DurationProber>,
    ) -> Self {
        Self {
            library,
            adapters,
            fetcher,
            prober,
            settings: ImportSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ImportSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn library(&self) -> &Arc<dyn LibraryStore> {
        &self.library
    }

    /// Import an embedded bundle directory (`manifest.json` plus its assets)
    #[instrument(skip(self, progress, cancel), fields(bundle = %bundle_dir.display()))]
    pub async fn import_bundle(
        &self,
        bundle_dir: &Path,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        progress.report(0.0, "Reading bundle manifest");

        let manifest_path = bundle_dir.join(MANIFEST_FILE);
        let bytes = fs::read(&manifest_path).await.map_err(|e| {
            let reference = manifest_path.display().to_string();
            let source = if e.kind() == std::io::ErrorKind::NotFound {
                AcquisitionError::NotFound(reference.clone())
            } else {
                AcquisitionError::Unreadable {
                    path: manifest_path.clone(),
                    source: e,
                }
            };
            ImportError::Acquisition { reference, source }
        })?;

        let manifest = manifest::decode(&bytes)?;
        let origin = ManifestOrigin::Embedded {
            root: bundle_dir.to_path_buf(),
        };
        self.run_batch(&manifest, &origin, progress, cancel).await
    }

    /// Fetch a remote manifest and import every track it lists
    #[instrument(skip(self, progress, cancel))]
    pub async fn import_manifest_url(
        &self,
        url: &str,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let manifest_url = validate_remote_url(url)?;
        if let Some(ext) = url_extension(&manifest_url) {
            if ext != "json" {
                warn!(url = %manifest_url, ext, "Manifest URL does not look like JSON, fetching anyway");
            }
        }

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        progress.report(0.0, format!("Fetching manifest {}", manifest_url));

        let document = self
            .fetcher
            .fetch(&manifest_url, cancel)
            .await
            .map_err(|e| match e {
                AcquisitionError::Cancelled => ImportError::Cancelled,
                source => ImportError::Acquisition {
                    reference: manifest_url.to_string(),
                    source,
                },
            })?;
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        if let Some(ct) = document.content_type.as_deref() {
            if !is_json_like_content_type(ct) {
                warn!(url = %manifest_url, content_type = ct, "Manifest served with non-JSON content type");
            }
        }

        let manifest = manifest::decode(&document.bytes)?;
        let origin = ManifestOrigin::Remote { manifest_url };
        self.run_batch(&manifest, &origin, progress, cancel).await
    }

    /// Import one local audio or video file
    pub async fn import_file(
        &self,
        path: &Path,
        target: &SingleImport,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Track, ImportError> {
        let name = file_name_of(path);
        self.import_single(
            SourceDescriptor::LocalFile(path.to_path_buf()),
            name.clone(),
            title_from_file_name(&name),
            target,
            progress,
            cancel,
        )
        .await
    }

    /// Import one microphone recording
    pub async fn import_recording(
        &self,
        path: &Path,
        target: &SingleImport,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Track, ImportError> {
        let name = file_name_of(path);
        self.import_single(
            SourceDescriptor::Recording(path.to_path_buf()),
            name.clone(),
            title_from_file_name(&name),
            target,
            progress,
            cancel,
        )
        .await
    }

    /// Download and import one audio URL
    pub async fn import_url(
        &self,
        url: &str,
        target: &SingleImport,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Track, ImportError> {
        let parsed = validate_remote_url(url)?;
        let default_title = parsed
            .path_segments()
            .and_then(|s| s.last().map(str::to_string))
            .filter(|s| !s.is_empty())
            .map(|s| title_from_file_name(&s))
            .or_else(|| parsed.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());

        self.import_single(
            SourceDescriptor::Remote(parsed),
            url.trim().to_string(),
            default_title,
            target,
            progress,
            cancel,
        )
        .await
    }

    /// Import every pending hand-off record.
    ///
    /// Imported records are cleared from the queue; failed ones stay queued
    /// for the next flush.
    #[instrument(skip_all)]
    pub async fn import_pending(
        &self,
        queue: &PendingQueue,
        target: &SingleImport,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let records = queue.drain().await?;
        let batch = BatchProgress::new(0.0, records.len());
        let mut report = ImportReport::default();
        info!(pending = records.len(), "Flushing pending imports");

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let mut record_target = target.clone();
            if record_target.title.is_none() && !record.label.trim().is_empty() {
                record_target.title = Some(record.label.clone());
            }

            let result = self
                .import_single(
                    SourceDescriptor::LocalFile(record.path.clone()),
                    record.file_name.clone(),
                    title_from_file_name(&record.file_name),
                    &record_target,
                    &ProgressReporter::silent(),
                    cancel,
                )
                .await;

            match result {
                Ok(track) => {
                    if let Err(e) = queue.clear(&record.id).await {
                        warn!(id = %record.id, error = %e, "Imported but could not clear pending record");
                    }
                    progress.report(batch.after(i + 1), format!("Imported '{}'", track.title));
                    report.committed.push(track);
                }
                Err(ImportError::Cancelled) => return Err(ImportError::Cancelled),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "Pending import failed, leaving it queued");
                    progress.report(batch.after(i + 1), format!("Failed '{}'", record.label));
                    report.skipped.push(SkippedTrack {
                        title: record.label.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Run the stage sequence for one source with no batch around it
    async fn import_single(
        &self,
        source: SourceDescriptor,
        source_key: String,
        default_title: String,
        target: &SingleImport,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Track, ImportError> {
        let pack_title = target
            .pack_title
            .clone()
            .unwrap_or_else(|| self.settings.default_pack_title.clone());
        let bundle_id = identity::bundle_id(&pack_title);
        let pack = Pack::new(identity::pack_id(bundle_id, &pack_title), pack_title);

        let title = target.title.clone().unwrap_or(default_title);
        let reference = source.describe();
        let plan = TrackPlan {
            track_id: identity::track_id(pack.id, &title, &source_key),
            pack,
            title,
            source,
            source_key,
            language_code: target.language_code.clone(),
            tags: target.tags.clone(),
            practice_sets: None,
            transcripts: Vec::new(),
        };

        progress.report(0.0, format!("Importing '{}'", plan.title));
        match self.process_track(plan, cancel).await {
            TrackResult::Committed(track) => {
                progress.report(1.0, format!("Imported '{}'", track.title));
                Ok(track)
            }
            TrackResult::Skipped(reason) => Err(reason.into_error(reference)),
            TrackResult::Fatal(e) => Err(e),
        }
    }

    /// Run every manifest track, sequentially, applying the batch policy
    async fn run_batch(
        &self,
        manifest: &BundleManifest,
        origin: &ManifestOrigin,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ImportReport, ImportError> {
        let bundle_id = identity::bundle_id(&manifest.title);
        let total = manifest.track_count();
        let batch = BatchProgress::new(MANIFEST_FRACTION, total);

        info!(%bundle_id, bundle = %manifest.title, packs = manifest.packs.len(), tracks = total, "Starting batch import");
        progress.report(
            batch.after(0),
            format!("Importing {} track(s) from '{}'", total, manifest.title),
        );

        let mut report = ImportReport::default();
        let mut done = 0;

        for manifest_pack in &manifest.packs {
            let pack = pack_record(bundle_id, manifest_pack);

            for manifest_track in &manifest_pack.tracks {
                let result = match plan_manifest_track(&pack, manifest_track, origin) {
                    Ok(plan) => self.process_track(plan, cancel).await,
                    Err(reason) => TrackResult::Skipped(SkipReason::Unresolvable(reason)),
                };
                done += 1;

                match result {
                    TrackResult::Committed(track) => {
                        info!(pack = %pack.title, track = %track.title, track_id = %track.id, "Track imported");
                        progress.report(batch.after(done), format!("Imported '{}'", track.title));
                        report.committed.push(track);
                    }
                    TrackResult::Skipped(reason) => {
                        warn!(pack = %pack.title, track = %manifest_track.title, %reason, "Skipping track");
                        progress.report(
                            batch.after(done),
                            format!("Skipped '{}'", manifest_track.title),
                        );
                        report.skipped.push(SkippedTrack {
                            title: manifest_track.title.clone(),
                            reason: reason.to_string(),
                        });
                    }
                    TrackResult::Fatal(e) => {
                        error!(pack = %pack.title, track = %manifest_track.title, error = %e, "Aborting batch import");
                        return Err(e);
                    }
                }
            }
        }

        info!(
            committed = report.committed.len(),
            skipped = report.skipped.len(),
            "Batch import finished"
        );
        progress.report(
            1.0,
            format!(
                "Imported {} track(s), skipped {}",
                report.committed.len(),
                report.skipped.len()
            ),
        );
        Ok(report)
    }

    /// The per-track stage sequence
    async fn process_track(&self, plan: TrackPlan, cancel: &CancellationToken) -> TrackResult {
        let mut stage = StageTracker::new(&plan.title);
        let reference = plan.source.describe();

        if let Err(e) = stage.checkpoint(cancel) {
            return TrackResult::Fatal(e);
        }
        stage.advance(TrackStage::Acquiring);

        let acquirer = self.adapters.for_source(&plan.source);
        debug!(adapter = acquirer.name(), source = %reference, "Acquiring");
        let acquired = match acquirer.acquire(&plan.source, cancel).await {
            Ok(file) => file,
            Err(AcquisitionError::Cancelled) => return TrackResult::Fatal(ImportError::Cancelled),
            Err(e) if e.is_content_gap() => {
                stage.advance(TrackStage::Skipped);
                return TrackResult::Skipped(SkipReason::Acquisition(e));
            }
            Err(source) => {
                stage.advance(TrackStage::Failed);
                return TrackResult::Fatal(ImportError::Acquisition { reference, source });
            }
        };

        // Dropping `acquired` here removes any staged download
        if let Err(e) = stage.checkpoint(cancel) {
            return TrackResult::Fatal(e);
        }
        stage.advance(TrackStage::Persisting);

        let folder = self.library.track_folder(plan.pack.id, plan.track_id);
        let staged = StagedMedia::new(
            &folder,
            acquired.extension().unwrap_or(&self.settings.fallback_extension),
        );
        if let Err(e) = staged.copy_from(acquired.path()).await {
            stage.advance(TrackStage::Skipped);
            self.discard_uncommitted(&plan, &folder, &staged.partial).await;
            return TrackResult::Skipped(SkipReason::Persistence(e));
        }
        let source_type = acquired.source_type();
        drop(acquired);

        if let Err(e) = stage.checkpoint(cancel) {
            self.discard_uncommitted(&plan, &folder, &staged.partial).await;
            return TrackResult::Fatal(e);
        }
        stage.advance(TrackStage::ProbingDuration);

        let duration_ms = duration_ms_from_probe(self.prober.probe_ms(&staged.partial).await);

        if let Err(e) = stage.checkpoint(cancel) {
            self.discard_uncommitted(&plan, &folder, &staged.partial).await;
            return TrackResult::Fatal(e);
        }
        stage.advance(TrackStage::Committing);

        if let Err(e) = fs::rename(&staged.partial, &staged.destination).await {
            stage.advance(TrackStage::Failed);
            self.discard_uncommitted(&plan, &folder, &staged.partial).await;
            return TrackResult::Skipped(SkipReason::Persistence(e));
        }

        let track = build_track(
            &plan,
            staged.filename.clone(),
            staged.destination.clone(),
            duration_ms,
            source_type,
        );
        match self.commit(&plan.pack, track).await {
            Ok(track) => {
                if let Err(e) = remove_stale_audio(&folder, &staged.filename).await {
                    warn!(folder = %folder.display(), error = %e, "Failed to remove replaced audio");
                }
                stage.advance(TrackStage::Done);
                TrackResult::Committed(track)
            }
            Err(e @ LibraryError::PackNotFound(_)) => {
                stage.advance(TrackStage::Failed);
                self.discard_uncommitted(&plan, &folder, &staged.destination).await;
                TrackResult::Fatal(ImportError::Library(e))
            }
            Err(e) => {
                stage.advance(TrackStage::Failed);
                self.discard_uncommitted(&plan, &folder, &staged.destination).await;
                TrackResult::Skipped(SkipReason::Catalog(e))
            }
        }
    }

    async fn commit(&self, pack: &Pack, track: Track) -> Result<Track, LibraryError> {
        self.library.add_pack(pack.clone()).await?;
        self.library.add_track(track.clone(), pack.id).await?;
        Ok(track)
    }

    /// Undo media written for a track that never reached the catalog.
    ///
    /// A folder the catalog does not know is removed whole. Otherwise only
    /// `uncommitted` goes, unless it is the file the catalog points at.
    async fn discard_uncommitted(&self, plan: &TrackPlan, folder: &Path, uncommitted: &Path) {
        match self.library.track(plan.track_id).await {
            Ok(None) => {
                if let Err(e) = fs::remove_dir_all(folder).await {
                    debug!(folder = %folder.display(), error = %e, "Failed to discard orphaned media");
                }
            }
            Ok(Some(committed)) if committed.local_path != uncommitted => {
                if let Err(e) = fs::remove_file(uncommitted).await {
                    debug!(file = %uncommitted.display(), error = %e, "Failed to discard uncommitted media");
                }
            }
            Ok(Some(_)) => {}
            Err(e) => debug!(error = %e, "Could not check catalog for orphaned media"),
        }
    }
}

// ============================================================================
// Stage helpers
// ============================================================================

fn validate_remote_url(raw: &str) -> Result<Url, ImportError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ImportError::Validation(format!("unparsable URL '{}': {}", raw, e)))?;
    require_http(&url).map_err(|e| ImportError::Validation(e.to_string()))?;
    Ok(url)
}

fn is_json_like_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.ends_with("json")
        || matches!(
            mime,
            "text/plain" | "application/octet-stream" | "binary/octet-stream"
        )
}

fn pack_record(bundle_id: Uuid, pack: &ManifestPack) -> Pack {
    Pack::new(identity::pack_id(bundle_id, pack.key()), pack.title.clone())
        .with_language_hint(pack.language_hint.clone())
        .with_author(pack.author.clone())
        .with_cover_url(pack.cover_url.clone())
}

/// Resolve a manifest track's audio reference into a source descriptor
fn resolve_source(origin: &ManifestOrigin, track: &ManifestTrack) -> Result<SourceDescriptor, String> {
    let parse_remote = |raw: &str| -> Result<SourceDescriptor, String> {
        let url = Url::parse(raw.trim()).map_err(|e| format!("unparsable URL '{}': {}", raw, e))?;
        require_http(&url).map_err(|e| e.to_string())?;
        Ok(SourceDescriptor::Remote(url))
    };

    match origin {
        ManifestOrigin::Embedded { root } => match (&track.filename, &track.url) {
            (Some(name), _) => Ok(SourceDescriptor::Embedded {
                root: root.clone(),
                name: name.clone(),
            }),
            (None, Some(url)) => parse_remote(url),
            (None, None) => Err("no url or filename".to_string()),
        },
        ManifestOrigin::Remote { manifest_url } => match (&track.url, &track.filename) {
            (Some(url), _) => parse_remote(url),
            (None, Some(name)) => manifest_url
                .join(name)
                .map_err(|e| format!("cannot resolve '{}' against manifest URL: {}", name, e))
                .and_then(|url| parse_remote(url.as_str())),
            (None, None) => Err("no url or filename".to_string()),
        },
    }
}

fn plan_manifest_track(
    pack: &Pack,
    track: &ManifestTrack,
    origin: &ManifestOrigin,
) -> Result<TrackPlan, String> {
    let source = resolve_source(origin, track)?;
    let source_key = track.source_key().unwrap_or_default().to_string();
    let language_code = track
        .language_code
        .clone()
        .or_else(|| pack.language_hint.clone());

    Ok(TrackPlan {
        pack: pack.clone(),
        track_id: identity::track_id(pack.id, track.key(), &source_key),
        title: track.title.clone(),
        source,
        source_key,
        language_code,
        tags: track.tags.clone(),
        practice_sets: track.practice_sets.clone(),
        transcripts: track.transcripts.clone().unwrap_or_default(),
    })
}

/// A track's media copied beside its final name, awaiting commit.
///
/// The hidden partial keeps the real extension so the prober can still
/// identify the container. It only becomes `audio.<ext>` once the track
/// is committing, so a cancelled or failed import never touches the file
/// the catalog already points at.
struct StagedMedia {
    partial: PathBuf,
    destination: PathBuf,
    filename: String,
}

impl StagedMedia {
    fn new(folder: &Path, extension: &str) -> Self {
        let filename = format!("{}.{}", AUDIO_STEM, extension);
        Self {
            partial: folder.join(format!(".{}.partial.{}", AUDIO_STEM, extension)),
            destination: folder.join(&filename),
            filename,
        }
    }

    async fn copy_from(&self, source: &Path) -> std::io::Result<()> {
        if let Some(folder) = self.partial.parent() {
            fs::create_dir_all(folder).await?;
        }
        if let Err(e) = fs::copy(source, &self.partial).await {
            let _ = fs::remove_file(&self.partial).await;
            return Err(e);
        }
        Ok(())
    }
}

/// Remove every `audio.*` file in `folder` except `keep`
async fn remove_stale_audio(folder: &Path, keep: &str) -> std::io::Result<()> {
    let prefix = format!("{}.", AUDIO_STEM);
    let mut entries = fs::read_dir(folder).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name != keep {
            debug!(file = %name, "Removing stale audio file");
            fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

/// Practice sets from the manifest, or the synthesized full-track set
fn build_practice_sets(
    track_id: Uuid,
    manifest_sets: Option<&[ManifestPracticeSet]>,
    duration_ms: u64,
    language_code: Option<&str>,
) -> Vec<PracticeSet> {
    let Some(sets) = manifest_sets.filter(|s| !s.is_empty()) else {
        return vec![PracticeSet::full_track(track_id, duration_ms)];
    };

    let mut used_keys = HashSet::new();
    sets.iter()
        .enumerate()
        .map(|(index, set)| {
            let mut key = set
                .title
                .clone()
                .unwrap_or_else(|| format!("practice set {}", index + 1));
            if !used_keys.insert(identity::normalize(&key)) {
                key = format!("{}#{}", key, index);
                used_keys.insert(identity::normalize(&key));
            }
            let set_id = identity::practice_set_id(track_id, &key);

            let clips = set
                .clips
                .iter()
                .enumerate()
                .map(|(clip_index, clip)| {
                    let clip_key = clip
                        .title
                        .clone()
                        .unwrap_or_else(|| clip_index.to_string());
                    Clip {
                        id: identity::clip_id(set_id, &clip_key, clip.start_ms, clip.end_ms),
                        start_ms: clip.start_ms,
                        end_ms: clip.end_ms,
                        kind: clip.kind,
                        title: clip.title.clone(),
                        language_code: clip.language_code.clone().or_else(|| match clip.kind {
                            ClipKind::Drill => language_code.map(str::to_string),
                            ClipKind::Skip => None,
                        }),
                        repeats: clip.repeats,
                        start_speed: clip.start_speed,
                        end_speed: clip.end_speed,
                    }
                })
                .collect();

            PracticeSet {
                id: set_id,
                track_id,
                display_order: index as u32,
                title: set.title.clone(),
                clips,
                is_favorite: set.is_favorite.unwrap_or(false),
            }
        })
        .collect()
}

fn build_track(
    plan: &TrackPlan,
    filename: String,
    local_path: PathBuf,
    duration_ms: u64,
    source_type: SourceType,
) -> Track {
    let transcripts = plan
        .transcripts
        .iter()
        .cloned()
        .map(|mut span| {
            if span.language_code.is_none() {
                span.language_code = plan.language_code.clone();
            }
            span
        })
        .collect();

    Track {
        id: plan.track_id,
        pack_id: plan.pack.id,
        title: plan.title.clone(),
        filename,
        local_path,
        duration_ms,
        language_code: plan.language_code.clone(),
        practice_sets: build_practice_sets(
            plan.track_id,
            plan.practice_sets.as_deref(),
            duration_ms,
            plan.language_code.as_deref(),
        ),
        transcripts,
        tags: plan.tags.clone(),
        source_type,
        source: Some(plan.source_key.clone()),
        created_at: Utc::now(),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Display title from a file name: extension dropped, `_`/`-` as spaces,
/// words capitalized
pub fn title_from_file_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);

    let title = stem
        .replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestClip;

    fn manifest_track(url: Option<&str>, filename: Option<&str>) -> ManifestTrack {
        ManifestTrack {
            id: None,
            title: "T1".to_string(),
            url: url.map(String::from),
            filename: filename.map(String::from),
            duration_ms: None,
            language_code: None,
            practice_sets: None,
            transcripts: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("lesson_01-intro.mp3"), "Lesson 01 Intro");
        assert_eq!(title_from_file_name("ÉCOUTE.m4a"), "ÉCOUTE");
        assert_eq!(title_from_file_name(".mp3"), ".mp3");
        assert_eq!(title_from_file_name("__.mp3"), "Untitled");
    }

    #[test]
    fn test_resolve_remote_sources() {
        let origin = ManifestOrigin::Remote {
            manifest_url: Url::parse("https://cdn.example.com/bundles/demo/manifest.json").unwrap(),
        };

        let source = resolve_source(&origin, &manifest_track(Some("https://x/a.mp3"), None)).unwrap();
        assert_eq!(source, SourceDescriptor::Remote(Url::parse("https://x/a.mp3").unwrap()));

        let source = resolve_source(&origin, &manifest_track(None, Some("a.mp3"))).unwrap();
        assert_eq!(
            source,
            SourceDescriptor::Remote(Url::parse("https://cdn.example.com/bundles/demo/a.mp3").unwrap())
        );

        assert!(resolve_source(&origin, &manifest_track(Some("not a url"), None)).is_err());
        assert!(resolve_source(&origin, &manifest_track(Some("ftp://x/a.mp3"), None)).is_err());
        assert!(resolve_source(&origin, &manifest_track(None, None)).is_err());
    }

    #[test]
    fn test_resolve_embedded_sources() {
        let origin = ManifestOrigin::Embedded {
            root: PathBuf::from("/bundle"),
        };

        let source = resolve_source(&origin, &manifest_track(Some("https://x/a.mp3"), Some("a.mp3"))).unwrap();
        assert_eq!(
            source,
            SourceDescriptor::Embedded {
                root: PathBuf::from("/bundle"),
                name: "a.mp3".to_string()
            }
        );

        let source = resolve_source(&origin, &manifest_track(Some("https://x/a.mp3"), None)).unwrap();
        assert!(matches!(source, SourceDescriptor::Remote(_)));
    }

    #[test]
    fn test_practice_sets_follow_manifest_order() {
        let track_id = Uuid::new_v4();
        let sets: Vec<ManifestPracticeSet> = ["Full Track", "Drills", "Drills"]
            .iter()
            .map(|title| ManifestPracticeSet {
                id: None,
                title: Some(title.to_string()),
                clips: vec![ManifestClip {
                    id: None,
                    start_ms: 0,
                    end_ms: 500,
                    kind: ClipKind::Drill,
                    title: None,
                    language_code: None,
                    repeats: Some(3),
                    start_speed: None,
                    end_speed: None,
                }],
                is_favorite: None,
            })
            .collect();

        let built = build_practice_sets(track_id, Some(&sets), 10_000, Some("es"));
        let orders: Vec<u32> = built.iter().map(|s| s.display_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        // Duplicate titles still get distinct ids
        assert_ne!(built[1].id, built[2].id);
        assert_eq!(built[1].clips[0].language_code.as_deref(), Some("es"));
        assert_eq!(built[1].clips[0].repeats, Some(3));
        assert!(built.iter().all(|s| s.track_id == track_id));
    }

    #[test]
    fn test_missing_practice_sets_synthesize_full_track() {
        let built = build_practice_sets(Uuid::new_v4(), None, 42_000, None);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].clips[0].end_ms, 42_000);

        let built = build_practice_sets(Uuid::new_v4(), Some(&[]), 42_000, None);
        assert_eq!(built.len(), 1);
    }

    fn folder_names(folder: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(folder)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_staged_media_leaves_committed_audio_alone() {
        let temp = tempfile::TempDir::new().unwrap();
        let folder = temp.path().join("pack").join("track");
        tokio::fs::create_dir_all(&folder).await.unwrap();
        tokio::fs::write(folder.join("audio.wav"), b"old").await.unwrap();

        let src = temp.path().join("new.mp3");
        tokio::fs::write(&src, b"new").await.unwrap();

        let staged = StagedMedia::new(&folder, "mp3");
        staged.copy_from(&src).await.unwrap();

        assert_eq!(staged.filename, "audio.mp3");
        assert_eq!(staged.destination, folder.join("audio.mp3"));
        assert_eq!(tokio::fs::read(&staged.partial).await.unwrap(), b"new");
        assert_eq!(folder_names(&folder), vec![".audio.partial.mp3", "audio.wav"]);
    }

    #[tokio::test]
    async fn test_staged_media_creates_folder() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("recording");
        tokio::fs::write(&src, b"pcm").await.unwrap();

        let staged = StagedMedia::new(&temp.path().join("out"), "m4a");
        staged.copy_from(&src).await.unwrap();
        assert_eq!(staged.filename, "audio.m4a");
        assert!(staged.partial.exists());
    }

    #[tokio::test]
    async fn test_remove_stale_audio_keeps_one_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let folder = temp.path();
        for name in ["audio.wav", "audio.mp3", ".audio.partial.m4a", "notes.txt"] {
            tokio::fs::write(folder.join(name), b"x").await.unwrap();
        }

        remove_stale_audio(folder, "audio.mp3").await.unwrap();
        assert_eq!(
            folder_names(folder),
            vec![".audio.partial.m4a", "audio.mp3", "notes.txt"]
        );
    }
}
