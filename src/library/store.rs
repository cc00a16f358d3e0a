//! File-backed library store.
//!
//! Every mutation is a read-modify-write of the catalog document performed
//! under an in-process mutex and an exclusive `fs2` lock on `catalog.lock`,
//! ending in write-to-temp + rename. Readers therefore only ever see the
//! previous or the next complete catalog.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::catalog::Catalog;
use super::LibraryError;
use crate::domain::{Pack, Track};

/// Catalog file name inside the library root
pub const CATALOG_FILE: &str = "catalog.json";

/// Lock file name inside the library root
pub const LOCK_FILE: &str = "catalog.lock";

/// Capability interface over the library.
///
/// Callers that need the folder layout use [`LibraryStore::track_folder`]
/// rather than knowing the concrete store.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Root directory holding pack folders
    fn root(&self) -> &Path;

    /// Folder for a track's media. Pure; callers create it.
    fn track_folder(&self, pack_id: Uuid, track_id: Uuid) -> PathBuf {
        self.root().join(pack_id.to_string()).join(track_id.to_string())
    }

    /// Upsert a pack by id
    async fn add_pack(&self, pack: Pack) -> Result<(), LibraryError>;

    /// Upsert a track inside an existing pack
    async fn add_track(&self, track: Track, pack_id: Uuid) -> Result<(), LibraryError>;

    /// Current catalog contents
    async fn snapshot(&self) -> Result<Catalog, LibraryError>;

    async fn packs(&self) -> Result<Vec<Pack>, LibraryError> {
        Ok(self.snapshot().await?.packs)
    }

    async fn pack(&self, id: Uuid) -> Result<Option<Pack>, LibraryError> {
        Ok(self.snapshot().await?.pack(id).cloned())
    }

    async fn track(&self, id: Uuid) -> Result<Option<Track>, LibraryError> {
        Ok(self.snapshot().await?.track(id).cloned())
    }

    async fn tracks_in_pack(&self, pack_id: Uuid) -> Result<Vec<Track>, LibraryError> {
        Ok(self
            .snapshot()
            .await?
            .tracks_in_pack(pack_id)
            .into_iter()
            .cloned()
            .collect())
    }
}

/// Library stored under a root directory
pub struct FileLibrary {
    root: PathBuf,
    catalog_path: PathBuf,
    lock_path: PathBuf,
    writer: Mutex<()>,
}

impl FileLibrary {
    /// Open (or lazily create) a library at `root`
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            catalog_path: root.join(CATALOG_FILE),
            lock_path: root.join(LOCK_FILE),
            root,
            writer: Mutex::new(()),
        }
    }

    /// Get the catalog file path
    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Remove a track from the catalog and delete its folder
    pub async fn delete_track(&self, id: Uuid) -> Result<Option<Track>, LibraryError> {
        let removed = self.mutate(move |catalog| Ok(catalog.remove_track(id))).await?;

        if let Some(track) = &removed {
            let folder = self.track_folder(track.pack_id, track.id);
            match tokio::fs::remove_dir_all(&folder).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(LibraryError::write(
                        format!("remove {}", folder.display()),
                        e,
                    ))
                }
            }
        }
        Ok(removed)
    }

    /// Apply `f` to the on-disk catalog and persist the result atomically.
    ///
    /// Nothing is written when `f` fails.
    async fn mutate<F, T>(&self, f: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&mut Catalog) -> Result<T, LibraryError> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.writer.lock().await;
        let root = self.root.clone();
        let catalog_path = self.catalog_path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || -> Result<T, LibraryError> {
            std::fs::create_dir_all(&root)
                .map_err(|e| LibraryError::write(format!("create {}", root.display()), e))?;

            let lock = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .map_err(|e| LibraryError::write("open catalog lock", e))?;
            lock.lock_exclusive()
                .map_err(|e| LibraryError::write("acquire catalog lock", e))?;

            let result = apply_blocking(&catalog_path, f);

            let _ = FileExt::unlock(&lock);
            result
        })
        .await
        .map_err(|e| {
            LibraryError::write(
                "catalog writer task",
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )
        })?
    }
}

/// Load, mutate and rewrite the catalog; the caller holds the lock
fn apply_blocking<F, T>(catalog_path: &Path, f: F) -> Result<T, LibraryError>
where
    F: FnOnce(&mut Catalog) -> Result<T, LibraryError>,
{
    let mut catalog = read_catalog_blocking(catalog_path)?;
    let value = f(&mut catalog)?;
    write_atomic(catalog_path, &catalog.to_json()?)?;
    Ok(value)
}

fn read_catalog_blocking(path: &Path) -> Result<Catalog, LibraryError> {
    match std::fs::read(path) {
        Ok(bytes) => Catalog::from_json(&bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::new()),
        Err(e) => Err(LibraryError::Read(e)),
    }
}

/// Write `bytes` to a temp file beside `path`, fsync, then rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), LibraryError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| LibraryError::write("create catalog temp file", e))?;
    temp.write_all(bytes)
        .map_err(|e| LibraryError::write("write catalog temp file", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| LibraryError::write("sync catalog temp file", e))?;
    temp.persist(path)
        .map_err(|e| LibraryError::write(format!("replace {}", path.display()), e.error))?;
    Ok(())
}

#[async_trait]
impl LibraryStore for FileLibrary {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn add_pack(&self, pack: Pack) -> Result<(), LibraryError> {
        let pack_id = pack.id;
        self.mutate(move |catalog| {
            catalog.upsert_pack(pack);
            Ok(())
        })
        .await?;
        debug!(%pack_id, "Pack stored");
        Ok(())
    }

    async fn add_track(&self, track: Track, pack_id: Uuid) -> Result<(), LibraryError> {
        let track_id = track.id;
        let is_new = self
            .mutate(move |catalog| catalog.upsert_track(track, pack_id))
            .await?;
        debug!(%pack_id, %track_id, is_new, "Track stored");
        Ok(())
    }

    async fn snapshot(&self) -> Result<Catalog, LibraryError> {
        match tokio::fs::read(&self.catalog_path).await {
            Ok(bytes) => Catalog::from_json(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::new()),
            Err(e) => Err(LibraryError::Read(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceType;
    use chrono::Utc;
    use tempfile::TempDir;

    fn track(id: Uuid, pack_id: Uuid) -> Track {
        Track {
            id,
            pack_id,
            title: "T".to_string(),
            filename: "audio.m4a".to_string(),
            local_path: PathBuf::from("audio.m4a"),
            duration_ms: 0,
            language_code: None,
            practice_sets: Vec::new(),
            transcripts: Vec::new(),
            tags: Vec::new(),
            source_type: SourceType::LocalFile,
            source: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_track_folder_is_pure() {
        let library = FileLibrary::open("/lib");
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            library.track_folder(p, t),
            PathBuf::from("/lib").join(p.to_string()).join(t.to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_library_snapshot() {
        let temp = TempDir::new().unwrap();
        let library = FileLibrary::open(temp.path().join("lib"));
        assert!(library.snapshot().await.unwrap().is_empty());
        assert!(!library.catalog_path().exists());
    }

    #[tokio::test]
    async fn test_pack_not_found_leaves_catalog_untouched() {
        let temp = TempDir::new().unwrap();
        let library = FileLibrary::open(temp.path());
        let pack_id = Uuid::new_v4();

        let err = library
            .add_track(track(Uuid::new_v4(), pack_id), pack_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::PackNotFound(_)));
        assert!(!library.catalog_path().exists());
    }

    #[tokio::test]
    async fn test_add_and_reopen() {
        let temp = TempDir::new().unwrap();
        let pack_id = Uuid::new_v4();
        let track_id = Uuid::new_v4();

        {
            let library = FileLibrary::open(temp.path());
            library.add_pack(Pack::new(pack_id, "Pack")).await.unwrap();
            library.add_track(track(track_id, pack_id), pack_id).await.unwrap();
        }

        let library = FileLibrary::open(temp.path());
        let tracks = library.tracks_in_pack(pack_id).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, track_id);
        assert_eq!(library.pack(pack_id).await.unwrap().unwrap().title, "Pack");

        // No temp files left beside the catalog
        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| n == CATALOG_FILE || n == LOCK_FILE), "{:?}", names);
    }

    #[tokio::test]
    async fn test_delete_track_removes_folder() {
        let temp = TempDir::new().unwrap();
        let library = FileLibrary::open(temp.path());
        let pack_id = Uuid::new_v4();
        let track_id = Uuid::new_v4();
        library.add_pack(Pack::new(pack_id, "Pack")).await.unwrap();
        library.add_track(track(track_id, pack_id), pack_id).await.unwrap();

        let folder = library.track_folder(pack_id, track_id);
        tokio::fs::create_dir_all(&folder).await.unwrap();
        tokio::fs::write(folder.join("audio.m4a"), b"x").await.unwrap();

        assert!(library.delete_track(track_id).await.unwrap().is_some());
        assert!(!folder.exists());
        assert!(library.track(track_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let temp = TempDir::new().unwrap();
        let library = std::sync::Arc::new(FileLibrary::open(temp.path()));
        let pack_id = Uuid::new_v4();
        library.add_pack(Pack::new(pack_id, "Pack")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let library = library.clone();
            handles.push(tokio::spawn(async move {
                library.add_track(track(Uuid::new_v4(), pack_id), pack_id).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let catalog = library.snapshot().await.unwrap();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.pack(pack_id).unwrap().track_ids.len(), 8);
    }
}
