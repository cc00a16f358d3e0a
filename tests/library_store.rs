//! Library Store Integration Tests
//!
//! Catalog persistence, folder layout and queries through the store.

use std::sync::Arc;

use chrono::Utc;
use lessonkit::domain::{identity, Pack, PracticeSet, SourceType, Track};
use lessonkit::library::{Catalog, FileLibrary, LibraryError, LibraryStore};
use tempfile::TempDir;
use uuid::Uuid;

fn pack(title: &str) -> Pack {
    Pack::new(identity::pack_id(identity::bundle_id("Demo"), title), title)
}

fn track(pack: &Pack, title: &str, tags: &[&str]) -> Track {
    let id = identity::track_id(pack.id, title, "");
    Track {
        id,
        pack_id: pack.id,
        title: title.to_string(),
        filename: "audio.mp3".to_string(),
        local_path: format!("/lib/{}/{}/audio.mp3", pack.id, id).into(),
        duration_ms: 1_000,
        language_code: Some("es".to_string()),
        practice_sets: vec![PracticeSet::full_track(id, 1_000)],
        transcripts: Vec::new(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        source_type: SourceType::Remote,
        source: Some(format!("https://x/{}.mp3", title)),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_catalog_document_round_trip() {
    let temp = TempDir::new().unwrap();
    let library = FileLibrary::open(temp.path());

    let p1 = pack("Pack1");
    let p2 = pack("Pack2");
    library.add_pack(p1.clone()).await.unwrap();
    library.add_pack(p2.clone()).await.unwrap();
    for (p, title) in [(&p1, "T1"), (&p2, "T2"), (&p1, "T3")] {
        library.add_track(track(p, title, &[]), p.id).await.unwrap();
    }

    let snapshot = library.snapshot().await.unwrap();
    let bytes = std::fs::read(library.catalog_path()).unwrap();
    let decoded = Catalog::from_json(&bytes).unwrap();

    assert_eq!(decoded, snapshot);
    assert_eq!(Catalog::from_json(&decoded.to_json().unwrap()).unwrap(), snapshot);
    assert!(decoded.is_consistent());

    let titles: Vec<&str> = decoded.tracks_in_pack(p1.id).iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["T1", "T3"]);
}

#[tokio::test]
async fn test_track_folder_layout() {
    let temp = TempDir::new().unwrap();
    let library = FileLibrary::open(temp.path());
    let pack_id = Uuid::new_v4();
    let track_id = Uuid::new_v4();

    let folder = library.track_folder(pack_id, track_id);
    assert_eq!(
        folder,
        temp.path().join(pack_id.to_string()).join(track_id.to_string())
    );
    // Pure: nothing is created
    assert!(!folder.exists());
}

#[tokio::test]
async fn test_add_track_to_unknown_pack() {
    let temp = TempDir::new().unwrap();
    let library = FileLibrary::open(temp.path());
    let orphan = pack("Never added");

    let err = library
        .add_track(track(&orphan, "T1", &[]), orphan.id)
        .await
        .unwrap_err();

    assert!(matches!(err, LibraryError::PackNotFound(id) if id == orphan.id));
    assert!(library.snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_queries() {
    let temp = TempDir::new().unwrap();
    let library = FileLibrary::open(temp.path());
    let p = pack("Greetings");
    library.add_pack(p.clone()).await.unwrap();
    library
        .add_track(track(&p, "Buenos días", &["morning"]), p.id)
        .await
        .unwrap();
    library
        .add_track(track(&p, "Buenas noches", &["evening"]), p.id)
        .await
        .unwrap();

    assert_eq!(library.packs().await.unwrap().len(), 1);
    assert_eq!(library.pack(p.id).await.unwrap().unwrap().title, "Greetings");
    assert_eq!(library.tracks_in_pack(p.id).await.unwrap().len(), 2);

    let catalog = library.snapshot().await.unwrap();
    let hits: Vec<&str> = catalog.search("BUENAS").iter().map(|t| t.title.as_str()).collect();
    assert_eq!(hits, vec!["Buenas noches"]);
    assert_eq!(catalog.search("morning").len(), 1);
    assert!(catalog.search("tardes").is_empty());
}

#[tokio::test]
async fn test_delete_track() {
    let temp = TempDir::new().unwrap();
    let library = FileLibrary::open(temp.path());
    let p = pack("Pack1");
    let t = track(&p, "T1", &[]);
    library.add_pack(p.clone()).await.unwrap();
    library.add_track(t.clone(), p.id).await.unwrap();

    let folder = library.track_folder(p.id, t.id);
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("audio.mp3"), b"x").unwrap();

    let removed = tokio_test::assert_ok!(library.delete_track(t.id).await);
    assert_eq!(removed.map(|t| t.id), Some(t.id));
    assert!(!folder.exists());
    assert!(library.track(t.id).await.unwrap().is_none());
    assert!(library.pack(p.id).await.unwrap().unwrap().track_ids.is_empty());

    // Deleting again is a no-op
    assert!(library.delete_track(t.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_two_stores_share_one_catalog() {
    let temp = TempDir::new().unwrap();
    let a = Arc::new(FileLibrary::open(temp.path()));
    let b = Arc::new(FileLibrary::open(temp.path()));
    let p = pack("Shared");
    a.add_pack(p.clone()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = if i % 2 == 0 { a.clone() } else { b.clone() };
        let p = p.clone();
        handles.push(tokio::spawn(async move {
            store
                .add_track(track(&p, &format!("T{}", i), &[]), p.id)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let catalog = a.snapshot().await.unwrap();
    assert_eq!(catalog.tracks.len(), 8);
    assert_eq!(catalog.pack(p.id).unwrap().track_ids.len(), 8);
    assert!(catalog.is_consistent());
}

#[tokio::test]
async fn test_corrupt_catalog_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("catalog.json"), b"{ not json").unwrap();
    let library = FileLibrary::open(temp.path());

    assert!(matches!(
        library.snapshot().await,
        Err(LibraryError::Corrupt(_))
    ));
}
