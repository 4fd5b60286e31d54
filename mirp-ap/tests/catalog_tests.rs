//! Integration tests for the filesystem catalog
//!
//! Builds throwaway music folders with tempfile and checks what the scan
//! keeps, drops and how it orders the result.

use mirp_ap::catalog::{CatalogProvider, FsCatalog, SourceDescriptor};
use mirp_common::config::{CatalogSettings, StationConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"not really audio").expect("Failed to create test file");
}

fn catalog(root: &Path, settings: CatalogSettings) -> FsCatalog {
    FsCatalog::new(root, settings, Vec::new())
}

async fn local_names(catalog: &FsCatalog) -> Vec<String> {
    catalog
        .list_local_items()
        .await
        .expect("Failed to list local items")
        .into_iter()
        .map(|item| item.name)
        .collect()
}

#[tokio::test]
async fn test_scan_filters_by_extension_and_sorts() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "b_song.mp3");
    touch(dir.path(), "a_song.MP3");
    touch(dir.path(), "notes.txt");
    touch(dir.path(), "cover.jpg");
    touch(dir.path(), "c_song.mp3");

    let catalog = catalog(dir.path(), CatalogSettings::default());
    assert_eq!(
        local_names(&catalog).await,
        vec!["a_song.MP3", "b_song.mp3", "c_song.mp3"]
    );
}

#[tokio::test]
async fn test_scan_skips_hidden_files_and_resource_forks() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "song.mp3");
    touch(dir.path(), "._song.mp3");
    touch(dir.path(), ".hidden.mp3");

    let catalog = catalog(dir.path(), CatalogSettings::default());
    assert_eq!(local_names(&catalog).await, vec!["song.mp3"]);
}

#[tokio::test]
async fn test_scan_depth() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "top.mp3");
    fs::create_dir(dir.path().join("album")).unwrap();
    touch(&dir.path().join("album"), "nested.mp3");
    fs::create_dir(dir.path().join(".trash")).unwrap();
    touch(&dir.path().join(".trash"), "deleted.mp3");

    let shallow = catalog(dir.path(), CatalogSettings::default());
    assert_eq!(local_names(&shallow).await, vec!["top.mp3"]);

    let deep = catalog(
        dir.path(),
        CatalogSettings {
            scan_depth: 2,
            ..Default::default()
        },
    );
    assert_eq!(local_names(&deep).await, vec!["nested.mp3", "top.mp3"]);
}

#[tokio::test]
async fn test_scan_caps_item_count() {
    let dir = TempDir::new().unwrap();
    for i in 0..8 {
        touch(dir.path(), &format!("track{:02}.mp3", i));
    }

    let catalog = catalog(
        dir.path(),
        CatalogSettings {
            max_items: 5,
            ..Default::default()
        },
    );
    let items = catalog.list_local_items().await.unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[4].name, "track04.mp3");
    assert_eq!(items[4].index, 4);
}

#[tokio::test]
async fn test_configured_extensions() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "one.mp3");
    touch(dir.path(), "two.flac");
    touch(dir.path(), "three.ogg");

    let catalog = catalog(
        dir.path(),
        CatalogSettings {
            extensions: vec!["flac".to_string(), "ogg".to_string()],
            ..Default::default()
        },
    );
    assert_eq!(local_names(&catalog).await, vec!["three.ogg", "two.flac"]);
}

#[tokio::test]
async fn test_items_carry_full_paths() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "song.mp3");

    let catalog = catalog(dir.path(), CatalogSettings::default());
    let items = catalog.list_local_items().await.unwrap();
    assert_eq!(
        items[0].source,
        SourceDescriptor::LocalFile {
            path: dir.path().join("song.mp3")
        }
    );
}

#[tokio::test]
async fn test_item_exists_tracks_storage() {
    let dir = TempDir::new().unwrap();
    touch(dir.path(), "song.mp3");

    let catalog = catalog(dir.path(), CatalogSettings::default());
    let items = catalog.list_local_items().await.unwrap();
    assert!(catalog.item_exists(&items[0]).await);

    fs::remove_file(dir.path().join("song.mp3")).unwrap();
    assert!(!catalog.item_exists(&items[0]).await);
}

#[tokio::test]
async fn test_empty_folder_is_an_empty_catalog() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog(dir.path(), CatalogSettings::default());
    assert!(catalog.list_local_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stations_become_remote_items() {
    let dir = TempDir::new().unwrap();
    let stations = vec![
        StationConfig {
            name: "Jazz".to_string(),
            url: "http://jazz.test/stream".to_string(),
        },
        StationConfig {
            name: "News".to_string(),
            url: "http://news.test/stream".to_string(),
        },
    ];
    let catalog = FsCatalog::new(dir.path(), CatalogSettings::default(), stations);

    let remote = catalog.list_remote_items().await.unwrap();
    assert_eq!(remote.len(), 2);
    assert_eq!(remote[1].name, "News");
    assert_eq!(
        remote[1].source,
        SourceDescriptor::RemoteStream {
            uri: "http://news.test/stream".to_string()
        }
    );
}
