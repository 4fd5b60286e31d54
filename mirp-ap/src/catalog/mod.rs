//! Content catalogs
//!
//! A catalog is the ordered list of playable items for one [`PlaybackMode`].
//! The controller works against a [`CatalogSnapshot`] taken from a
//! [`CatalogProvider`]; the snapshot is only replaced by an explicit rescan.

mod fs;

pub use fs::FsCatalog;

use crate::error::Result;
use async_trait::async_trait;
use mirp_common::PlaybackMode;
use std::path::PathBuf;

/// Where the pipeline fetches an item from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// File on the local storage volume
    LocalFile { path: PathBuf },
    /// Network audio stream endpoint
    RemoteStream { uri: String },
}

impl SourceDescriptor {
    pub fn mode(&self) -> PlaybackMode {
        match self {
            SourceDescriptor::LocalFile { .. } => PlaybackMode::LocalCatalog,
            SourceDescriptor::RemoteStream { .. } => PlaybackMode::RemoteStream,
        }
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceDescriptor::LocalFile { path } => write!(f, "{}", path.display()),
            SourceDescriptor::RemoteStream { uri } => write!(f, "{}", uri),
        }
    }
}

/// One playable item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    /// Position within its catalog snapshot
    pub index: usize,
    /// Display name (file name or station name)
    pub name: String,
    pub source: SourceDescriptor,
}

impl ItemRef {
    pub fn local(index: usize, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            name: name.into(),
            source: SourceDescriptor::LocalFile { path: path.into() },
        }
    }

    pub fn remote(index: usize, name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            source: SourceDescriptor::RemoteStream { uri: uri.into() },
        }
    }
}

/// Source of the two item lists
///
/// Listing may touch storage, so it is async and fallible. `item_exists` is
/// the per-play check that a local item is still resolvable; a provider
/// returns `true` for items it cannot verify.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_local_items(&self) -> Result<Vec<ItemRef>>;

    async fn list_remote_items(&self) -> Result<Vec<ItemRef>>;

    async fn item_exists(&self, item: &ItemRef) -> bool;
}

/// Immutable copy of both catalogs taken at startup or rescan
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    local: Vec<ItemRef>,
    remote: Vec<ItemRef>,
}

impl CatalogSnapshot {
    /// Build a snapshot; indices are reassigned to match list positions
    pub fn new(local: Vec<ItemRef>, remote: Vec<ItemRef>) -> Self {
        Self {
            local: reindex(local),
            remote: reindex(remote),
        }
    }

    pub fn items(&self, mode: PlaybackMode) -> &[ItemRef] {
        match mode {
            PlaybackMode::LocalCatalog => &self.local,
            PlaybackMode::RemoteStream => &self.remote,
        }
    }

    pub fn count(&self, mode: PlaybackMode) -> usize {
        self.items(mode).len()
    }

    pub fn get(&self, mode: PlaybackMode, index: usize) -> Option<&ItemRef> {
        self.items(mode).get(index)
    }
}

fn reindex(mut items: Vec<ItemRef>) -> Vec<ItemRef> {
    for (position, item) in items.iter_mut().enumerate() {
        item.index = position;
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reindexes_items() {
        let snapshot = CatalogSnapshot::new(
            vec![ItemRef::local(7, "a.mp3", "/m/a.mp3"), ItemRef::local(3, "b.mp3", "/m/b.mp3")],
            vec![ItemRef::remote(9, "Rock", "http://example.com/rock")],
        );

        assert_eq!(snapshot.count(PlaybackMode::LocalCatalog), 2);
        assert_eq!(snapshot.count(PlaybackMode::RemoteStream), 1);
        assert_eq!(snapshot.get(PlaybackMode::LocalCatalog, 1).unwrap().name, "b.mp3");
        assert_eq!(snapshot.get(PlaybackMode::LocalCatalog, 1).unwrap().index, 1);
        assert_eq!(snapshot.get(PlaybackMode::RemoteStream, 0).unwrap().index, 0);
        assert!(snapshot.get(PlaybackMode::RemoteStream, 1).is_none());
    }

    #[test]
    fn test_source_mode() {
        assert_eq!(
            ItemRef::local(0, "a", "/a").source.mode(),
            PlaybackMode::LocalCatalog
        );
        assert_eq!(
            ItemRef::remote(0, "r", "http://r").source.mode(),
            PlaybackMode::RemoteStream
        );
    }
}
