//! Filesystem-backed catalog
//!
//! Local items are the audio files found under the music root; remote items
//! are the configured station list.

use super::{CatalogProvider, ItemRef, SourceDescriptor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use mirp_common::config::{CatalogSettings, StationConfig, TomlConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Catalog scanning a music folder and serving a static station list
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
    settings: CatalogSettings,
    stations: Vec<StationConfig>,
}

impl FsCatalog {
    pub fn new(root: impl Into<PathBuf>, settings: CatalogSettings, stations: Vec<StationConfig>) -> Self {
        Self {
            root: root.into(),
            settings,
            stations,
        }
    }

    /// Build from the loaded configuration and an already resolved music root
    pub fn from_config(root: impl Into<PathBuf>, config: &TomlConfig) -> Self {
        Self::new(root, config.catalog.clone(), config.stations.0.clone())
    }

    /// Blocking directory walk
    ///
    /// Hidden entries (including `._` resource forks) are skipped, file
    /// names are sorted, and the list is capped at `max_items`.
    fn scan(root: &Path, settings: &CatalogSettings) -> Result<Vec<ItemRef>> {
        if !root.is_dir() {
            return Err(Error::Catalog(format!(
                "music root {} is not a readable directory",
                root.display()
            )));
        }

        let mut found: Vec<(String, PathBuf)> = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(settings.scan_depth)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_allowed_extension(entry.path(), &settings.extensions) {
                        let name = entry.file_name().to_string_lossy().into_owned();
                        found.push((name, entry.into_path()));
                    }
                }
                Err(e) => {
                    warn!("Error accessing catalog entry: {}", e);
                }
            }
        }

        found.sort();

        if found.len() > settings.max_items {
            warn!(
                "Music root holds {} playable files, keeping the first {}",
                found.len(),
                settings.max_items
            );
            found.truncate(settings.max_items);
        }

        debug!("Scanned {}: {} local items", root.display(), found.len());

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, (name, path))| ItemRef::local(index, name, path))
            .collect())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

#[async_trait]
impl CatalogProvider for FsCatalog {
    async fn list_local_items(&self) -> Result<Vec<ItemRef>> {
        let root = self.root.clone();
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || Self::scan(&root, &settings))
            .await
            .map_err(|e| Error::Internal(format!("catalog scan task failed: {}", e)))?
    }

    async fn list_remote_items(&self) -> Result<Vec<ItemRef>> {
        Ok(self
            .stations
            .iter()
            .enumerate()
            .map(|(index, station)| ItemRef::remote(index, station.name.clone(), station.url.clone()))
            .collect())
    }

    async fn item_exists(&self, item: &ItemRef) -> bool {
        match &item.source {
            SourceDescriptor::LocalFile { path } => tokio::fs::metadata(path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            SourceDescriptor::RemoteStream { .. } => true,
        }
    }
}
