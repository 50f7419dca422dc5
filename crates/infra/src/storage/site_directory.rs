//! JSON file site directory
//!
//! The whole directory lives in one document:
//!
//! ```json
//! { "default_site": "acme", "sites": { "acme": { "site_id": "acme", ... } } }
//! ```
//!
//! Every mutation rewrites the document to a uniquely named temp file next
//! to it and renames it into place, so readers never see a torn file. The
//! parsed document is cached behind an async mutex that also serializes
//! writers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use siteauth_core::SiteDirectory;
use siteauth_domain::{SiteRecord, SiteRecordPatch, StorageError};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct DirectoryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_site: Option<String>,
    #[serde(default)]
    sites: BTreeMap<String, SiteRecord>,
}

/// [`SiteDirectory`] persisted as a JSON document on disk
pub struct FileSiteDirectory {
    path: PathBuf,
    cache: Mutex<Option<DirectoryDocument>>,
}

impl FileSiteDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the document, loading it on first use
    async fn read<T>(&self, f: impl FnOnce(&DirectoryDocument) -> T) -> Result<T, StorageError> {
        let mut cache = self.cache.lock().await;
        let document = match cache.take() {
            Some(document) => document,
            None => load(&self.path).await?,
        };
        let out = f(&document);
        *cache = Some(document);
        Ok(out)
    }

    /// Apply `f` to a copy of the document, persist it, then publish it to
    /// the cache. A failed write leaves both file and cache unchanged.
    async fn update<T>(
        &self,
        f: impl FnOnce(&mut DirectoryDocument) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut cache = self.cache.lock().await;
        let mut document = match cache.as_ref() {
            Some(document) => document.clone(),
            None => load(&self.path).await?,
        };

        let out = f(&mut document)?;
        save(&self.path, &document).await?;
        *cache = Some(document);
        Ok(out)
    }
}

async fn load(path: &Path) -> Result<DirectoryDocument, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) if contents.trim().is_empty() => Ok(DirectoryDocument::default()),
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|err| StorageError::Corrupt(format!("{}: {err}", path.display()))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Site directory not found; starting empty");
            Ok(DirectoryDocument::default())
        }
        Err(err) => Err(StorageError::Unavailable(format!("{}: {err}", path.display()))),
    }
}

async fn save(path: &Path, document: &DirectoryDocument) -> Result<(), StorageError> {
    let io_err = |err: std::io::Error| StorageError::Unavailable(format!("{}: {err}", path.display()));

    let json = serde_json::to_string_pretty(document)
        .map_err(|err| StorageError::Corrupt(err.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp_path = path.with_file_name(format!("{file_name}.{}.tmp", Uuid::new_v4().simple()));

    if let Err(err) = tokio::fs::write(&tmp_path, json).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(err));
    }
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(err));
    }
    Ok(())
}

#[async_trait]
impl SiteDirectory for FileSiteDirectory {
    async fn list(&self) -> Result<BTreeMap<String, SiteRecord>, StorageError> {
        self.read(|doc| doc.sites.clone()).await
    }

    async fn get(&self, site_id: &str) -> Result<Option<SiteRecord>, StorageError> {
        self.read(|doc| doc.sites.get(site_id).cloned()).await
    }

    async fn upsert(
        &self,
        site_id: &str,
        patch: SiteRecordPatch,
    ) -> Result<SiteRecord, StorageError> {
        let merged = self
            .update(|doc| {
                let merged = match doc.sites.get(site_id).cloned() {
                    Some(mut existing) => {
                        existing.merge(patch);
                        existing
                    }
                    None => patch.into_record(site_id)?,
                };
                doc.sites.insert(site_id.to_string(), merged.clone());
                Ok(merged)
            })
            .await?;

        debug!(site_id = %site_id, "Site record upserted");
        Ok(merged)
    }

    async fn remove(&self, site_id: &str) -> Result<(), StorageError> {
        self.update(|doc| {
            doc.sites.remove(site_id);
            if doc.default_site.as_deref() == Some(site_id) {
                doc.default_site = None;
            }
            Ok(())
        })
        .await?;

        info!(site_id = %site_id, "Site removed from directory");
        Ok(())
    }

    async fn get_default(&self) -> Result<Option<String>, StorageError> {
        self.read(|doc| doc.default_site.clone()).await
    }

    async fn set_default(&self, site_id: &str) -> Result<(), StorageError> {
        self.update(|doc| {
            if !doc.sites.contains_key(site_id) {
                return Err(StorageError::UnknownSite(site_id.to_string()));
            }
            doc.default_site = Some(site_id.to_string());
            Ok(())
        })
        .await
    }

    async fn clear_default(&self) -> Result<(), StorageError> {
        self.update(|doc| {
            doc.default_site = None;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::site_directory.
    use tempfile::TempDir;

    use super::*;

    fn patch(base_url: &str) -> SiteRecordPatch {
        SiteRecordPatch {
            base_url: Some(base_url.into()),
            oauth_client_id: Some("desktop".into()),
            ..SiteRecordPatch::default()
        }
    }

    fn directory() -> (FileSiteDirectory, TempDir) {
        let dir = TempDir::new().unwrap();
        (FileSiteDirectory::new(dir.path().join("sites.json")), dir)
    }

    /// Validates that a missing file reads as an empty directory.
    ///
    /// Assertions:
    /// - No sites and no default
    /// - Nothing is written by reads
    #[tokio::test]
    async fn missing_file_is_empty_directory() {
        let (directory, _dir) = directory();

        assert!(directory.list().await.unwrap().is_empty());
        assert_eq!(directory.get_default().await.unwrap(), None);
        assert!(!directory.path().exists());
    }

    /// Validates upsert merge semantics.
    ///
    /// Assertions:
    /// - Creation needs base URL and client id
    /// - Later patches overwrite only the fields they carry
    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let (directory, _dir) = directory();

        let incomplete = SiteRecordPatch { display_name: Some("Acme".into()), ..Default::default() };
        assert!(matches!(
            directory.upsert("acme", incomplete).await,
            Err(StorageError::Incomplete { .. })
        ));

        directory.upsert("acme", patch("https://acme.example.com")).await.unwrap();
        let merged = directory
            .upsert(
                "acme",
                SiteRecordPatch { display_name: Some("Acme Corp".into()), ..Default::default() },
            )
            .await
            .unwrap();

        assert_eq!(merged.base_url, "https://acme.example.com");
        assert_eq!(merged.display_name, "Acme Corp");
        assert_eq!(directory.get("acme").await.unwrap(), Some(merged));
    }

    /// Validates default pointer handling.
    ///
    /// Assertions:
    /// - Unknown sites cannot become default
    /// - Removing the default site clears the pointer
    #[tokio::test]
    async fn default_pointer_follows_sites() {
        let (directory, _dir) = directory();
        assert_eq!(
            directory.set_default("ghost").await,
            Err(StorageError::UnknownSite("ghost".into()))
        );

        directory.upsert("acme", patch("https://acme.example.com")).await.unwrap();
        directory.set_default("acme").await.unwrap();
        assert_eq!(directory.get_default().await.unwrap().as_deref(), Some("acme"));

        directory.remove("acme").await.unwrap();
        assert_eq!(directory.get_default().await.unwrap(), None);
        assert!(directory.get("acme").await.unwrap().is_none());
    }

    /// Validates persistence across instances.
    ///
    /// Assertions:
    /// - A fresh instance over the same file sees sites and default
    /// - No temp files are left behind
    #[tokio::test]
    async fn state_survives_reopen() {
        let (directory, dir) = directory();
        directory.upsert("acme", patch("https://acme.example.com")).await.unwrap();
        directory.upsert("beta", patch("https://beta.example.com")).await.unwrap();
        directory.set_default("beta").await.unwrap();

        let reopened = FileSiteDirectory::new(directory.path());

        assert_eq!(reopened.list().await.unwrap().len(), 2);
        assert_eq!(reopened.get_default().await.unwrap().as_deref(), Some("beta"));
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    /// Validates handling of a corrupt document.
    ///
    /// Assertions:
    /// - Reads report `Corrupt`
    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let (directory, _dir) = directory();
        std::fs::write(directory.path(), "{ not json").unwrap();

        assert!(matches!(directory.list().await, Err(StorageError::Corrupt(_))));
    }
}
