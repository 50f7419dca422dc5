//! Site directory records

use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

/// One backend deployment the client can authenticate against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: String,
    pub base_url: String,
    pub oauth_client_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub logo_ref: Option<String>,
    #[serde(default)]
    pub server_version_tags: Vec<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl SiteRecord {
    #[must_use]
    pub fn new(
        site_id: impl Into<String>,
        base_url: impl Into<String>,
        oauth_client_id: impl Into<String>,
    ) -> Self {
        let site_id = site_id.into();
        Self {
            display_name: site_id.clone(),
            site_id,
            base_url: base_url.into(),
            oauth_client_id: oauth_client_id.into(),
            logo_ref: None,
            server_version_tags: Vec::new(),
            timezone: None,
        }
    }

    /// Resolve a fixed relative endpoint path against `base_url`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Apply every field present in `patch`; later writes win per field.
    pub fn merge(&mut self, patch: SiteRecordPatch) {
        if let Some(base_url) = patch.base_url {
            self.base_url = base_url;
        }
        if let Some(client_id) = patch.oauth_client_id {
            self.oauth_client_id = client_id;
        }
        if let Some(display_name) = patch.display_name {
            self.display_name = display_name;
        }
        if let Some(logo_ref) = patch.logo_ref {
            self.logo_ref = Some(logo_ref);
        }
        if let Some(tags) = patch.server_version_tags {
            self.server_version_tags = tags;
        }
        if let Some(timezone) = patch.timezone {
            self.timezone = Some(timezone);
        }
    }
}

/// Partial site record used by `upsert`
///
/// `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl SiteRecordPatch {
    /// Whether the patch carries no fields at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.base_url.is_none()
            && self.oauth_client_id.is_none()
            && self.display_name.is_none()
            && self.logo_ref.is_none()
            && self.server_version_tags.is_none()
            && self.timezone.is_none()
    }

    /// Materialize a brand-new record from this patch.
    ///
    /// # Errors
    /// Returns `StorageError::Incomplete` when `base_url` or
    /// `oauth_client_id` is missing, since the site would be unreachable.
    pub fn into_record(self, site_id: &str) -> Result<SiteRecord, StorageError> {
        let base_url = self.base_url.clone().ok_or_else(|| StorageError::Incomplete {
            site_id: site_id.to_string(),
            field: "base_url",
        })?;
        let client_id = self.oauth_client_id.clone().ok_or_else(|| StorageError::Incomplete {
            site_id: site_id.to_string(),
            field: "oauth_client_id",
        })?;

        let mut record = SiteRecord::new(site_id, base_url, client_id);
        record.merge(self);
        Ok(record)
    }
}

impl From<SiteRecord> for SiteRecordPatch {
    fn from(record: SiteRecord) -> Self {
        Self {
            base_url: Some(record.base_url),
            oauth_client_id: Some(record.oauth_client_id),
            display_name: Some(record.display_name),
            logo_ref: record.logo_ref,
            server_version_tags: Some(record.server_version_tags),
            timezone: record.timezone,
        }
    }
}
