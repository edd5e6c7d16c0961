// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Syncthing REST interface.
//!
//! Thin client over the parts of the Syncthing REST API that selective
//! synchronization needs: folder discovery, database browsing, per-file
//! database records, and reading or writing a folder's ignore list.
//!
//! # Caching
//!
//! Database records are cached per client, because reconciling a directory
//! looks up every child one level deeper, and expanding that child later
//! looks the same paths up again. The cache is dropped with
//! [`SyncthingClient::clear_cache`], and implicitly whenever an ignore list
//! is written, since that changes the `ignored` flag of every record.
//!
//! # See Also
//!
//! - [Syncthing REST API](https://docs.syncthing.net/dev/rest.html)

use crate::{
    config::ApiSettings,
    folder::{ignores::IgnoreList, node::NodeKind, FolderDatabase, IgnoreStore},
};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Mutex, time::Duration};
use tracing::{debug, instrument};
use url::Url;

const API_KEY_HEADER: &str = "X-API-Key";

/// Client for the Syncthing REST interface.
#[derive(Debug)]
pub struct SyncthingClient {
    http: Client,
    base_url: Url,
    api_key: String,
    cache: Mutex<HashMap<(String, String), Option<FileInfo>>>,
}

impl SyncthingClient {
    /// Construct client against the default local listener.
    ///
    /// # Errors
    ///
    /// - Return [`SyncthingError::Url`] if the default URL cannot be parsed.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(crate::config::DEFAULT_API_URL, api_key)
    }

    /// Construct client against a specific listener.
    ///
    /// # Errors
    ///
    /// - Return [`SyncthingError::Url`] if `base_url` is not a valid URL.
    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Construct client from configuration settings.
    ///
    /// # Errors
    ///
    /// - Return [`SyncthingError::Url`] if configured URL is invalid.
    /// - Return [`SyncthingError::Request`] if HTTP client cannot be built.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(&settings.url)?,
            api_key: settings.key.clone(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Query daemon version.
    #[instrument(skip(self), level = "debug")]
    pub async fn version(&self) -> Result<Version> {
        let url = self.endpoint("/rest/system/version")?;
        let response = self.http.get(url).header(API_KEY_HEADER, &self.api_key).send().await?;
        Self::handle_response(response).await
    }

    /// List configured folders.
    #[instrument(skip(self), level = "debug")]
    pub async fn folders(&self) -> Result<Vec<FolderConfig>> {
        let url = self.endpoint("/rest/config/folders")?;
        let response = self.http.get(url).header(API_KEY_HEADER, &self.api_key).send().await?;
        Self::handle_response(response).await
    }

    /// Browse the global database tree below `prefix`.
    ///
    /// A `levels` value of zero lists immediate children only. Each extra
    /// level attaches the children of directories one level deeper.
    #[instrument(skip(self), level = "debug")]
    pub async fn browse(&self, folder: &str, prefix: &str, levels: u32) -> Result<Vec<BrowseEntry>> {
        let mut url = self.endpoint("/rest/db/browse")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("folder", folder);
            if !prefix.is_empty() {
                query.append_pair("prefix", prefix);
            }
            query.append_pair("levels", &levels.to_string());
        }
        let response = self.http.get(url).header(API_KEY_HEADER, &self.api_key).send().await?;
        Self::handle_response(response).await
    }

    /// Fetch database record for a single path.
    ///
    /// Return `None` if the daemon has no record of the path.
    #[instrument(skip(self), level = "debug")]
    pub async fn file_info(&self, folder: &str, path: &str) -> Result<Option<FileInfo>> {
        let key = (folder.to_string(), path.to_string());
        if let Some(hit) = self.cache_lookup(&key) {
            debug!("cache hit for {path:?}");
            return Ok(hit);
        }

        let mut url = self.endpoint("/rest/db/file")?;
        url.query_pairs_mut()
            .append_pair("folder", folder)
            .append_pair("file", path);
        let response = self.http.get(url).header(API_KEY_HEADER, &self.api_key).send().await?;
        let info = if response.status() == StatusCode::NOT_FOUND {
            None
        } else {
            Some(Self::handle_response::<FileInfo>(response).await?)
        };

        self.cache_store(key, info.clone());
        Ok(info)
    }

    /// Read folder's ignore list.
    #[instrument(skip(self), level = "debug")]
    pub async fn ignores(&self, folder: &str) -> Result<IgnoreList> {
        let mut url = self.endpoint("/rest/db/ignores")?;
        url.query_pairs_mut().append_pair("folder", folder);
        let response = self.http.get(url).header(API_KEY_HEADER, &self.api_key).send().await?;
        let payload: IgnoresPayload = Self::handle_response(response).await?;
        Ok(payload.ignore.unwrap_or_default().into())
    }

    /// Replace folder's ignore list wholesale.
    #[instrument(skip(self, ignores), level = "debug")]
    pub async fn set_ignores(&self, folder: &str, ignores: &IgnoreList) -> Result<()> {
        let mut url = self.endpoint("/rest/db/ignores")?;
        url.query_pairs_mut().append_pair("folder", folder);
        let payload = IgnoresPayload {
            ignore: Some(ignores.as_slice().to_vec()),
        };
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncthingError::Api { status, body });
        }

        // INVARIANT: New ignore list invalidates every cached ignored flag.
        self.clear_cache();
        Ok(())
    }

    /// Drop all cached database records.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cache_lookup(&self, key: &(String, String)) -> Option<Option<FileInfo>> {
        self.cache.lock().ok().and_then(|cache| cache.get(key).cloned())
    }

    fn cache_store(&self, key: (String, String), info: Option<FileInfo>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, info);
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SyncthingError::Api { status, body })
        }
    }
}

impl FolderDatabase for SyncthingClient {
    async fn browse(&self, folder: &str, prefix: &str, levels: u32) -> Result<Vec<BrowseEntry>> {
        SyncthingClient::browse(self, folder, prefix, levels).await
    }

    async fn file_info(&self, folder: &str, path: &str) -> Result<Option<FileInfo>> {
        SyncthingClient::file_info(self, folder, path).await
    }
}

impl IgnoreStore for SyncthingClient {
    async fn ignores(&self, folder: &str) -> Result<IgnoreList> {
        SyncthingClient::ignores(self, folder).await
    }

    async fn set_ignores(&self, folder: &str, ignores: &IgnoreList) -> Result<()> {
        SyncthingClient::set_ignores(self, folder, ignores).await
    }
}

/// Daemon version information.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub version: String,
    #[serde(default)]
    pub long_version: String,
}

/// Configured folder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
}

impl FolderConfig {
    /// Label if set, otherwise the folder ID.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Entry of a database browse listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BrowseEntry>,
}

impl BrowseEntry {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = BrowseEntry>) -> Self {
        self.children = children.into_iter().collect();
        self
    }
}

/// Database record of a single path.
///
/// Holds the global (cluster-wide) and local view of the path. Fields that
/// syncsel does not interpret are kept so the record can be shown verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileInfo {
    #[serde(default)]
    pub global: FileRecord,
    #[serde(default)]
    pub local: FileRecord,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One side of a [`FileInfo`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FileRecord {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct IgnoresPayload {
    #[serde(default)]
    ignore: Option<Vec<String>>,
}

/// Syncthing REST error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncthingError {
    /// Transport or decoding failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint URL cannot be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Daemon answered with a non-success status.
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl SyncthingError {
    /// Daemon rejected the API key.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            SyncthingError::Api { status, .. }
                if matches!(*status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        )
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyncthingError> = std::result::Result<T, E>;
