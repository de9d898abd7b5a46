//! Object store adapter for extracted frames.
//!
//! [`ObjectStore`] sits between the extraction loop and wherever frame
//! bytes durably live. With remote storage enabled it uploads each frame to
//! a blob-store bucket and hands back a publicly retrievable URL; disabled,
//! [`store`](ObjectStore::store) is an identity pass-through returning the
//! local path unchanged and [`fetch`](ObjectStore::fetch) reads the local
//! filesystem.
//!
//! Upload failure is deliberately not an error: losing one frame's
//! durability must not abort a whole extraction task. Instead `store`
//! returns [`StoreOutcome::Degraded`] carrying the locator the upload
//! *would* have produced, so the failure stays visible downstream — a later
//! fetch of that locator will fail and be recorded in the archive manifest.

use std::{path::Path, time::Duration};

use reqwest::Client;

use crate::error::StillcutError;

/// Default bound on any single remote request (upload or fetch), so one
/// unreachable asset cannot stall a task or an archive indefinitely.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for a remote blob store.
///
/// The store is addressed Supabase-style: objects are uploaded to
/// `<endpoint>/object/<bucket>/<name>` with bearer authentication and read
/// anonymously from `<endpoint>/object/public/<bucket>/<name>`.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// Storage API base, e.g. `https://example.storage.dev/storage/v1`.
    pub endpoint: String,
    /// Bucket that receives extracted frames.
    pub bucket: String,
    /// API key sent as a bearer token on uploads and fallback fetches.
    pub api_key: String,
    /// Per-request timeout. Defaults to [`DEFAULT_REQUEST_TIMEOUT`].
    pub timeout: Duration,
}

/// Outcome of handing a frame to the store.
///
/// Both variants carry a locator; only `Stored` guarantees the bytes are
/// retrievable through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The frame is durably stored and retrievable at this locator.
    Stored(String),
    /// The upload failed; the locator encodes the intended remote location
    /// for debuggability, but fetching it will not succeed.
    Degraded {
        /// The locator the upload would have produced.
        locator: String,
        /// Why the upload failed.
        reason: String,
    },
}

impl StoreOutcome {
    /// The locator, regardless of durability.
    pub fn locator(&self) -> &str {
        match self {
            StoreOutcome::Stored(locator) => locator,
            StoreOutcome::Degraded { locator, .. } => locator,
        }
    }
}

enum Backend {
    /// Local pass-through: locators are filesystem paths.
    Local,
    /// Remote blob store.
    Remote { config: RemoteStoreConfig, client: Client },
}

/// Uploads extracted frames to a remote blob store, or passes local paths
/// through when remote storage is disabled.
pub struct ObjectStore {
    backend: Backend,
    /// Client used for direct (non-store) archive fetches.
    fetch_client: Client,
}

impl ObjectStore {
    /// A disabled store: `store` returns the local path, `fetch` reads it.
    ///
    /// # Errors
    ///
    /// [`StillcutError::Http`] when the fetch client cannot be built. The
    /// timeout is load-bearing even without a remote backend — it bounds
    /// direct archive fetches — so a client without one is never substituted.
    pub fn disabled() -> Result<Self, StillcutError> {
        Self::with_timeout(None, DEFAULT_REQUEST_TIMEOUT)
    }

    /// A store backed by the given remote endpoint.
    ///
    /// # Errors
    ///
    /// [`StillcutError::Http`] when either client cannot be built.
    pub fn remote(config: RemoteStoreConfig) -> Result<Self, StillcutError> {
        let timeout = config.timeout;
        Self::with_timeout(Some(config), timeout)
    }

    fn with_timeout(
        config: Option<RemoteStoreConfig>,
        timeout: Duration,
    ) -> Result<Self, StillcutError> {
        let fetch_client = Client::builder().timeout(timeout).build()?;

        let backend = match config {
            Some(config) => Backend::Remote {
                client: Client::builder().timeout(config.timeout).build()?,
                config,
            },
            None => Backend::Local,
        };

        Ok(Self {
            backend,
            fetch_client,
        })
    }

    /// Whether frames are uploaded to a remote store.
    ///
    /// When `true`, the extraction loop deletes its local copy of each
    /// frame after hand-off — ownership of the bytes transfers here.
    pub fn is_remote(&self) -> bool {
        matches!(self.backend, Backend::Remote { .. })
    }

    /// Store the file at `local_path` under `logical_name` and return a
    /// retrievable locator.
    ///
    /// Never fails: with remote storage enabled, an unreachable or
    /// rejecting store degrades to [`StoreOutcome::Degraded`] with the
    /// intended locator; disabled, this is an identity pass-through.
    pub async fn store(&self, local_path: &Path, logical_name: &str) -> StoreOutcome {
        let Backend::Remote { config, client } = &self.backend else {
            return StoreOutcome::Stored(local_path.to_string_lossy().into_owned());
        };

        let locator = format!(
            "{}/object/public/{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket,
            logical_name,
        );

        let bytes = match tokio::fs::read(local_path).await {
            Ok(bytes) => bytes,
            Err(error) => {
                log::warn!(
                    "Upload of {} degraded: could not read local copy: {error}",
                    local_path.display(),
                );
                return StoreOutcome::Degraded {
                    locator,
                    reason: format!("read failed: {error}"),
                };
            }
        };

        let upload_url = format!(
            "{}/object/{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket,
            logical_name,
        );

        let response = client
            .post(&upload_url)
            .bearer_auth(&config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(bytes)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                log::debug!("Stored {logical_name} at {locator}");
                StoreOutcome::Stored(locator)
            }
            Ok(response) => {
                let reason = format!("store rejected upload: HTTP {}", response.status());
                log::warn!("Upload of {logical_name} degraded: {reason}");
                StoreOutcome::Degraded { locator, reason }
            }
            Err(error) => {
                let reason = format!("store unreachable: {error}");
                log::warn!("Upload of {logical_name} degraded: {reason}");
                StoreOutcome::Degraded { locator, reason }
            }
        }
    }

    /// Fetch the bytes behind `locator`.
    ///
    /// Resolution order:
    /// 1. an HTTP(S) locator is fetched directly;
    /// 2. if that fails *and* the locator lives on the configured store
    ///    host, retry through the authenticated store API, treating the
    ///    trailing path segments as `bucket/object`;
    /// 3. anything else is read from the local filesystem.
    ///
    /// # Errors
    ///
    /// [`StillcutError::Fetch`] when every applicable path fails.
    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StillcutError> {
        if !locator.starts_with("http://") && !locator.starts_with("https://") {
            return tokio::fs::read(locator)
                .await
                .map_err(|error| StillcutError::Fetch {
                    locator: locator.to_string(),
                    reason: format!("local read failed: {error}"),
                });
        }

        let direct_failure = match self.fetch_direct(locator).await {
            Ok(bytes) => return Ok(bytes),
            Err(reason) => reason,
        };

        // Direct fetch failed. Only locators on our own store host get the
        // authenticated retry.
        if let Some(bytes) = self.fetch_via_store_api(locator).await? {
            return Ok(bytes);
        }

        Err(StillcutError::Fetch {
            locator: locator.to_string(),
            reason: direct_failure,
        })
    }

    async fn fetch_direct(&self, url: &str) -> Result<Vec<u8>, String> {
        let response = self
            .fetch_client
            .get(url)
            .send()
            .await
            .map_err(|error| format!("request failed: {error}"))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|error| format!("body read failed: {error}"))
    }

    /// Authenticated fallback fetch. Returns `Ok(None)` when the locator is
    /// not on the configured store host (no fallback applies).
    async fn fetch_via_store_api(
        &self,
        locator: &str,
    ) -> Result<Option<Vec<u8>>, StillcutError> {
        let Backend::Remote { config, client } = &self.backend else {
            return Ok(None);
        };

        let endpoint = config.endpoint.trim_end_matches('/');
        let Some(object_path) = locator
            .strip_prefix(endpoint)
            .and_then(|rest| rest.strip_prefix("/object/public/"))
        else {
            return Ok(None);
        };

        log::debug!("Retrying {locator} through the authenticated store API");

        let url = format!("{endpoint}/object/{object_path}");
        let response = client
            .get(&url)
            .bearer_auth(&config.api_key)
            .send()
            .await
            .map_err(|error| StillcutError::Fetch {
                locator: locator.to_string(),
                reason: format!("store API request failed: {error}"),
            })?;

        if !response.status().is_success() {
            return Err(StillcutError::Fetch {
                locator: locator.to_string(),
                reason: format!("store API returned HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| StillcutError::Fetch {
                locator: locator.to_string(),
                reason: format!("store API body read failed: {error}"),
            })?;

        Ok(Some(bytes.to_vec()))
    }
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: "frames".to_string(),
            api_key: String::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
