//! Remote change detection keyed on the HTTP `Last-Modified` header.
//!
//! [`RemoteChangeCache`] remembers the last timestamp seen for each URL in a
//! flat JSON object. Checks update memory only; [`RemoteChangeCache::save`]
//! must be called to persist them.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{LAST_MODIFIED, USER_AGENT};
use tempfile::NamedTempFile;

use crate::error::{NetworkError, StorageError};

/// Default location of the cache file, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "lastModified.json";

/// Source of remote modification timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait TimestampFetcher {
    /// Returns the raw `Last-Modified` value advertised for `url`.
    ///
    /// # Errors
    /// Returns [`NetworkError`] when the request fails or the header is
    /// absent.
    fn last_modified(&self, url: &str) -> Result<String, NetworkError>;
}

/// Fetches timestamps with a metadata-only `HEAD` request.
#[derive(Debug, Clone)]
pub struct HttpTimestampFetcher {
    client: Client,
}

impl HttpTimestampFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns [`NetworkError::Client`] if the TLS backend fails to
    /// initialise.
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NetworkError::Client)?;
        Ok(Self { client })
    }
}

impl TimestampFetcher for HttpTimestampFetcher {
    fn last_modified(&self, url: &str) -> Result<String, NetworkError> {
        let request_failed = |source| NetworkError::Request {
            url: url.to_owned(),
            source,
        };
        // The archive host expects the User-Agent key; its value stays empty.
        let resp = self
            .client
            .head(url)
            .header(USER_AGENT, "")
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(request_failed)?;
        let value = resp
            .headers()
            .get(LAST_MODIFIED)
            .ok_or_else(|| NetworkError::MissingHeader {
                url: url.to_owned(),
            })?;
        let text = value.to_str().map_err(|_| NetworkError::InvalidHeader {
            url: url.to_owned(),
        })?;
        Ok(text.to_owned())
    }
}

/// Persisted map from URL to the last observed `Last-Modified` value.
pub struct RemoteChangeCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    fetcher: Box<dyn TimestampFetcher>,
}

impl std::fmt::Debug for RemoteChangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteChangeCache")
            .field("path", &self.path)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl RemoteChangeCache {
    /// Loads the cache stored at `path`.
    ///
    /// A missing file yields an empty cache.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the file exists but cannot be read or is
    /// not a flat object of strings.
    pub fn load(
        path: impl Into<PathBuf>,
        fetcher: Box<dyn TimestampFetcher>,
    ) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| StorageError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no cache at {}; starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(StorageError::Read { path, source }),
        };
        Ok(Self {
            path,
            entries,
            fetcher,
        })
    }

    /// Queries the current remote timestamp for `url`, trimmed.
    ///
    /// # Errors
    /// Propagates the fetcher's [`NetworkError`].
    pub fn fetch_remote_timestamp(&self, url: &str) -> Result<String, NetworkError> {
        let raw = self.fetcher.last_modified(url)?;
        Ok(raw.trim().to_owned())
    }

    /// Reports whether `url` changed since it was last recorded, and records
    /// the remote value in memory if so.
    ///
    /// Calling this twice without a remote change returns `false` the second
    /// time, because the first call already stored the new value.
    ///
    /// # Errors
    /// Returns [`NetworkError`] without touching the stored entry.
    pub fn check_and_record(&mut self, url: &str) -> Result<bool, NetworkError> {
        let remote = self.fetch_remote_timestamp(url)?;
        let local = self.entries.get(url);

        if local == Some(&remote) {
            info!("{url}: local and remote dates match ({remote})");
            return Ok(false);
        }

        info!(
            "{url}: local {} differs from remote {remote}",
            local.map_or("<none>", String::as_str)
        );
        self.entries.insert(url.to_owned(), remote);
        Ok(true)
    }

    /// Writes the whole map to disk, replacing any previous contents.
    ///
    /// The file is written beside its destination and renamed into place.
    ///
    /// # Errors
    /// Returns [`StorageError`] if encoding, writing or renaming fails.
    pub fn save(&self) -> Result<(), StorageError> {
        let write_failed = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&self.entries).map_err(StorageError::Encode)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(json.as_bytes()).map_err(write_failed)?;
        tmp.persist(&self.path)
            .map_err(|e| write_failed(e.error))?;
        debug!(
            "saved {} cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Timestamp recorded for `url`, if any.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    /// Number of recorded URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
