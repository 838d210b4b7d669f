//! Error types surfaced by the catalog, the change cache and the build steps.
//!
//! Each component reports its own failure kind; [`BuildError`] gathers them
//! for the pipeline so callers can match on the step that failed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A selection token named no chapter in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown chapter `{chapter}`; expected `all` or one of the catalog chapters")]
pub struct UnknownChapterError {
    /// The token that failed to resolve.
    pub chapter: String,
}

/// The catalog configuration violates one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A chapter was declared without any build variants.
    #[error("chapter `{0}` has no build variants")]
    EmptyChapter(String),
    /// The same chapter name was declared twice.
    #[error("chapter `{0}` is declared more than once")]
    DuplicateChapter(String),
    /// A chapter used a name reserved for selection tokens.
    #[error("`{0}` is reserved and cannot be used as a chapter name")]
    ReservedName(String),
}

/// The remote timestamp could not be obtained.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed or returned a non-success status.
    #[error("request to {url} failed: {source}")]
    Request {
        /// URL that was queried.
        url: String,
        /// Transport or status error.
        #[source]
        source: reqwest::Error,
    },
    /// The response carried no `Last-Modified` header.
    #[error("response from {url} has no Last-Modified header")]
    MissingHeader {
        /// URL that was queried.
        url: String,
    },
    /// The `Last-Modified` header was not valid visible ASCII.
    #[error("response from {url} has an unreadable Last-Modified header")]
    InvalidHeader {
        /// URL that was queried.
        url: String,
    },
}

/// The durable cache file could not be read or written.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the cache file failed for a reason other than absence.
    #[error("failed to read cache file {path}: {source}")]
    Read {
        /// Cache file location.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The cache file did not hold a flat object of strings.
    #[error("cache file {path} is malformed: {source}")]
    Parse {
        /// Cache file location.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory map could not be encoded.
    #[error("failed to encode cache: {0}")]
    Encode(#[source] serde_json::Error),
    /// Writing or renaming the cache file failed.
    #[error("failed to write cache file {path}: {source}")]
    Write {
        /// Cache file location.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// An external command could not be run to completion.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        /// Program name as invoked.
        program: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The program ran but exited unsuccessfully.
    #[error("`{command}` exited with {}", describe_exit(.code))]
    Failed {
        /// Full command line, for diagnostics.
        command: String,
        /// Exit code, absent when terminated by a signal.
        code: Option<i32>,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}

/// Failure of one step of the build pipeline.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configured catalog is invalid.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The requested chapter does not exist.
    #[error(transparent)]
    UnknownChapter(#[from] UnknownChapterError),
    /// A remote timestamp check failed.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// The change cache could not be loaded or saved.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An external command failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
    /// Cleaning up stale files failed.
    #[error("failed to remove {path}: {source}")]
    Cleanup {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// CI tag selection was requested but no git ref is available.
    #[error("`github_actions` was selected but GITHUB_REF is not set; are you running under GitHub Actions?")]
    MissingGitRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(2), "`7z x vanilla.7z -y` exited with status 2")]
    #[case(None, "`7z x vanilla.7z -y` exited with a signal")]
    fn failed_process_reports_exit(#[case] code: Option<i32>, #[case] expected: &str) {
        let err = ProcessError::Failed {
            command: "7z x vanilla.7z -y".to_owned(),
            code,
        };
        assert_eq!(err.to_string(), expected);
    }

    #[rstest]
    fn unknown_chapter_names_the_token() {
        let err = UnknownChapterError {
            chapter: "higurashi".to_owned(),
        };
        assert!(err.to_string().contains("`higurashi`"));
    }
}
