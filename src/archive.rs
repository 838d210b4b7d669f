//! Download-and-extract of remote archives, skipped when nothing changed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::cache::RemoteChangeCache;
use crate::error::BuildError;
use crate::process::{CommandRunner, Invocation};

const ARCHIVE_HOST: &str = "http://07th-mod.com/archive";

/// A remote archive unpacked into the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResource {
    /// Human-readable label for logs.
    pub name: String,
    /// Download location.
    pub url: String,
    /// File name `curl` saves the download as.
    pub archive: PathBuf,
    /// Directory the archive extracts to.
    pub folder: PathBuf,
    /// Whether `folder` holds tools the UI compiler must find on `PATH`.
    #[serde(default)]
    pub add_to_path: bool,
}

/// Result of [`refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The archive was downloaded and extracted.
    Downloaded,
    /// The existing extraction was kept.
    Skipped,
}

impl ArchiveResource {
    /// Vanilla game assets every variant is built from.
    #[must_use]
    pub fn vanilla_assets() -> Self {
        Self {
            name: "vanilla assets".to_owned(),
            url: format!("{ARCHIVE_HOST}/vanilla.7z"),
            archive: PathBuf::from("vanilla.7z"),
            folder: Path::new("assets").join("vanilla"),
            add_to_path: false,
        }
    }

    /// UABE, bundled with the VC++ 2010 runtime DLLs it needs.
    #[must_use]
    pub fn asset_bundle_extractor() -> Self {
        const ARCHIVE: &str = "AssetsBundleExtractor_2.2stabled_64bit_with_VC2010.zip";
        Self {
            name: "UABE".to_owned(),
            url: format!("{ARCHIVE_HOST}/{ARCHIVE}"),
            archive: PathBuf::from(ARCHIVE),
            folder: PathBuf::from("64bit"),
            add_to_path: true,
        }
    }

    /// The archives fetched before any variant is built.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::vanilla_assets(), Self::asset_bundle_extractor()]
    }

    /// The extraction folder exists and the archive is gone.
    ///
    /// The archive is only deleted after a successful extraction, so its
    /// presence means a previous run was interrupted.
    #[must_use]
    pub fn is_fully_extracted(&self, work_dir: &Path) -> bool {
        work_dir.join(&self.folder).exists() && !work_dir.join(&self.archive).exists()
    }
}

/// Ensures `resource` is extracted and current.
///
/// The remote is always checked first so the cache records the latest
/// timestamp. The archive is re-fetched when the remote changed, when
/// `force` is set, or when a previous extraction is incomplete. The cache is
/// saved only after a successful extraction.
///
/// # Errors
/// Returns [`BuildError`] if the remote check, cleanup, download, extraction
/// or cache save fails.
pub fn refresh(
    resource: &ArchiveResource,
    cache: &mut RemoteChangeCache,
    force: bool,
    runner: &dyn CommandRunner,
    work_dir: &Path,
) -> Result<Refresh, BuildError> {
    let changed = cache.check_and_record(&resource.url)?;
    if !changed && !force && resource.is_fully_extracted(work_dir) {
        info!("{} already extracted - skipping", resource.name);
        return Ok(Refresh::Skipped);
    }

    info!("Downloading and extracting {}", resource.name);
    let archive = work_dir.join(&resource.archive);
    let folder = work_dir.join(&resource.folder);
    remove_file_if_present(&archive)?;
    if folder.exists() {
        fs::remove_dir_all(&folder).map_err(|source| BuildError::Cleanup {
            path: folder.clone(),
            source,
        })?;
    }

    info!("Starting download of URL: {}", resource.url);
    runner.run(&download(&resource.url, work_dir))?;
    runner.run(
        &Invocation::new("7z")
            .arg("x")
            .arg(resource.archive.to_string_lossy())
            .arg("-y")
            .current_dir(work_dir),
    )?;

    remove_file_if_present(&archive)?;
    cache.save()?;
    Ok(Refresh::Downloaded)
}

/// `curl` invocation saving `url` under its remote file name in `work_dir`.
#[must_use]
pub fn download(url: &str, work_dir: &Path) -> Invocation {
    Invocation::new("curl")
        .args(["-OJLf", url])
        .current_dir(work_dir)
}

fn remove_file_if_present(path: &Path) -> Result<(), BuildError> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(BuildError::Cleanup {
            path: path.to_path_buf(),
            source: e,
        }),
        _ => Ok(()),
    }
}
