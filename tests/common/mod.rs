//! Shared fakes for pipeline integration tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ui_assets_build::{
    CommandRunner, Invocation, NetworkError, ProcessError, TimestampFetcher,
};

/// Serves fixed `Last-Modified` values; unknown URLs fail like a missing
/// header.
#[derive(Debug, Default, Clone)]
pub struct StubFetcher {
    stamps: HashMap<String, String>,
}

impl StubFetcher {
    /// Adds a timestamp for `url`.
    #[must_use]
    pub fn with(mut self, url: &str, stamp: &str) -> Self {
        self.stamps.insert(url.to_owned(), stamp.to_owned());
        self
    }
}

impl TimestampFetcher for StubFetcher {
    fn last_modified(&self, url: &str) -> Result<String, NetworkError> {
        self.stamps
            .get(url)
            .cloned()
            .ok_or_else(|| NetworkError::MissingHeader {
                url: url.to_owned(),
            })
    }
}

/// Records every command and imitates `curl` and `7z` on disk.
///
/// `curl` creates the archive named after the URL's last segment, `7z x`
/// replaces the archive with a folder listed in `extracts`.
#[derive(Debug, Default)]
pub struct FakeRunner {
    /// Archive file name to the folder it extracts to.
    pub extracts: HashMap<String, PathBuf>,
    /// Whether `cargo -v` succeeds.
    pub cargo_available: bool,
    /// Trailing variant text whose compiler run fails.
    pub failing_variant: Option<String>,
    /// Commands run so far, rendered as strings.
    pub log: RefCell<Vec<String>>,
}

impl FakeRunner {
    /// Runner that knows how to extract `archive` into `folder`.
    #[must_use]
    pub fn extracting(mut self, archive: &str, folder: impl AsRef<Path>) -> Self {
        self.extracts
            .insert(archive.to_owned(), folder.as_ref().to_path_buf());
        self
    }

    /// Commands whose program is `program`.
    #[must_use]
    pub fn commands_for(&self, program: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|c| c.split(' ').next() == Some(program))
            .cloned()
            .collect()
    }

    fn simulate(&self, inv: &Invocation) -> std::io::Result<()> {
        let dir = inv.current_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        match inv.program.as_str() {
            "curl" => {
                let url = inv.args.last().map(String::as_str).unwrap_or_default();
                let name = url.rsplit('/').next().unwrap_or(url);
                fs::write(dir.join(name), b"archive")
            }
            "7z" => {
                let archive = inv.args.get(1).map(String::as_str).unwrap_or_default();
                if let Some(folder) = self.extracts.get(archive) {
                    fs::create_dir_all(dir.join(folder))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
        let rendered = invocation.to_string();
        self.log.borrow_mut().push(rendered.clone());
        if let Some(failing) = &self.failing_variant {
            if rendered.ends_with(failing.as_str()) {
                return Err(ProcessError::Failed {
                    command: rendered,
                    code: Some(1),
                });
            }
        }
        self.simulate(invocation)
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.clone(),
                source,
            })
    }

    fn probe(&self, invocation: &Invocation) -> bool {
        invocation.program == "cargo" && self.cargo_available
    }
}
