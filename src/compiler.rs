//! Invocation of the UI compiler, once per build variant.

use std::path::{Path, PathBuf};

use log::info;

use crate::archive::download;
use crate::catalog::BuildVariant;
use crate::error::ProcessError;
use crate::process::{absolute, CommandRunner, Invocation};

/// Release asset used when no Rust toolchain is available.
pub const PREBUILT_COMPILER_URL: &str =
    "https://github.com/07th-mod/ui-editing-scripts/releases/latest/download/ui-compiler.exe";

const PREBUILT_COMPILER_FILE: &str = "ui-compiler.exe";

/// How variants get compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCompiler {
    /// Build and run the compiler from the sources in the working directory.
    Cargo,
    /// Run a downloaded release binary.
    Prebuilt(PathBuf),
}

impl UiCompiler {
    /// Uses `cargo` when it works, otherwise downloads the release binary
    /// from `prebuilt_url` into `work_dir`.
    ///
    /// The downloaded binary is recorded by absolute path, since it is later
    /// run with `work_dir` as the child's working directory.
    ///
    /// # Errors
    /// Returns [`ProcessError`] if the fallback download fails.
    pub fn detect(
        runner: &dyn CommandRunner,
        prebuilt_url: &str,
        work_dir: &Path,
    ) -> Result<Self, ProcessError> {
        if runner.probe(&Invocation::new("cargo").arg("-v").current_dir(work_dir)) {
            info!("Found working Rust/cargo - will compile the UI compiler from source");
            return Ok(Self::Cargo);
        }
        info!("No working Rust/cargo found - downloading UI compiler release");
        runner.run(&download(prebuilt_url, work_dir))?;
        Ok(Self::Prebuilt(absolute(work_dir.join(PREBUILT_COMPILER_FILE))))
    }

    /// Command line that builds `variant`.
    #[must_use]
    pub fn invocation(&self, variant: &BuildVariant) -> Invocation {
        match self {
            Self::Cargo => Invocation::new("cargo").arg("run").args(variant.args()),
            Self::Prebuilt(path) => {
                Invocation::new(path.to_string_lossy()).args(variant.args())
            }
        }
    }

    /// Builds one variant.
    ///
    /// # Errors
    /// Returns [`ProcessError`] if the compiler fails to start or exits
    /// non-zero.
    pub fn build(
        &self,
        variant: &BuildVariant,
        runner: &dyn CommandRunner,
        work_dir: &Path,
        extra_path: &[PathBuf],
    ) -> Result<(), ProcessError> {
        info!("Building .assets for {variant}...");
        runner.run(
            &self
                .invocation(variant)
                .current_dir(work_dir)
                .extra_path(extra_path),
        )
    }
}
