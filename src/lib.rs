//! Build orchestration for chapter UI asset variants.
//!
//! Fetches the vanilla assets and the UABE extraction tool, skipping the
//! download when the remote `Last-Modified` is unchanged, then runs the UI
//! compiler once per build variant of the selected chapter(s).
pub mod archive;
pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod error;
pub mod logging;
pub mod process;

use std::path::PathBuf;

use color_eyre::eyre::{Result, WrapErr};
use log::{info, warn};

pub use archive::{refresh, ArchiveResource, Refresh};
pub use cache::{HttpTimestampFetcher, RemoteChangeCache, TimestampFetcher};
pub use catalog::{BuildVariant, Chapter, SelectionToken, VariantCatalog};
pub use compiler::UiCompiler;
pub use config::{BuildOptions, Target};
pub use error::{
    BuildError, CatalogError, NetworkError, ProcessError, StorageError, UnknownChapterError,
};
pub use logging::init as init_logging;
pub use process::{CommandRunner, Invocation, SystemCommandRunner};

use process::absolute;

/// Outcome of [`build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSummary {
    /// The CI tag selected nothing; no work was done.
    Skipped {
        /// The tag that was inspected.
        git_ref: String,
    },
    /// Every listed variant was built, in order.
    Built {
        /// Variants built.
        variants: Vec<BuildVariant>,
    },
}

/// Works out which variants `target` asks for.
///
/// `Ok(None)` means a CI tag named no chapter; the run should end quietly.
///
/// # Errors
/// Returns [`BuildError`] when the catalog is invalid, the chapter is
/// unknown, or CI selection is requested without a git ref.
pub fn select_variants(
    options: &BuildOptions,
    target: &Target,
) -> Result<Option<Vec<BuildVariant>>, BuildError> {
    let catalog = options.catalog()?;
    let token = match target {
        Target::Selection(token) => token.clone(),
        Target::FromCiTag => {
            let git_ref = options.git_ref.as_deref().ok_or(BuildError::MissingGitRef)?;
            info!("--- Git Ref: {git_ref} ---");
            match catalog.resolve_from_tag(git_ref) {
                Some(token) => token,
                None => return Ok(None),
            }
        }
    };
    let variants = catalog.resolve(&token)?;
    info!(
        "For chapter '{token}' building: [{}]",
        variants
            .iter()
            .map(BuildVariant::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(Some(variants))
}

/// Runs the whole build.
///
/// Archives are refreshed in configured order, then each variant is passed to
/// the UI compiler. The first failure aborts the run.
///
/// # Errors
/// Returns an error describing the step that failed.
pub fn build(
    options: &BuildOptions,
    target: &Target,
    runner: &dyn CommandRunner,
    fetcher: Box<dyn TimestampFetcher>,
) -> Result<BuildSummary> {
    let Some(variants) = select_variants(options, target)? else {
        let git_ref = options.git_ref.clone().unwrap_or_default();
        warn!("No chapter name (or 'all') was found in git ref {git_ref} - skipping building .assets");
        return Ok(BuildSummary::Skipped { git_ref });
    };

    let work_dir = &options.work_dir;
    let mut cache = RemoteChangeCache::load(options.cache_path(), fetcher)
        .wrap_err("failed to load change cache")?;

    let mut tool_dirs: Vec<PathBuf> = Vec::new();
    for resource in &options.archives {
        refresh(
            resource,
            &mut cache,
            options.force_download,
            runner,
            work_dir,
        )
        .wrap_err_with(|| format!("failed to prepare {}", resource.name))?;
        if resource.add_to_path {
            tool_dirs.push(absolute(work_dir.join(&resource.folder)));
        }
    }

    let compiler = UiCompiler::detect(runner, &options.ui_compiler_url, work_dir)
        .wrap_err("failed to obtain the UI compiler")?;
    for variant in &variants {
        compiler
            .build(variant, runner, work_dir, &tool_dirs)
            .wrap_err_with(|| format!("failed to build {variant}"))?;
    }

    Ok(BuildSummary::Built { variants })
}
