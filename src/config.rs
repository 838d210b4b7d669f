//! Layered build configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `UI_ASSETS_BUILD_*` environment variables. `GITHUB_REF` is read as-is so
//! CI tags can select chapters.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveResource;
use crate::cache::DEFAULT_CACHE_FILE;
use crate::catalog::{builtin_chapters, Chapter, SelectionToken, VariantCatalog};
use crate::compiler::PREBUILT_COMPILER_URL;
use crate::error::CatalogError;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ui-assets-build.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "UI_ASSETS_BUILD_";

/// Positional argument selecting chapters from the CI tag.
pub const CI_TARGET: &str = "github_actions";

/// What the invocation asked to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Derive the selection from `GITHUB_REF`.
    FromCiTag,
    /// Build an explicit selection.
    Selection(SelectionToken),
}

impl FromStr for Target {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CI_TARGET {
            return Ok(Self::FromCiTag);
        }
        s.parse().map(Self::Selection)
    }
}

/// Settings for one build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Directory archives are extracted into and commands run from.
    pub work_dir: PathBuf,
    /// Change cache location, relative to `work_dir` unless absolute.
    pub cache_file: PathBuf,
    /// Timeout for each `Last-Modified` request.
    pub http_timeout_secs: u64,
    /// Re-download archives even when unchanged.
    pub force_download: bool,
    /// Release binary used when `cargo` is unavailable.
    pub ui_compiler_url: String,
    /// Archives refreshed before building, in order.
    pub archives: Vec<ArchiveResource>,
    /// Chapters and their variants, in build order.
    pub chapters: Vec<Chapter>,
    /// Git ref of the CI trigger, e.g. `refs/tags/v1.0-onikakushi`.
    pub git_ref: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            http_timeout_secs: 30,
            force_download: false,
            ui_compiler_url: PREBUILT_COMPILER_URL.to_owned(),
            archives: ArchiveResource::defaults(),
            chapters: builtin_chapters(),
            git_ref: None,
        }
    }
}

impl BuildOptions {
    /// Loads options using [`DEFAULT_CONFIG_FILE`].
    ///
    /// # Errors
    /// Returns [`figment::Error`] if a source holds values of the wrong type.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Loads options, reading `config_file` if it exists.
    ///
    /// # Errors
    /// Returns [`figment::Error`] if a source holds values of the wrong type.
    pub fn load_from(config_file: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(config_file.as_ref()).extract()
    }

    /// The provider stack behind [`BuildOptions::load_from`].
    #[must_use]
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Env::raw().only(&["GITHUB_REF"]).map(|_| "git_ref".into()))
    }

    /// Validated catalog built from [`BuildOptions::chapters`].
    ///
    /// # Errors
    /// Returns [`CatalogError`] if the configured chapters are invalid.
    pub fn catalog(&self) -> Result<VariantCatalog, CatalogError> {
        VariantCatalog::new(self.chapters.clone())
    }

    /// Resolved location of the change cache.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.work_dir.join(&self.cache_file)
    }

    /// Request timeout for remote checks.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[rstest]
    #[case("github_actions", Target::FromCiTag)]
    #[case("all", Target::Selection(SelectionToken::All))]
    #[case("rei", Target::Selection(SelectionToken::Chapter("rei".to_owned())))]
    fn targets_parse(#[case] arg: &str, #[case] expected: Target) {
        assert_eq!(arg.parse::<Target>(), Ok(expected));
    }

    #[rstest]
    fn defaults_without_sources() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let opts = BuildOptions::load()?;
            assert_eq!(opts, BuildOptions::default());
            assert_eq!(opts.cache_path(), Path::new(".").join("lastModified.json"));
            Ok(())
        });
    }

    #[rstest]
    fn file_then_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    work_dir = "build"
                    http_timeout_secs = 5
                "#,
            )?;
            jail.set_env("UI_ASSETS_BUILD_HTTP_TIMEOUT_SECS", "9");
            jail.set_env("UI_ASSETS_BUILD_FORCE_DOWNLOAD", "true");

            let opts = BuildOptions::load()?;
            assert_eq!(opts.work_dir, PathBuf::from("build"));
            assert_eq!(opts.http_timeout(), Duration::from_secs(9));
            assert!(opts.force_download);
            assert_eq!(opts.cache_path(), Path::new("build").join("lastModified.json"));
            Ok(())
        });
    }

    #[rstest]
    fn github_ref_is_read_verbatim() {
        Jail::expect_with(|jail| {
            jail.set_env("GITHUB_REF", "refs/tags/v1.2.3-onikakushi");
            let opts = BuildOptions::load()?;
            assert_eq!(opts.git_ref.as_deref(), Some("refs/tags/v1.2.3-onikakushi"));
            Ok(())
        });
    }

    #[rstest]
    fn chapters_can_be_replaced_in_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                    [[chapters]]
                    name = "zeta"
                    variants = ["zeta 1.0 win"]

                    [[chapters]]
                    name = "alpha"
                    variants = ["alpha 1.0 win", "alpha 1.0 unix"]
                "#,
            )?;
            let opts = BuildOptions::load_from("custom.toml")?;
            let catalog = opts.catalog().map_err(|e| e.to_string())?;
            let names: Vec<_> = catalog.chapters().iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, ["zeta", "alpha"]);
            Ok(())
        });
    }

    #[rstest]
    fn invalid_configured_catalog_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_FILE,
                r#"
                    [[chapters]]
                    name = "empty"
                    variants = []
                "#,
            )?;
            let opts = BuildOptions::load()?;
            assert_eq!(
                opts.catalog(),
                Err(CatalogError::EmptyChapter("empty".to_owned()))
            );
            Ok(())
        });
    }

    #[rstest]
    fn wrong_type_is_a_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_FILE, "http_timeout_secs = \"soon\"")?;
            assert!(BuildOptions::load().is_err());
            Ok(())
        });
    }
}
