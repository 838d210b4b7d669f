//! Chapter catalog and build-variant selection.
//!
//! A [`VariantCatalog`] maps chapter names to ordered lists of
//! [`BuildVariant`]s. Selection happens either from an explicit
//! [`SelectionToken`] or from a free-form CI tag such as
//! `refs/tags/v1.2.3-onikakushi`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uncased::UncasedStr;

use crate::error::{CatalogError, UnknownChapterError};

/// Token selecting every chapter.
pub const ALL: &str = "all";

/// One buildable configuration, e.g. `onikakushi 5.2.2f1 win`.
///
/// The catalog never looks inside the token; only the compiler invocation
/// splits it into arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildVariant(String);

impl BuildVariant {
    /// Wraps a variant token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrows the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whitespace-separated arguments passed to the UI compiler.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.0.split_whitespace()
    }
}

impl fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildVariant {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// A named, ordered group of build variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter name as used on the command line.
    pub name: String,
    /// Variants built for this chapter, in build order.
    pub variants: Vec<BuildVariant>,
}

impl Chapter {
    /// Creates a chapter from a name and its variant tokens.
    pub fn new<I, V>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<BuildVariant>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }
}

/// The resolved intent of a build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    /// Every chapter, in catalog order.
    All,
    /// A single chapter by name.
    Chapter(String),
}

impl FromStr for SelectionToken {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s == ALL {
            Self::All
        } else {
            Self::Chapter(s.to_owned())
        })
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Chapter(name) => f.write_str(name),
        }
    }
}

/// Immutable mapping from chapter name to its build variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCatalog {
    chapters: Vec<Chapter>,
}

impl VariantCatalog {
    /// Builds a catalog, preserving the declared chapter order.
    ///
    /// # Errors
    /// Returns [`CatalogError`] when a chapter is empty, declared twice, or
    /// named `all`.
    pub fn new(chapters: Vec<Chapter>) -> Result<Self, CatalogError> {
        for (idx, chapter) in chapters.iter().enumerate() {
            if UncasedStr::new(&chapter.name) == UncasedStr::new(ALL) {
                return Err(CatalogError::ReservedName(chapter.name.clone()));
            }
            if chapter.variants.is_empty() {
                return Err(CatalogError::EmptyChapter(chapter.name.clone()));
            }
            if chapters.iter().take(idx).any(|c| c.name == chapter.name) {
                return Err(CatalogError::DuplicateChapter(chapter.name.clone()));
            }
        }
        Ok(Self { chapters })
    }

    /// The catalog shipped with the tool.
    ///
    /// Each variant needs a vanilla `sharedassets0.assets` under
    /// `assets/vanilla/{chapter}[-{crc32}]/{os}-{unity version}/`.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            chapters: builtin_chapters(),
        }
    }

    /// Chapters in declaration order.
    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Looks up a chapter by its exact name.
    #[must_use]
    pub fn chapter(&self, name: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.name == name)
    }

    /// Expands a selection token into the variants to build.
    ///
    /// # Errors
    /// Returns [`UnknownChapterError`] when the token names no chapter.
    pub fn resolve(&self, token: &SelectionToken) -> Result<Vec<BuildVariant>, UnknownChapterError> {
        match token {
            SelectionToken::All => Ok(self
                .chapters
                .iter()
                .flat_map(|c| c.variants.iter().cloned())
                .collect()),
            SelectionToken::Chapter(name) => self
                .chapter(name)
                .map(|c| c.variants.clone())
                .ok_or_else(|| UnknownChapterError {
                    chapter: name.clone(),
                }),
        }
    }

    /// Same as [`VariantCatalog::resolve`] for a raw string token.
    ///
    /// # Errors
    /// Returns [`UnknownChapterError`] when the token is neither `all` nor a
    /// chapter name.
    pub fn resolve_str(&self, token: &str) -> Result<Vec<BuildVariant>, UnknownChapterError> {
        match token.parse::<SelectionToken>() {
            Ok(parsed) => self.resolve(&parsed),
            Err(never) => match never {},
        }
    }

    /// Recovers a selection from a CI tag.
    ///
    /// An `all` fragment wins over any chapter name. Otherwise the first
    /// chapter, in catalog order, whose lowercased name equals a fragment is
    /// chosen.
    /// `None` means the tag selects nothing; the caller decides whether that
    /// is fatal.
    #[must_use]
    pub fn resolve_from_tag(&self, tag: &str) -> Option<SelectionToken> {
        let fragments = tag_fragments(tag);
        let has = |name: &str| fragments.iter().any(|f| *f == name.to_lowercase());

        if has(ALL) {
            return Some(SelectionToken::All);
        }
        self.chapters
            .iter()
            .find(|c| has(&c.name))
            .map(|c| SelectionToken::Chapter(c.name.clone()))
    }
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Splits a tag into lowercase fragments.
///
/// Every character that is not alphanumeric separates fragments, so dots,
/// dashes, slashes and underscores all split. Empty fragments are dropped.
#[must_use]
pub fn tag_fragments(tag: &str) -> Vec<String> {
    tag.split(|c: char| !c.is_alphanumeric())
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Chapters known to the tool, in build order.
#[must_use]
pub fn builtin_chapters() -> Vec<Chapter> {
    vec![
        Chapter::new(
            "onikakushi",
            ["onikakushi 5.2.2f1 win", "onikakushi 5.2.2f1 unix"],
        ),
        Chapter::new(
            "watanagashi",
            ["watanagashi 5.2.2f1 win", "watanagashi 5.2.2f1 unix"],
        ),
        Chapter::new(
            "tatarigoroshi",
            [
                "tatarigoroshi 5.4.0f1 win",
                "tatarigoroshi 5.4.0f1 unix",
                "tatarigoroshi 5.3.5f1 win",
                "tatarigoroshi 5.3.4p1 win",
                "tatarigoroshi 5.3.4p1 unix",
            ],
        ),
        Chapter::new(
            "himatsubushi",
            ["himatsubushi 5.4.1f1 win", "himatsubushi 5.4.1f1 unix"],
        ),
        Chapter::new(
            "meakashi",
            [
                "meakashi 5.5.3p3 win",
                "meakashi 5.5.3p3 unix",
                "meakashi 5.5.3p1 win",
                "meakashi 5.5.3p1 unix",
            ],
        ),
        // GOG Windows ships 5.6.7f1, but the installer downgrades to 5.5.3p3.
        Chapter::new(
            "tsumihoroboshi",
            ["tsumihoroboshi 5.5.3p3 win", "tsumihoroboshi 5.5.3p3 unix"],
        ),
        Chapter::new(
            "minagoroshi",
            ["minagoroshi 5.6.7f1 win", "minagoroshi 5.6.7f1 unix"],
        ),
        Chapter::new(
            "matsuribayashi",
            [
                "matsuribayashi 2017.2.5 unix",
                // GOG/MangaGamer Linux build, CRC32 51100D6D.
                "matsuribayashi 2017.2.5 unix 51100D6D",
                "matsuribayashi 2017.2.5 win",
            ],
        ),
        Chapter::new("rei", ["rei 2019.4.3 win", "rei 2019.4.3 unix"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn catalog() -> VariantCatalog {
        VariantCatalog::builtin()
    }

    #[fixture]
    fn small() -> VariantCatalog {
        VariantCatalog::new(vec![
            Chapter::new("alpha", ["alpha 1 win", "alpha 1 unix"]),
            Chapter::new("beta", ["beta 2 win"]),
        ])
        .expect("valid catalog")
    }

    #[rstest]
    fn every_chapter_resolves_to_its_declared_list(catalog: VariantCatalog) {
        for chapter in catalog.chapters() {
            let variants = catalog
                .resolve(&SelectionToken::Chapter(chapter.name.clone()))
                .expect("declared chapter resolves");
            assert!(!variants.is_empty());
            assert_eq!(variants, chapter.variants);
        }
    }

    #[rstest]
    fn all_concatenates_chapters_in_order(small: VariantCatalog) {
        let variants = small.resolve(&SelectionToken::All).expect("all resolves");
        let tokens: Vec<_> = variants.iter().map(BuildVariant::as_str).collect();
        assert_eq!(tokens, ["alpha 1 win", "alpha 1 unix", "beta 2 win"]);
    }

    #[rstest]
    fn all_length_is_sum_of_chapters(catalog: VariantCatalog) {
        let total: usize = catalog.chapters().iter().map(|c| c.variants.len()).sum();
        let all = catalog.resolve_str("all").expect("all resolves");
        assert_eq!(all.len(), total);
    }

    #[rstest]
    #[case("higurashi")]
    #[case("ALL")]
    #[case("Onikakushi")]
    #[case("")]
    fn unknown_tokens_fail(catalog: VariantCatalog, #[case] token: &str) {
        let err = catalog.resolve_str(token).expect_err("token must not resolve");
        assert_eq!(err.chapter, token);
    }

    #[rstest]
    #[case("v1.2.3-onikakushi", Some(SelectionToken::Chapter("onikakushi".to_owned())))]
    #[case("refs/tags/v4.0.0_MEAKASHI", Some(SelectionToken::Chapter("meakashi".to_owned())))]
    #[case("release-all-chapters", Some(SelectionToken::All))]
    #[case("rei-and-All", Some(SelectionToken::All))]
    #[case("nonsense-tag", None)]
    #[case("", None)]
    #[case("...---", None)]
    #[case("onikakushi2", None)]
    fn tag_resolution(
        catalog: VariantCatalog,
        #[case] tag: &str,
        #[case] expected: Option<SelectionToken>,
    ) {
        assert_eq!(catalog.resolve_from_tag(tag), expected);
    }

    #[rstest]
    fn tag_picks_first_chapter_in_catalog_order(catalog: VariantCatalog) {
        let token = catalog.resolve_from_tag("rei-watanagashi");
        assert_eq!(token, Some(SelectionToken::Chapter("watanagashi".to_owned())));
    }

    #[rstest]
    #[case("v2.0-ÉCLAIR")]
    #[case("v2.0-éclair")]
    fn tag_matches_non_ascii_chapter_names(#[case] tag: &str) {
        let catalog = VariantCatalog::new(vec![
            Chapter::new("rei", ["rei 2019.4.3 win"]),
            Chapter::new("Éclair", ["Éclair 1.0 win"]),
        ])
        .expect("valid catalog");
        assert_eq!(
            catalog.resolve_from_tag(tag),
            Some(SelectionToken::Chapter("Éclair".to_owned()))
        );
    }

    #[rstest]
    fn fragments_split_on_non_alphanumerics() {
        assert_eq!(
            tag_fragments("refs/tags/V1.2.3-Oni_kakushi"),
            ["refs", "tags", "v1", "2", "3", "oni", "kakushi"]
        );
    }

    #[rstest]
    fn builtin_keeps_checksum_variant() {
        let catalog = VariantCatalog::builtin();
        let chapter = catalog.chapter("matsuribayashi").expect("chapter exists");
        assert_eq!(
            chapter.variants.get(1).map(BuildVariant::as_str),
            Some("matsuribayashi 2017.2.5 unix 51100D6D")
        );
    }

    #[rstest]
    fn builtin_passes_validation() {
        assert!(VariantCatalog::new(builtin_chapters()).is_ok());
    }

    #[rstest]
    #[case(
        vec![Chapter::new("alpha", Vec::<&str>::new())],
        CatalogError::EmptyChapter("alpha".to_owned())
    )]
    #[case(
        vec![Chapter::new("alpha", ["a"]), Chapter::new("alpha", ["b"])],
        CatalogError::DuplicateChapter("alpha".to_owned())
    )]
    #[case(
        vec![Chapter::new("All", ["a"])],
        CatalogError::ReservedName("All".to_owned())
    )]
    fn invalid_catalogs_are_rejected(#[case] chapters: Vec<Chapter>, #[case] expected: CatalogError) {
        assert_eq!(VariantCatalog::new(chapters), Err(expected));
    }

    #[rstest]
    fn variant_args_split_on_whitespace() {
        let variant = BuildVariant::from("matsuribayashi 2017.2.5 unix 51100D6D");
        let args: Vec<_> = variant.args().collect();
        assert_eq!(args, ["matsuribayashi", "2017.2.5", "unix", "51100D6D"]);
    }
}
