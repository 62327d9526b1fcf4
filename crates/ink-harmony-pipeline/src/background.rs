//! Background catalog and resolver.
//!
//! The option list shown to the user is built from three parts, in
//! order:
//!
//! 1. The original-passthrough entry (always first, always present).
//! 2. A fixed base palette of solid paper colors.
//! 3. Image textures discovered by probing a fixed registry of file
//!    names in each directory category whose aspect classes include the
//!    current image's class.
//!
//! There is no directory listing: each category carries a hardcoded list
//! of candidate file names, and a candidate exists if loading it
//! succeeds. Probing may happen concurrently (see `ink-harmony-io`); this
//! module only enumerates candidates and reassembles probe outcomes in
//! candidate order, so the resulting list is deterministic regardless of
//! which probe finished first.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::AspectClass;

/// Opaque RGB color, serialized as a CSS hex string (`"#faf8f3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 3]);

impl Color {
    /// Pure white, also the fallback for unavailable image backgrounds.
    pub const WHITE: Self = Self([255, 255, 255]);

    /// Opaque RGBA pixel of this color.
    #[must_use]
    pub const fn to_rgba(self) -> image::Rgba<u8> {
        let [r, g, b] = self.0;
        image::Rgba([r, g, b, 255])
    }
}

/// Error parsing a [`Color`] from a hex string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color: {0:?}")]
pub struct ColorParseError(String);

impl FromStr for Color {
    type Err = ColorParseError;

    /// Parse `#rgb` or `#rrggbb`, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ColorParseError(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (slot, ch) in rgb.iter_mut().zip(hex.chars()) {
                    let n = ch.to_digit(16).ok_or_else(err)?;
                    // #rgb expands each nibble: 0xf -> 0xff.
                    *slot = u8::try_from(n * 17).map_err(|_| err())?;
                }
                Ok(Self(rgb))
            }
            6 => {
                let channel = |range: std::ops::Range<usize>| {
                    hex.get(range)
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(err)
                };
                Ok(Self([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
            }
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// What a background option draws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackgroundKind {
    /// Show the uploaded image unmodified instead of compositing.
    Original,
    /// Uniform fill.
    SolidColor {
        /// Fill color.
        color: Color,
    },
    /// Texture image, drawn scaled to the output size.
    Image {
        /// Catalog-relative resource path, e.g. `background/paper/rice.jpg`.
        path: String,
    },
}

/// One entry in the background chooser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundDescriptor {
    /// Human-readable label.
    pub display_name: String,
    /// Stable lower-case identifier, unique within a resolved list.
    pub key: String,
    /// What to draw.
    pub kind: BackgroundKind,
}

impl BackgroundDescriptor {
    /// Key of the passthrough entry.
    pub const ORIGINAL_KEY: &'static str = "original";

    /// The passthrough entry.
    #[must_use]
    pub fn original() -> Self {
        Self {
            display_name: "Original".to_owned(),
            key: Self::ORIGINAL_KEY.to_owned(),
            kind: BackgroundKind::Original,
        }
    }

    /// A solid-color entry.
    #[must_use]
    pub fn solid(display_name: &str, key: &str, color: Color) -> Self {
        Self {
            display_name: display_name.to_owned(),
            key: key.to_ascii_lowercase(),
            kind: BackgroundKind::SolidColor { color },
        }
    }

    /// An image entry whose name and key derive from the file name.
    ///
    /// Returns `None` if the path has no usable file name.
    #[must_use]
    pub fn from_image_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let stem = file_stem(file_name);
        if stem.is_empty() {
            return None;
        }
        Some(Self {
            display_name: display_name_from_stem(stem),
            key: stem.to_lowercase(),
            kind: BackgroundKind::Image {
                path: path.to_owned(),
            },
        })
    }

    /// Whether this is the passthrough entry.
    #[must_use]
    pub const fn is_original(&self) -> bool {
        matches!(self.kind, BackgroundKind::Original)
    }
}

/// File name with its last extension removed.
fn file_stem(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem)
}

/// `rice_paper-2` -> `Rice Paper 2`.
fn display_name_from_stem(stem: &str) -> String {
    stem.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive the display name for an image file, e.g. `aged_scroll.jpg`
/// becomes `Aged Scroll`.
#[must_use]
pub fn display_name_for_file(file_name: &str) -> String {
    display_name_from_stem(file_stem(file_name))
}

/// Derive the stable key for an image file, e.g. `Aged_Scroll.JPG`
/// becomes `aged_scroll`.
#[must_use]
pub fn key_for_file(file_name: &str) -> String {
    file_stem(file_name).to_lowercase()
}

/// A directory of texture images applying to some aspect classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCategory {
    /// Category label for logs (`paper`, `horizontal`, ...).
    pub name: String,
    /// Directory path relative to the catalog root.
    pub path: String,
    /// Aspect classes this directory serves.
    pub applies_to: Vec<AspectClass>,
    /// Well-known file names to probe, in display order.
    pub candidates: Vec<String>,
    /// Maximum number of discovered entries contributed, if limited.
    #[serde(default)]
    pub cap: Option<usize>,
}

impl DirectoryCategory {
    /// Whether this directory serves the given aspect class.
    #[must_use]
    pub fn applies(&self, aspect: AspectClass) -> bool {
        self.applies_to.contains(&aspect)
    }

    /// Resource path of a candidate file within this directory.
    #[must_use]
    pub fn candidate_path(&self, file_name: &str) -> String {
        let dir = self.path.trim_end_matches('/');
        if dir.is_empty() {
            file_name.to_owned()
        } else {
            format!("{dir}/{file_name}")
        }
    }
}

/// A resource path to probe, tagged with the directory it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Index into [`CatalogConfig::directories`].
    pub directory: usize,
    /// Resource path to probe.
    pub path: String,
}

/// Catalog configuration: base palette, directory registry, fallbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Solid-color entries listed after the passthrough entry.
    pub base: Vec<BackgroundDescriptor>,
    /// Directory categories, probed in this order.
    pub directories: Vec<DirectoryCategory>,
    /// Entries appended instead of discovered textures when no candidate
    /// could be loaded.
    pub fallback: Vec<BackgroundDescriptor>,
}

impl CatalogConfig {
    /// Entry cap for the supplementary directory.
    pub const SUPPLEMENTARY_CAP: usize = 5;

    /// Every candidate to probe for `aspect`, in deterministic order:
    /// directory order first, then each directory's candidate order.
    #[must_use]
    pub fn candidates(&self, aspect: AspectClass) -> Vec<Candidate> {
        self.directories
            .iter()
            .enumerate()
            .filter(|(_, dir)| dir.applies(aspect))
            .flat_map(|(directory, dir)| {
                dir.candidates.iter().map(move |file| Candidate {
                    directory,
                    path: dir.candidate_path(file),
                })
            })
            .collect()
    }

    /// Option list containing only the passthrough and base entries.
    #[must_use]
    pub fn base_options(&self) -> BackgroundOptionList {
        let mut builder = OptionListBuilder::new();
        for descriptor in &self.base {
            builder.push(descriptor.clone());
        }
        builder.finish(false)
    }

    /// Build the option list from probe outcomes.
    ///
    /// `found[i]` is the outcome for `candidates[i]`; a missing outcome
    /// counts as not found. Within each directory, entries keep candidate
    /// order. Entries whose key is already taken are skipped, and the
    /// directory cap counts only entries actually added. If no candidate
    /// was found the fallback entries are appended instead.
    #[must_use]
    pub fn assemble(&self, candidates: &[Candidate], found: &[bool]) -> BackgroundOptionList {
        let mut builder = OptionListBuilder::new();
        for descriptor in &self.base {
            builder.push(descriptor.clone());
        }
        let outcomes = || {
            candidates
                .iter()
                .zip(found.iter().copied().chain(std::iter::repeat(false)))
        };

        for (index, dir) in self.directories.iter().enumerate() {
            let cap = dir.cap.unwrap_or(usize::MAX);
            let discovered = outcomes()
                .filter(|(candidate, exists)| candidate.directory == index && *exists)
                .filter_map(|(candidate, _)| BackgroundDescriptor::from_image_path(&candidate.path));
            let mut added = 0;
            for descriptor in discovered {
                if added == cap {
                    break;
                }
                if builder.push(descriptor) {
                    added += 1;
                }
            }
            tracing::debug!(directory = %dir.name, added, "assembled background directory");
        }

        let exhausted = !outcomes().any(|(_, exists)| exists);
        if exhausted {
            tracing::warn!(
                candidates = candidates.len(),
                "no background textures could be loaded, using fallback entries"
            );
            for descriptor in &self.fallback {
                builder.push(descriptor.clone());
            }
        }
        builder.finish(exhausted)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let all = AspectClass::ALL.to_vec();
        let names = |files: &[&str]| files.iter().map(|&f| f.to_owned()).collect::<Vec<_>>();
        Self {
            base: vec![
                BackgroundDescriptor::solid("Pure White", "default", Color::WHITE),
                BackgroundDescriptor::solid("Rice Paper", "rice", Color([0xfa, 0xf8, 0xf3])),
                BackgroundDescriptor::solid("Aged Parchment", "parchment", Color([0xf5, 0xf1, 0xe8])),
                BackgroundDescriptor::solid("Silk Scroll", "silk", Color([0xf7, 0xf3, 0xe9])),
                BackgroundDescriptor::solid("Bamboo Paper", "bamboo", Color([0xf2, 0xf0, 0xe6])),
                BackgroundDescriptor::solid("Tea Stained", "tea", Color([0xf0, 0xed, 0xe4])),
            ],
            directories: vec![
                DirectoryCategory {
                    name: "paper".to_owned(),
                    path: "background/paper".to_owned(),
                    applies_to: all.clone(),
                    candidates: names(&[
                        "xuan_paper.jpg",
                        "mulberry_paper.jpg",
                        "washi.jpg",
                        "kraft_paper.jpg",
                        "linen_paper.jpg",
                    ]),
                    cap: None,
                },
                DirectoryCategory {
                    name: "horizontal".to_owned(),
                    path: "background/horizontal".to_owned(),
                    applies_to: vec![AspectClass::Landscape, AspectClass::Square],
                    candidates: names(&[
                        "landscape_scroll.jpg",
                        "mountain_mist.jpg",
                        "river_bank.jpg",
                        "bamboo_grove.jpg",
                    ]),
                    cap: None,
                },
                DirectoryCategory {
                    name: "vertical".to_owned(),
                    path: "background/vertical".to_owned(),
                    applies_to: vec![AspectClass::Portrait, AspectClass::Square],
                    candidates: names(&[
                        "hanging_scroll.jpg",
                        "plum_blossom.jpg",
                        "pine_cliff.jpg",
                        "waterfall.jpg",
                    ]),
                    cap: None,
                },
                DirectoryCategory {
                    name: "supplementary".to_owned(),
                    path: "background".to_owned(),
                    applies_to: all,
                    candidates: names(&[
                        "background.jpg",
                        "background_h.jpg",
                        "background_v.jpg",
                        "texture_1.jpg",
                        "texture_2.jpg",
                        "texture_3.jpg",
                        "texture_4.jpg",
                        "texture_5.jpg",
                    ]),
                    cap: Some(Self::SUPPLEMENTARY_CAP),
                },
            ],
            fallback: ["background.jpg", "background_h.jpg", "background_v.jpg"]
                .iter()
                .filter_map(|f| BackgroundDescriptor::from_image_path(&format!("background/{f}")))
                .collect(),
        }
    }
}

/// Probe every candidate synchronously and assemble the option list.
///
/// `probe` reports whether the resource at a path can be loaded.
/// Concurrent probing lives in the I/O layer; it produces the same list
/// because reassembly goes through [`CatalogConfig::assemble`].
#[must_use]
pub fn resolve(
    catalog: &CatalogConfig,
    aspect: AspectClass,
    mut probe: impl FnMut(&str) -> bool,
) -> BackgroundOptionList {
    let candidates = catalog.candidates(aspect);
    let found: Vec<bool> = candidates.iter().map(|c| probe(&c.path)).collect();
    catalog.assemble(&candidates, &found)
}

/// Accumulates entries, keeping the passthrough first and keys unique.
struct OptionListBuilder {
    options: Vec<BackgroundDescriptor>,
    keys: HashSet<String>,
}

impl OptionListBuilder {
    fn new() -> Self {
        let original = BackgroundDescriptor::original();
        let keys = HashSet::from([original.key.clone()]);
        Self {
            options: vec![original],
            keys,
        }
    }

    /// Append `descriptor` unless its key is taken. Returns whether it
    /// was added.
    fn push(&mut self, mut descriptor: BackgroundDescriptor) -> bool {
        if descriptor.is_original() {
            return false;
        }
        descriptor.key.make_ascii_lowercase();
        if self.keys.insert(descriptor.key.clone()) {
            self.options.push(descriptor);
            true
        } else {
            tracing::debug!(key = %descriptor.key, "skipping background with duplicate key");
            false
        }
    }

    fn finish(self, discovery_exhausted: bool) -> BackgroundOptionList {
        BackgroundOptionList {
            options: self.options,
            discovery_exhausted,
        }
    }
}

/// Ordered background options for one uploaded image.
///
/// Always starts with the passthrough entry; keys are unique. Rebuilt
/// from scratch for every upload, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundOptionList {
    options: Vec<BackgroundDescriptor>,
    discovery_exhausted: bool,
}

impl BackgroundOptionList {
    /// All entries in display order.
    #[must_use]
    pub fn as_slice(&self) -> &[BackgroundDescriptor] {
        &self.options
    }

    /// Iterate entries in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, BackgroundDescriptor> {
        self.options.iter()
    }

    /// Number of entries (at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Always `false`: the passthrough entry is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// The passthrough entry.
    #[must_use]
    pub fn original(&self) -> &BackgroundDescriptor {
        // The builder seeds every list with the passthrough entry.
        &self.options[0]
    }

    /// Look up an entry by key (case-insensitive).
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&BackgroundDescriptor> {
        self.options
            .iter()
            .find(|d| d.key.eq_ignore_ascii_case(key))
    }

    /// Keys in display order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|d| d.key.as_str())
    }

    /// Whether texture discovery found nothing and the fallback entries
    /// were used.
    #[must_use]
    pub const fn discovery_exhausted(&self) -> bool {
        self.discovery_exhausted
    }
}

impl<'a> IntoIterator for &'a BackgroundOptionList {
    type Item = &'a BackgroundDescriptor;
    type IntoIter = std::slice::Iter<'a, BackgroundDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}
