//! Canonical arXiv identifiers.
//!
//! [`PaperId::parse`] accepts the forms users actually paste:
//!
//! - `2401.12345`, `2401.12345v2`
//! - `arXiv:2401.12345`
//! - `https://arxiv.org/abs/2401.12345v1`, `/pdf/…`, `/html/…`
//! - old-style `hep-th/9901001`, `math.GT/0104020v3`
//!
//! An explicit version is kept (the user pinned it); without one the id
//! refers to the latest version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Base URL for arXiv abstract pages
const ARXIV_ABS_URL: &str = "https://arxiv.org/abs";
/// Base URL for arXiv PDFs
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

static NEW_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})(\d{2})\.(\d{4,5})(?:v(\d+))?$").expect("valid new-style id regex")
});

static OLD_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]+(?:-[a-z]+)*)(?:\.([a-z]{2}))?/(\d{7})(?:v(\d+))?$")
        .expect("valid old-style id regex")
});

/// Errors produced while resolving an identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("Empty arXiv identifier")]
    Empty,

    #[error("Invalid arXiv identifier '{0}': expected forms like 2401.12345, 2401.12345v2 or hep-th/9901001")]
    Invalid(String),
}

/// A validated, canonical arXiv identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaperId {
    canonical: String,
    base_len: usize,
    version: Option<u32>,
}

impl PaperId {
    /// Resolve a raw user-supplied identifier into its canonical form
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }

        let candidate = strip_decorations(trimmed);
        let invalid = || IdError::Invalid(trimmed.to_string());

        if let Some(caps) = NEW_STYLE.captures(candidate) {
            let month: u32 = caps[2].parse().map_err(|_| invalid())?;
            if !(1..=12).contains(&month) {
                return Err(invalid());
            }
            let base = format!("{}{}.{}", &caps[1], &caps[2], &caps[3]);
            let version = parse_version(caps.get(4).map(|m| m.as_str())).ok_or_else(invalid)?;
            return Ok(Self::from_parts(base, version));
        }

        if let Some(caps) = OLD_STYLE.captures(candidate) {
            let archive = caps[1].to_lowercase();
            let base = match caps.get(2) {
                Some(subject) => {
                    format!("{}.{}/{}", archive, subject.as_str().to_uppercase(), &caps[3])
                }
                None => format!("{}/{}", archive, &caps[3]),
            };
            let version = parse_version(caps.get(4).map(|m| m.as_str())).ok_or_else(invalid)?;
            return Ok(Self::from_parts(base, version));
        }

        Err(invalid())
    }

    fn from_parts(base: String, version: Option<u32>) -> Self {
        let base_len = base.len();
        let canonical = match version {
            Some(v) => format!("{}v{}", base, v),
            None => base,
        };
        Self {
            canonical,
            base_len,
            version,
        }
    }

    /// The canonical identifier, including a pinned version if any
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The identifier without its version suffix
    pub fn base(&self) -> &str {
        &self.canonical[..self.base_len]
    }

    /// The same paper without a pinned version
    pub fn latest(&self) -> PaperId {
        Self {
            canonical: self.base().to_string(),
            base_len: self.base_len,
            version: None,
        }
    }

    /// The pinned version, if the user supplied one
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Whether this is a pre-2007 `archive/NNNNNNN` identifier
    pub fn is_old_style(&self) -> bool {
        self.base().contains('/')
    }

    /// URL of the rendered HTML for this paper under `base_url`
    pub fn html_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.canonical)
    }

    /// URL of the abstract page
    pub fn abs_url(&self) -> String {
        format!("{}/{}", ARXIV_ABS_URL, self.canonical)
    }

    /// URL of the PDF
    pub fn pdf_url(&self) -> String {
        format!("{}/{}", ARXIV_PDF_URL, self.canonical)
    }

    /// A filesystem-safe stem for files derived from this id
    pub fn file_stem(&self) -> String {
        self.canonical.replace('/', "_")
    }
}

/// Remove URL, prefix and extension decorations around an identifier
fn strip_decorations(raw: &str) -> &str {
    let mut id = raw;

    let lower = id.to_ascii_lowercase();
    if lower.contains("arxiv.org/") {
        for marker in ["/abs/", "/pdf/", "/html/"] {
            if let Some(pos) = lower.find(marker) {
                id = &id[pos + marker.len()..];
                break;
            }
        }
        id = id.split(['?', '#']).next().unwrap_or(id);
        id = id.trim_end_matches('/');
    }

    if id.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("arxiv:")) {
        id = &id[6..];
    }

    let stem_len = id.len().saturating_sub(4);
    if stem_len > 0 && id.get(stem_len..).is_some_and(|s| s.eq_ignore_ascii_case(".pdf")) {
        id = &id[..stem_len];
    }

    id.trim()
}

/// `None` means the version text was present but unusable (`v0`, overflow)
fn parse_version(raw: Option<&str>) -> Option<Option<u32>> {
    match raw {
        None => Some(None),
        Some(digits) => match digits.parse::<u32>() {
            Ok(0) | Err(_) => None,
            Ok(v) => Some(Some(v)),
        },
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for PaperId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PaperId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PaperId> for String {
    fn from(id: PaperId) -> Self {
        id.canonical
    }
}
