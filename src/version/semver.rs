use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::ParseError;

/// A release version ordered by semantic-versioning precedence.
///
/// Keeps the raw tag it was parsed from so the release can be queried again
/// by that exact tag. The tag and any build metadata take no part in
/// ordering or equality.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    version: Version,
    origin_tag: String,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self::from_version(Version::new(major, minor, patch))
    }

    /// Wraps a parsed version, using its canonical text as the origin tag
    pub fn from_version(version: Version) -> Self {
        let origin_tag = version.to_string();
        Self {
            version,
            origin_tag,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Raw release tag this version was parsed from (e.g. "v1.2.0")
    pub fn origin_tag(&self) -> &str {
        &self.origin_tag
    }

    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp_precedence(&other.version)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.version.fmt(f)
    }
}

impl FromStr for SemanticVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

/// Strip surrounding whitespace and a single leading `v`.
///
/// Examples:
/// - "v1.2.3" -> "1.2.3"
/// - " v1.2.3 " -> "1.2.3"
/// - "1.2.3" -> "1.2.3"
pub fn normalize_tag(tag: &str) -> &str {
    let trimmed = tag.trim();
    trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed).trim()
}

/// Parse a release tag into a [`SemanticVersion`].
///
/// The tag is normalized with [`normalize_tag`] first; the remainder must be
/// a complete `MAJOR.MINOR.PATCH[-PRE][+BUILD]` version.
pub fn parse_version(tag: &str) -> Result<SemanticVersion, ParseError> {
    let version = Version::parse(normalize_tag(tag)).map_err(|e| ParseError::Version {
        input: tag.to_string(),
        reason: e.to_string(),
    })?;

    Ok(SemanticVersion {
        version,
        origin_tag: tag.to_string(),
    })
}

/// Parse a possibly partial version, padding missing components with zeros.
///
/// Returns the padded version together with the number of components that
/// were actually given, which clause semantics depend on (`~1` vs `~1.2`).
///
/// Examples:
/// - "1" -> (1.0.0, 1)
/// - "1.2" -> (1.2.0, 2)
/// - "1.2.3-rc.1" -> (1.2.3-rc.1, 3)
pub(crate) fn parse_partial(version: &str) -> Option<(Version, usize)> {
    let version = version.trim();
    let core_end = version.find(['-', '+']).unwrap_or(version.len());
    let parts: Vec<&str> = version[..core_end].split('.').collect();

    let normalized = match parts.len() {
        1 | 2 if core_end != version.len() => return None,
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        3 => version.to_string(),
        _ => return None,
    };

    Version::parse(&normalized)
        .ok()
        .map(|parsed| (parsed, parts.len()))
}
