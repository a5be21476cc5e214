//! Compatibility specifications
//!
//! A spec is a comma-separated list of clauses which must all hold:
//! - `*` - any version
//! - `1.2.3`, `=1.2.3`, `==1.2.3` - exact (a partial `1.2` means `1.2.*`)
//! - `!=1.2.3` - anything but
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `~1.2.3` - tilde: >=1.2.3 <1.3.0 (`~1` means >=1.0.0 <2.0.0)
//! - `^1.2.3` - caret: >=1.2.3 <2.0.0 (or special cases for 0.x)
//! - `1.*`, `1.2.*` - wildcards
//!
//! Pre-release versions only match a spec that mentions a pre-release itself.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::ParseError;
use crate::version::semver::{SemanticVersion, parse_partial};

/// A version as written in a clause, remembering how many components were given
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    precision: usize,
}

impl Bound {
    fn parse(text: &str) -> Option<Self> {
        parse_partial(text).map(|(version, precision)| Self { version, precision })
    }

    fn wildcard(major: u64, minor: Option<u64>) -> Self {
        match minor {
            Some(minor) => Self {
                version: Version::new(major, minor, 0),
                precision: 2,
            },
            None => Self {
                version: Version::new(major, 0, 0),
                precision: 1,
            },
        }
    }

    /// Whether `version` falls inside the range this bound names
    ///
    /// `1` covers 1.x.y, `1.2` covers 1.2.y, `1.2.3` covers only 1.2.3.
    fn covers(&self, version: &Version) -> bool {
        match self.precision {
            1 => version.major == self.version.major,
            2 => version.major == self.version.major && version.minor == self.version.minor,
            _ => version.cmp_precedence(&self.version) == Ordering::Equal,
        }
    }

    fn cmp(&self, version: &Version) -> Ordering {
        version.cmp_precedence(&self.version)
    }
}

/// A single clause of a spec
#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    /// Any version: * matches all versions
    Any,
    /// Exact: =1.2.3, or a range for partial versions (=1.2 means 1.2.*)
    Exact(Bound),
    NotEqual(Bound),
    /// Greater than or equal
    Gte(Bound),
    /// Greater than: >1.2 means >=1.3.0
    Gt(Bound),
    /// Less than or equal: <=1.2 means <1.3.0
    Lte(Bound),
    /// Less than
    Lt(Bound),
    /// Tilde: ~1.2.3 means >=1.2.3 <1.3.0
    Tilde(Bound),
    /// Caret: ^1.2.3 means >=1.2.3 <2.0.0 (special handling for 0.x)
    Caret(Bound),
}

impl Clause {
    /// Parse a single clause (not comma-separated)
    fn parse(clause: &str) -> Option<Self> {
        let clause = clause.trim();

        if let Some(rest) = clause.strip_prefix(">=") {
            Bound::parse(rest).map(Clause::Gte)
        } else if let Some(rest) = clause.strip_prefix('>') {
            Bound::parse(rest).map(Clause::Gt)
        } else if let Some(rest) = clause.strip_prefix("<=") {
            Bound::parse(rest).map(Clause::Lte)
        } else if let Some(rest) = clause.strip_prefix('<') {
            Bound::parse(rest).map(Clause::Lt)
        } else if let Some(rest) = clause.strip_prefix("==") {
            Bound::parse(rest).map(Clause::Exact)
        } else if let Some(rest) = clause.strip_prefix("!=") {
            Bound::parse(rest).map(Clause::NotEqual)
        } else if let Some(rest) = clause.strip_prefix('=') {
            Bound::parse(rest).map(Clause::Exact)
        } else if let Some(rest) = clause.strip_prefix('^') {
            Bound::parse(rest).map(Clause::Caret)
        } else if let Some(rest) = clause.strip_prefix('~') {
            Bound::parse(rest).map(Clause::Tilde)
        } else if clause == "*" {
            Some(Clause::Any)
        } else if let Some(clause) = Self::parse_wildcard(clause) {
            Some(clause)
        } else {
            Bound::parse(clause).map(Clause::Exact)
        }
    }

    /// Parse wildcard patterns like "1.*" or "1.2.*"
    fn parse_wildcard(clause: &str) -> Option<Self> {
        let parts: Vec<&str> = clause.split('.').collect();

        match parts.as_slice() {
            // 1.*
            [major, "*"] => major
                .parse::<u64>()
                .ok()
                .map(|major| Clause::Exact(Bound::wildcard(major, None))),
            // 1.2.*
            [major, minor, "*"] => {
                let major = major.parse::<u64>().ok()?;
                let minor = minor.parse::<u64>().ok()?;
                Some(Clause::Exact(Bound::wildcard(major, Some(minor))))
            }
            _ => None,
        }
    }

    /// Check if a version satisfies this clause
    fn satisfies(&self, version: &Version) -> bool {
        match self {
            Clause::Any => true,
            Clause::Exact(bound) => bound.covers(version),
            Clause::NotEqual(bound) => !bound.covers(version),
            Clause::Gte(bound) => bound.cmp(version) != Ordering::Less,
            Clause::Gt(bound) => bound.cmp(version) == Ordering::Greater && !bound.covers(version),
            Clause::Lte(bound) => bound.cmp(version) != Ordering::Greater || bound.covers(version),
            Clause::Lt(bound) => bound.cmp(version) == Ordering::Less,
            Clause::Tilde(bound) => {
                if bound.cmp(version) == Ordering::Less {
                    return false;
                }
                // ~1 -> >=1.0.0 <2.0.0
                // ~1.2 / ~1.2.3 -> >=1.2.x <1.3.0
                version.major == bound.version.major
                    && (bound.precision == 1 || version.minor == bound.version.minor)
            }
            Clause::Caret(bound) => {
                if bound.cmp(version) == Ordering::Less {
                    return false;
                }
                // ^1.2.3 -> >=1.2.3 <2.0.0
                // ^0.2.3 -> >=0.2.3 <0.3.0
                // ^0.0.3 -> >=0.0.3 <0.0.4
                // ^0 / ^0.0 -> <1.0.0 / <0.1.0
                let base = &bound.version;
                if base.major > 0 || bound.precision == 1 {
                    version.major == base.major
                } else if base.minor > 0 || bound.precision == 2 {
                    version.major == 0 && version.minor == base.minor
                } else {
                    version.major == 0 && version.minor == 0 && version.patch == base.patch
                }
            }
        }
    }

    fn mentions_prerelease(&self) -> bool {
        match self {
            Clause::Any => false,
            Clause::Exact(bound)
            | Clause::NotEqual(bound)
            | Clause::Gte(bound)
            | Clause::Gt(bound)
            | Clause::Lte(bound)
            | Clause::Lt(bound)
            | Clause::Tilde(bound)
            | Clause::Caret(bound) => !bound.version.pre.is_empty(),
        }
    }
}

/// A parsed compatibility constraint such as `>=1.2.0,<2.0.0` or `~1.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilitySpec {
    expression: String,
    /// All clauses must be satisfied (AND)
    clauses: Vec<Clause>,
    allows_prerelease: bool,
}

impl CompatibilitySpec {
    /// Parse a compatibility specification (may be comma-separated)
    pub fn parse(expression: &str) -> Result<Self, ParseError> {
        let invalid = |reason: String| ParseError::Spec {
            input: expression.to_string(),
            reason,
        };

        if expression.trim().is_empty() {
            return Err(invalid("empty specification".to_string()));
        }

        let clauses = expression
            .split(',')
            .map(|clause| {
                Clause::parse(clause)
                    .ok_or_else(|| invalid(format!("unrecognized clause '{}'", clause.trim())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let allows_prerelease = clauses.iter().any(Clause::mentions_prerelease);

        Ok(Self {
            expression: expression.trim().to_string(),
            clauses,
            allows_prerelease,
        })
    }

    /// Check if a version satisfies all clauses
    pub fn matches(&self, version: &SemanticVersion) -> bool {
        if version.is_prerelease() && !self.allows_prerelease {
            return false;
        }
        self.clauses
            .iter()
            .all(|clause| clause.satisfies(version.version()))
    }

    /// Keep only the versions satisfying this spec, preserving their order
    pub fn filter<I>(&self, versions: I) -> Vec<SemanticVersion>
    where
        I: IntoIterator<Item = SemanticVersion>,
    {
        versions.into_iter().filter(|v| self.matches(v)).collect()
    }
}

impl fmt::Display for CompatibilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for CompatibilitySpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
