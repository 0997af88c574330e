//! Semantic version model
//!
//! Wraps [`semver::Version`] for precedence rules and adds the bump
//! operations used by versioning strategies.

use crate::error::{Error, Result};
use semver::{BuildMetadata, Prerelease};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Kind of change between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpKind {
    /// Build metadata only
    Build,
    /// Prerelease identifier only
    Prerelease,
    /// Patch number
    Patch,
    /// Minor number
    Minor,
    /// Major number
    Major,
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Prerelease => write!(f, "prerelease"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// A semantic version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// Create a release version with no prerelease or build metadata
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Major number
    pub const fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor number
    pub const fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch number
    pub const fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Prerelease identifier, if any
    pub fn prerelease(&self) -> Option<&str> {
        (!self.0.pre.is_empty()).then(|| self.0.pre.as_str())
    }

    /// Build metadata, if any
    pub fn build(&self) -> Option<&str> {
        (!self.0.build.is_empty()).then(|| self.0.build.as_str())
    }

    /// Whether the version carries a prerelease identifier
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Whether the version is below 1.0.0
    pub const fn is_pre_major(&self) -> bool {
        self.0.major == 0
    }

    /// Return a copy with the given prerelease identifier
    pub fn with_prerelease(&self, pre: &str) -> Result<Self> {
        let mut next = self.0.clone();
        next.pre = Prerelease::new(pre).map_err(|e| Error::InvalidVersion(format!("{pre}: {e}")))?;
        Ok(Self(next))
    }

    /// Compute the next version for a kind of change
    #[must_use]
    pub fn bump(&self, kind: BumpKind) -> Self {
        let v = &self.0;
        match kind {
            BumpKind::Major => Self::new(v.major + 1, 0, 0),
            BumpKind::Minor => Self::new(v.major, v.minor + 1, 0),
            BumpKind::Patch => Self::new(v.major, v.minor, v.patch + 1),
            BumpKind::Prerelease => {
                if v.pre.is_empty() {
                    let mut next = semver::Version::new(v.major, v.minor, v.patch + 1);
                    next.pre = Prerelease::new("alpha.1").unwrap_or(Prerelease::EMPTY);
                    Self(next)
                } else {
                    let mut next = v.clone();
                    next.build = BuildMetadata::EMPTY;
                    next.pre = Prerelease::new(&increment_identifier(v.pre.as_str()))
                        .unwrap_or_else(|_| v.pre.clone());
                    Self(next)
                }
            }
            BumpKind::Build => {
                let mut next = v.clone();
                let build = if v.build.is_empty() {
                    "1".to_string()
                } else {
                    increment_identifier(v.build.as_str())
                };
                next.build = BuildMetadata::new(&build).unwrap_or_else(|_| v.build.clone());
                Self(next)
            }
        }
    }

    /// Classify the change from `previous` to `self`
    ///
    /// Returns `None` when the versions are identical.
    pub fn compare_bump(&self, previous: &Self) -> Option<BumpKind> {
        let (a, b) = (&self.0, &previous.0);
        if a.major != b.major {
            Some(BumpKind::Major)
        } else if a.minor != b.minor {
            Some(BumpKind::Minor)
        } else if a.patch != b.patch {
            Some(BumpKind::Patch)
        } else if a.pre != b.pre {
            Some(BumpKind::Prerelease)
        } else if a.build != b.build {
            Some(BumpKind::Build)
        } else {
            None
        }
    }
}

/// Increment the trailing numeric part of a dotted identifier.
///
/// `beta.1` becomes `beta.2`, `beta` becomes `beta.1`, `rc9` becomes `rc10`.
fn increment_identifier(identifier: &str) -> String {
    let (head, last) = identifier
        .rsplit_once('.')
        .map_or(("", identifier), |(h, l)| (h, l));
    let digits_at = last
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let bumped_last = match digits_at {
        Some(i) => {
            let (prefix, digits) = last.split_at(i);
            let n: u64 = digits.parse().unwrap_or(0);
            format!("{prefix}{}", n + 1)
        }
        None => format!("{last}.1"),
    };

    if head.is_empty() {
        bumped_last
    } else {
        format!("{head}.{bumped_last}")
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        semver::Version::parse(s.trim())
            .map(Self)
            .map_err(|e| Error::InvalidVersion(format!("{s}: {e}")))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_prerelease_orders_before_release() {
        assert!(v("1.0.0-beta.1") < v("1.0.0"));
        assert!(v("1.0.0-beta.1") < v("1.0.0-beta.2"));
        assert!(v("0.9.9") < v("1.0.0-alpha"));
    }

    #[test]
    fn test_bump_major_minor_patch() {
        let base = v("1.2.3-beta.1");
        assert_eq!(base.bump(BumpKind::Major), v("2.0.0"));
        assert_eq!(base.bump(BumpKind::Minor), v("1.3.0"));
        assert_eq!(base.bump(BumpKind::Patch), v("1.2.4"));
    }

    #[test]
    fn test_bump_prerelease() {
        assert_eq!(v("1.0.0-beta.1").bump(BumpKind::Prerelease), v("1.0.0-beta.2"));
        assert_eq!(v("1.0.0-beta").bump(BumpKind::Prerelease), v("1.0.0-beta.1"));
        assert_eq!(v("1.0.0-rc9").bump(BumpKind::Prerelease), v("1.0.0-rc10"));
        assert_eq!(v("1.0.0").bump(BumpKind::Prerelease), v("1.0.1-alpha.1"));
    }

    #[test]
    fn test_bump_build() {
        assert_eq!(v("1.0.0").bump(BumpKind::Build).to_string(), "1.0.0+1");
        assert_eq!(v("1.0.0+build.4").bump(BumpKind::Build).to_string(), "1.0.0+build.5");
    }

    #[test]
    fn test_every_bump_kind_moves_forward_except_build() {
        let base = v("1.4.2-beta.3");
        for kind in [
            BumpKind::Major,
            BumpKind::Minor,
            BumpKind::Patch,
            BumpKind::Prerelease,
        ] {
            assert!(base.bump(kind) > base, "{kind} did not increase {base}");
        }
    }

    #[test]
    fn test_compare_bump() {
        assert_eq!(v("2.0.0").compare_bump(&v("1.9.9")), Some(BumpKind::Major));
        assert_eq!(v("1.3.0").compare_bump(&v("1.2.9")), Some(BumpKind::Minor));
        assert_eq!(v("1.0.1").compare_bump(&v("1.0.0")), Some(BumpKind::Patch));
        assert_eq!(
            v("1.0.0").compare_bump(&v("1.0.0-rc.1")),
            Some(BumpKind::Prerelease)
        );
        assert_eq!(v("1.0.0").compare_bump(&v("1.0.0")), None);
    }

    #[test]
    fn test_invalid_version() {
        assert!(matches!(
            "1.2".parse::<Version>(),
            Err(Error::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.2.3")).unwrap();
        assert_eq!(json, "\"1.2.3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.2.3"));
    }
}
