//! Release pull request head branch names
//!
//! Encoding:
//!
//! ```text
//! release-please--branches--<target>[--changes--<changes>][--components--<component>]
//! ```
//!
//! Segments may not contain `--` and may not start or end with `-`, so every
//! `--` in an encoded name is a separator and decoding is exact.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "release-please--branches--";
const CHANGES_MARKER: &str = "changes";
const COMPONENTS_MARKER: &str = "components";
const SEPARATOR: &str = "--";

/// Structured head branch name of a release pull request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName {
    target_branch: String,
    changes_branch: Option<String>,
    component: Option<String>,
}

fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment.contains(SEPARATOR)
        || segment.starts_with('-')
        || segment.ends_with('-')
    {
        return Err(Error::InvalidBranchName(format!(
            "segment '{segment}' cannot be encoded"
        )));
    }
    Ok(())
}

impl BranchName {
    /// Build a branch name, validating every segment.
    ///
    /// A changes branch equal to the target branch is dropped.
    pub fn new(
        target_branch: &str,
        changes_branch: Option<&str>,
        component: Option<&str>,
    ) -> Result<Self> {
        check_segment(target_branch)?;
        let changes_branch = changes_branch.filter(|c| *c != target_branch);
        if let Some(changes) = changes_branch {
            check_segment(changes)?;
        }
        if let Some(component) = component {
            check_segment(component)?;
        }
        Ok(Self {
            target_branch: target_branch.to_string(),
            changes_branch: changes_branch.map(str::to_string),
            component: component.map(str::to_string),
        })
    }

    /// Branch the release pull request targets
    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    /// Branch the updates are authored against, when different from target
    pub fn changes_branch(&self) -> Option<&str> {
        self.changes_branch.as_deref()
    }

    /// Component this branch releases, for per-component pull requests
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.target_branch)?;
        if let Some(changes) = &self.changes_branch {
            write!(f, "{SEPARATOR}{CHANGES_MARKER}{SEPARATOR}{changes}")?;
        }
        if let Some(component) = &self.component {
            write!(f, "{SEPARATOR}{COMPONENTS_MARKER}{SEPARATOR}{component}")?;
        }
        Ok(())
    }
}

impl FromStr for BranchName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidBranchName(s.to_string());
        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let tokens: Vec<&str> = rest.split(SEPARATOR).collect();

        let (target, changes, component) = match tokens.as_slice() {
            [target] => (*target, None, None),
            [target, CHANGES_MARKER, changes] => (*target, Some(*changes), None),
            [target, COMPONENTS_MARKER, component] => (*target, None, Some(*component)),
            [target, CHANGES_MARKER, changes, COMPONENTS_MARKER, component] => {
                (*target, Some(*changes), Some(*component))
            }
            _ => return Err(invalid()),
        };

        let name = Self::new(target, changes, component).map_err(|_| invalid())?;
        // A changes segment equal to the target would not survive re-encoding
        if name.changes_branch.as_deref() != changes {
            return Err(invalid());
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_default_branch() {
        let name = BranchName::new("main", None, None).unwrap();
        assert_eq!(name.to_string(), "release-please--branches--main");
    }

    #[test]
    fn test_encode_with_component() {
        let name = BranchName::new("main", None, Some("pkg1")).unwrap();
        assert_eq!(
            name.to_string(),
            "release-please--branches--main--components--pkg1"
        );
    }

    #[test]
    fn test_encode_with_changes_branch() {
        let name = BranchName::new("main", Some("next"), Some("pkg1")).unwrap();
        assert_eq!(
            name.to_string(),
            "release-please--branches--main--changes--next--components--pkg1"
        );
    }

    #[test]
    fn test_changes_branch_equal_to_target_is_dropped() {
        let name = BranchName::new("main", Some("main"), None).unwrap();
        assert_eq!(name.changes_branch(), None);
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ("main", None, None),
            ("release/1.x", None, Some("@scope/pkg")),
            ("main", Some("staging"), None),
            ("changes", Some("components"), Some("changes")),
            ("a-b", Some("c-d"), Some("e-f")),
        ];
        for (target, changes, component) in cases {
            let name = BranchName::new(target, changes, component).unwrap();
            let decoded: BranchName = name.to_string().parse().unwrap();
            assert_eq!(decoded, name, "round trip failed for {name}");
        }
    }

    #[test]
    fn test_unencodable_segments_rejected() {
        assert!(BranchName::new("", None, None).is_err());
        assert!(BranchName::new("main", None, Some("a--b")).is_err());
        assert!(BranchName::new("main", Some("-next"), None).is_err());
        assert!(BranchName::new("main-", None, None).is_err());
    }

    #[test]
    fn test_decode_rejects_non_conforming() {
        for s in [
            "main",
            "release-please--branches--",
            "release-please--branches--main--components--",
            "release-please--branches--main--other--x",
            "release-please--branches--main--components--a--changes--b",
            "release-please--branches--main---components--a",
            "release-please--branches--main--changes--main",
        ] {
            assert!(s.parse::<BranchName>().is_err(), "decoded {s}");
        }
    }
}
