//! Versioning strategies: from commits to the next version

use crate::commit::ConventionalCommit;
use crate::version::{BumpKind, Version};
use serde::{Deserialize, Serialize};

/// How a component's next version is computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersioningStrategy {
    /// Conventional commit rules
    #[default]
    Default,
    /// Every release is a patch
    AlwaysBumpPatch,
    /// Every release is a minor
    AlwaysBumpMinor,
    /// Every release is a major
    AlwaysBumpMajor,
    /// Stay on the current prerelease line while it lasts
    Prerelease,
}

/// Version a component starts from when nothing has been released
pub const INITIAL_VERSION: Version = Version::new(1, 0, 0);

/// Classify the commits into the bump the conventional rules call for
///
/// Returns `None` when no commit is releasable.
pub fn conventional_bump(commits: &[ConventionalCommit]) -> Option<BumpKind> {
    let releasable: Vec<_> = commits.iter().filter(|c| c.is_releasable()).collect();
    if releasable.is_empty() {
        None
    } else if releasable.iter().any(|c| c.breaking) {
        Some(BumpKind::Major)
    } else if releasable
        .iter()
        .any(|c| c.commit_type.as_deref() == Some("feat"))
    {
        Some(BumpKind::Minor)
    } else {
        Some(BumpKind::Patch)
    }
}

impl VersioningStrategy {
    /// Compute the next version, or `None` when nothing qualifies.
    ///
    /// `current` is `None` for a component that has never been released; its
    /// first version is [`INITIAL_VERSION`].
    pub fn next_version(
        self,
        current: Option<&Version>,
        commits: &[ConventionalCommit],
    ) -> Option<Version> {
        let kind = conventional_bump(commits)?;
        let Some(current) = current else {
            return Some(INITIAL_VERSION);
        };

        let next = match self {
            Self::Default => default_bump(current, kind),
            Self::AlwaysBumpPatch => current.bump(BumpKind::Patch),
            Self::AlwaysBumpMinor => current.bump(BumpKind::Minor),
            Self::AlwaysBumpMajor => current.bump(BumpKind::Major),
            Self::Prerelease => prerelease_bump(current, kind),
        };
        Some(next)
    }
}

/// Conventional mapping; below 1.0.0 everything shifts down one level.
fn default_bump(current: &Version, kind: BumpKind) -> Version {
    let kind = if current.is_pre_major() {
        match kind {
            BumpKind::Major => BumpKind::Minor,
            BumpKind::Minor => BumpKind::Patch,
            other => other,
        }
    } else {
        kind
    };
    current.bump(kind)
}

/// Bump within a prerelease line when the line already covers the change.
///
/// `2.0.0-beta.1` + feat stays on `2.0.0-beta.2`; `1.2.1-beta.1` + feat
/// starts `1.3.0-beta.1`. Released versions follow the default mapping.
fn prerelease_bump(current: &Version, kind: BumpKind) -> Version {
    let Some(pre) = current.prerelease() else {
        return default_bump(current, kind);
    };

    let covered = match kind {
        BumpKind::Major => current.minor() == 0 && current.patch() == 0,
        BumpKind::Minor => current.patch() == 0,
        _ => true,
    };
    if covered {
        return current.bump(BumpKind::Prerelease);
    }

    let line = pre
        .split('.')
        .next()
        .filter(|p| !p.is_empty())
        .unwrap_or("alpha");
    let released = current.bump(kind);
    released
        .with_prerelease(&format!("{line}.1"))
        .unwrap_or(released)
}
