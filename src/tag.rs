//! Release tag names
//!
//! A tag is `[component<separator>][v]<version>`, e.g. `pkg1-v1.2.3` or `v1.2.3`.

use crate::version::Version;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<component>.*)(?P<separator>[^a-zA-Z0-9]))?(?P<v>v)?(?P<version>\d+\.\d+\.\d+.*)$",
    )
    .expect("valid tag regex")
});

/// Default separator between component and version
pub const DEFAULT_TAG_SEPARATOR: &str = "-";

/// A structured release tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagName {
    /// Component prefix, if included
    pub component: Option<String>,
    /// Separator between component and version
    pub separator: String,
    /// Whether the version carries a leading `v`
    pub include_v: bool,
    /// The version
    pub version: Version,
}

impl TagName {
    /// Build a tag for a component
    pub fn new(
        version: Version,
        component: Option<&str>,
        separator: &str,
        include_v: bool,
    ) -> Self {
        Self {
            component: component.filter(|c| !c.is_empty()).map(str::to_string),
            separator: separator.to_string(),
            include_v,
            version,
        }
    }

    /// Parse a tag; returns `None` for tags that carry no semantic version
    pub fn parse(tag: &str) -> Option<Self> {
        let caps = TAG_RE.captures(tag)?;
        let version = caps["version"].parse().ok()?;
        let component = caps
            .name("component")
            .map(|m| m.as_str().to_string())
            .filter(|c| !c.is_empty());
        let separator = caps
            .name("separator")
            .filter(|_| component.is_some())
            .map_or_else(
                || DEFAULT_TAG_SEPARATOR.to_string(),
                |m| m.as_str().to_string(),
            );
        Some(Self {
            component,
            separator,
            include_v: caps.name("v").is_some(),
            version,
        })
    }

    /// Whether this tag was produced by the given tag format
    pub fn matches_format(&self, component: Option<&str>, separator: &str, include_v: bool) -> bool {
        let expected = component.filter(|c| !c.is_empty());
        let separator_ok = expected.is_none() || self.separator == separator;
        self.component.as_deref() == expected && separator_ok && self.include_v == include_v
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(component) = &self.component {
            write!(f, "{component}{}", self.separator)?;
        }
        if self.include_v {
            write!(f, "v")?;
        }
        write!(f, "{}", self.version)
    }
}
