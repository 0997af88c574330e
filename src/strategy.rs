//! Release types and the file updates they produce
//!
//! Each [`ReleaseType`] knows which files carry its version. The assembler
//! asks for a list of [`Update`]s, reads each file from the branch, applies
//! the [`Updater`] and pushes the result.

use crate::config::ComponentConfig;
use crate::error::{Error, Result};
use crate::version::Version;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use toml_edit::{DocumentMut, value};

/// Marker for generic version replacement in extra files
pub const VERSION_MARKER: &str = "x-release-please-version";

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?").expect("valid regex")
});

/// Supported release types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    /// `version.txt` plus changelog
    Simple,
    /// `Cargo.toml` plus changelog
    Rust,
    /// `package.json` plus changelog
    Node,
}

/// How a file's content is transformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Updater {
    /// Prepend a release entry to a changelog
    Changelog {
        /// Markdown entry for the new release
        entry: String,
    },
    /// Whole-file version
    VersionTxt {
        /// New version
        version: Version,
    },
    /// `[package] version` of a Cargo manifest
    CargoToml {
        /// New version
        version: Version,
    },
    /// Top-level `version` of a `package.json`
    PackageJson {
        /// New version
        version: Version,
    },
    /// Replace versions on lines carrying [`VERSION_MARKER`]
    GenericMarker {
        /// New version
        version: Version,
    },
    /// Merge versions into the manifest baseline JSON
    ManifestBaseline {
        /// Path to version
        versions: BTreeMap<String, Version>,
    },
    /// Replace the whole file
    Raw {
        /// New content
        content: String,
    },
}

/// A file to update in a release pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Repository-relative path
    pub path: String,
    /// Create the file when it does not exist on the branch
    pub create_if_missing: bool,
    /// Content transformation
    pub updater: Updater,
}

impl Updater {
    /// Produce the new content from the current content (`None` if missing)
    pub fn apply(&self, path: &str, existing: Option<&str>) -> Result<String> {
        let existing = existing.unwrap_or_default();
        match self {
            Self::Changelog { entry } => Ok(prepend_changelog(existing, entry)),
            Self::VersionTxt { version } => Ok(format!("{version}\n")),
            Self::CargoToml { version } => {
                let mut doc: DocumentMut = existing
                    .parse()
                    .map_err(|e| Error::Internal(format!("{path}: invalid TOML: {e}")))?;
                let package = doc
                    .get_mut("package")
                    .and_then(|p| p.as_table_like_mut())
                    .ok_or_else(|| Error::Internal(format!("{path}: no [package] table")))?;
                package.insert("version", value(version.to_string()));
                Ok(doc.to_string())
            }
            Self::PackageJson { version } => {
                let mut json: serde_json::Value = serde_json::from_str(existing)?;
                let object = json
                    .as_object_mut()
                    .ok_or_else(|| Error::Internal(format!("{path}: not a JSON object")))?;
                object.insert(
                    "version".to_string(),
                    serde_json::Value::String(version.to_string()),
                );
                Ok(format!("{}\n", serde_json::to_string_pretty(&json)?))
            }
            Self::GenericMarker { version } => {
                let replaced: Vec<String> = existing
                    .split('\n')
                    .map(|line| {
                        if line.contains(VERSION_MARKER) {
                            SEMVER_RE
                                .replace_all(line, version.to_string().as_str())
                                .into_owned()
                        } else {
                            line.to_string()
                        }
                    })
                    .collect();
                Ok(replaced.join("\n"))
            }
            Self::ManifestBaseline { versions } => {
                let mut map: BTreeMap<String, String> = if existing.trim().is_empty() {
                    BTreeMap::new()
                } else {
                    serde_json::from_str(existing)?
                };
                for (component_path, version) in versions {
                    map.insert(component_path.clone(), version.to_string());
                }
                Ok(format!("{}\n", serde_json::to_string_pretty(&map)?))
            }
            Self::Raw { content } => Ok(content.clone()),
        }
    }
}

fn prepend_changelog(existing: &str, entry: &str) -> String {
    const HEADER: &str = "# Changelog";
    let body = existing.trim_start();
    match body.strip_prefix(HEADER) {
        Some(rest) if !rest.trim().is_empty() => {
            format!("{HEADER}\n\n{entry}\n\n{}\n", rest.trim())
        }
        Some(_) => format!("{HEADER}\n\n{entry}\n"),
        None if body.is_empty() => format!("{HEADER}\n\n{entry}\n"),
        None => format!("{HEADER}\n\n{entry}\n\n{}\n", body.trim_end()),
    }
}

impl ReleaseType {
    /// File updates for a new version
    pub fn build_updates(
        self,
        component: &ComponentConfig,
        version: &Version,
        changelog_entry: &str,
    ) -> Vec<Update> {
        let mut updates = Vec::new();
        if !component.skip_changelog {
            updates.push(Update {
                path: component.join(&component.changelog_path),
                create_if_missing: true,
                updater: Updater::Changelog {
                    entry: changelog_entry.to_string(),
                },
            });
        }

        let (file, updater, create_if_missing) = match self {
            Self::Simple => (
                "version.txt",
                Updater::VersionTxt {
                    version: version.clone(),
                },
                true,
            ),
            Self::Rust => (
                "Cargo.toml",
                Updater::CargoToml {
                    version: version.clone(),
                },
                false,
            ),
            Self::Node => (
                "package.json",
                Updater::PackageJson {
                    version: version.clone(),
                },
                false,
            ),
        };
        updates.push(Update {
            path: component.join(file),
            create_if_missing,
            updater,
        });

        updates.extend(component.extra_files.iter().map(|extra| Update {
            path: component.join(extra),
            create_if_missing: false,
            updater: Updater::GenericMarker {
                version: version.clone(),
            },
        }));
        updates
    }

    /// Package name the strategy reports, if configured
    pub fn default_package_name(self, component: &ComponentConfig) -> Option<String> {
        component.package_name.clone()
    }
}
