//! Release pull request bodies
//!
//! A body is a header, one release-notes block per component and a footer.
//! With more than one component each block is wrapped in a collapsible
//! `<details>` section labeled `component: version`. Bodies larger than the
//! platform limit are moved to a companion file on the head branch and the
//! inline body carries a marker pointing at it.

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{FileChange, PullRequest};
use crate::version::Version;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Largest body GitHub accepts
pub const MAX_BODY_SIZE: usize = 65536;

/// Companion file holding an externalized body
pub const NOTES_FILE: &str = "release-notes.md";

/// Default text above the release notes
pub const DEFAULT_HEADER: &str = ":robot: I have created a release *beep* *boop*";

/// Default text below the release notes
pub const DEFAULT_FOOTER: &str =
    "This pull request was generated by relman. Merge it to create the releases listed above.";

const OVERFLOW_MARKER: &str = "<!-- relman:overflow ";
const SEPARATOR: &str = "\n---\n";

static DETAILS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<details><summary>(?P<summary>[^<]*)</summary>\n\n(?P<notes>.*?)\n</details>")
        .expect("valid regex")
});

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<component>.+): )?(?P<version>\S+)$").expect("valid regex")
});

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^##\s+\[?v?(?P<version>\d+\.\d+\.\d+[^\]\s]*)").expect("valid regex")
});

static OVERFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- relman:overflow (?P<path>\S+) -->").expect("valid regex")
});

/// Notes for one component release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseData {
    /// Component name; `None` for an unnamed component
    pub component: Option<String>,
    /// Released version
    pub version: Version,
    /// Markdown notes
    pub notes: String,
}

/// A structured release pull request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestBody {
    /// Text above the notes
    pub header: String,
    /// Text below the notes
    pub footer: String,
    /// One entry per component, in order
    pub releases: Vec<ReleaseData>,
}

/// A body ready to send: the inline text plus an optional companion file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    /// What goes into the pull request description
    pub inline: String,
    /// File to push to the head branch when the body overflowed
    pub companion: Option<FileChange>,
}

impl PullRequestBody {
    /// Create a body with optional custom header and footer
    pub fn new(header: Option<&str>, footer: Option<&str>, releases: Vec<ReleaseData>) -> Self {
        Self {
            header: header.unwrap_or(DEFAULT_HEADER).to_string(),
            footer: footer.unwrap_or(DEFAULT_FOOTER).to_string(),
            releases,
        }
    }

    fn content(&self) -> String {
        if self.releases.len() == 1 {
            return self.releases[0].notes.clone();
        }
        self.releases
            .iter()
            .map(|release| {
                let summary = match &release.component {
                    Some(component) => format!("{component}: {}", release.version),
                    None => release.version.to_string(),
                };
                format!(
                    "<details><summary>{summary}</summary>\n\n{}\n</details>",
                    release.notes
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn wrap(&self, content: &str) -> String {
        format!(
            "{}{SEPARATOR}\n\n{content}\n{SEPARATOR}{}",
            self.header, self.footer
        )
    }

    /// The full body text
    pub fn render(&self) -> String {
        self.wrap(&self.content())
    }

    /// Render for the platform, externalizing the body when it is too large
    pub fn render_for_platform(&self) -> RenderedBody {
        let full = self.render();
        if full.len() <= MAX_BODY_SIZE {
            return RenderedBody {
                inline: full,
                companion: None,
            };
        }
        debug!(size = full.len(), "body exceeds limit, externalizing");
        let placeholder = format!(
            "{OVERFLOW_MARKER}{NOTES_FILE} -->\nThe release notes are too large for this description. \
             The full notes are in `{NOTES_FILE}` on this branch."
        );
        RenderedBody {
            inline: self.wrap(&placeholder),
            companion: Some(FileChange {
                path: NOTES_FILE.to_string(),
                content: full,
            }),
        }
    }

    /// Parse a full (not externalized) body
    pub fn parse(body: &str) -> Option<Self> {
        let body = body.replace("\r\n", "\n");
        let start = body.find(SEPARATOR)?;
        let end = body.rfind(SEPARATOR)?;
        if end <= start {
            return None;
        }
        let header = body[..start].to_string();
        let footer = body[end + SEPARATOR.len()..].to_string();
        let content = body[start + SEPARATOR.len()..end].trim();

        let releases = if content.contains("<details>") {
            DETAILS_RE
                .captures_iter(content)
                .map(|caps| {
                    let summary = SUMMARY_RE.captures(caps["summary"].trim())?;
                    Some(ReleaseData {
                        component: summary.name("component").map(|m| m.as_str().to_string()),
                        version: summary["version"].parse().ok()?,
                        notes: caps["notes"].to_string(),
                    })
                })
                .collect::<Option<Vec<_>>>()?
        } else {
            let version = HEADING_RE.captures(content)?["version"].parse().ok()?;
            vec![ReleaseData {
                component: None,
                version,
                notes: content.to_string(),
            }]
        };
        if releases.is_empty() {
            return None;
        }
        Some(Self {
            header,
            footer,
            releases,
        })
    }

    /// Companion file an inline body points at, if it was externalized
    pub fn overflow_path(body: &str) -> Option<&str> {
        OVERFLOW_RE
            .captures(body)
            .and_then(|caps| caps.name("path"))
            .map(|m| m.as_str())
    }

    /// Read a pull request's body, following an overflow marker.
    ///
    /// The companion file is read from the head branch, falling back to the
    /// base branch once the head branch is gone.
    pub async fn resolve(platform: &dyn PlatformService, pr: &PullRequest) -> Result<Option<Self>> {
        let Some(path) = Self::overflow_path(&pr.body) else {
            return Ok(Self::parse(&pr.body));
        };
        debug!(pr_number = pr.number, path, "reading externalized body");
        let content = match platform.file_contents(path, &pr.head_branch_name).await {
            Ok(content) => content,
            Err(Error::FileNotFound { .. }) => {
                platform.file_contents(path, &pr.base_branch_name).await?
            }
            Err(e) => return Err(e),
        };
        Ok(Self::parse(&content))
    }
}
