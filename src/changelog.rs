//! Release notes for a single component release

use crate::commit::ConventionalCommit;
use crate::version::Version;
use chrono::NaiveDate;
use std::fmt::Write;

/// Changelog section headings, in output order
const SECTIONS: &[(&str, &str)] = &[
    ("feat", "Features"),
    ("fix", "Bug Fixes"),
    ("perf", "Performance Improvements"),
    ("revert", "Reverts"),
    ("deps", "Dependencies"),
];

/// Everything the notes builder needs besides commits
#[derive(Debug, Clone)]
pub struct NotesContext<'a> {
    /// Repository web URL
    pub repo_url: &'a str,
    /// Tag of the previous release, if any
    pub previous_tag: Option<&'a str>,
    /// Tag the new release will get
    pub new_tag: &'a str,
    /// The new version
    pub version: &'a Version,
    /// Release date
    pub date: NaiveDate,
}

/// Build the markdown notes for one release
pub fn build_release_notes(commits: &[ConventionalCommit], ctx: &NotesContext<'_>) -> String {
    let mut out = String::new();
    let date = ctx.date.format("%Y-%m-%d");
    match ctx.previous_tag {
        Some(previous) => {
            let _ = write!(
                out,
                "## [{}]({}/compare/{previous}...{}) ({date})",
                ctx.version, ctx.repo_url, ctx.new_tag
            );
        }
        None => {
            let _ = write!(out, "## {} ({date})", ctx.version);
        }
    }

    let breaking: Vec<_> = commits.iter().filter(|c| c.breaking).collect();
    if !breaking.is_empty() {
        out.push_str("\n\n\n### ⚠ BREAKING CHANGES\n");
        for commit in breaking {
            for note in &commit.notes {
                push_bullet(&mut out, commit, &note.text, ctx.repo_url);
            }
        }
    }

    for (commit_type, heading) in SECTIONS {
        let entries: Vec<_> = commits
            .iter()
            .filter(|c| c.commit_type.as_deref() == Some(*commit_type))
            .collect();
        if entries.is_empty() {
            continue;
        }
        let _ = write!(out, "\n\n\n### {heading}\n");
        for commit in entries {
            push_bullet(&mut out, commit, &commit.bare_message, ctx.repo_url);
        }
    }

    out.trim_end().to_string()
}

fn push_bullet(out: &mut String, commit: &ConventionalCommit, text: &str, repo_url: &str) {
    out.push_str("\n* ");
    if let Some(scope) = &commit.scope {
        let _ = write!(out, "**{scope}:** ");
    }
    let _ = write!(
        out,
        "{text} ([{}]({repo_url}/commit/{}))",
        commit.short_sha(),
        commit.sha
    );
}
