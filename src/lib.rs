//! release-manifest: manifest-driven release pull requests and GitHub releases
//!
//! A run has two halves. [`manifest::Manifest::create_pull_requests`] reads
//! commit history since each component's last release, computes next versions
//! and opens (or refreshes) release pull requests. Once such a pull request is
//! merged, [`manifest::Manifest::create_releases`] tags it and creates one
//! GitHub release per component.

pub mod auth;
pub mod branch_name;
pub mod changelog;
pub mod commit;
pub mod config;
pub mod error;
pub mod history;
pub mod labels;
pub mod manifest;
pub mod platform;
pub mod plugin;
pub mod progress;
pub mod release;
pub mod release_pr;
pub mod resolver;
pub mod strategy;
pub mod tag;
pub mod types;
pub mod version;
pub mod versioning;

pub use error::{Error, Result};
