//! Shared test fixtures

#![allow(dead_code)]

mod mock_platform;

pub use mock_platform::*;

use chrono::NaiveDate;
use release_manifest::config::ManifestConfig;
use release_manifest::manifest::Manifest;
use release_manifest::platform::retry::RetryPolicy;

/// Release date written into every generated changelog entry
pub fn release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

/// Parse a configuration from TOML text
pub fn config(toml: &str) -> ManifestConfig {
    ManifestConfig::parse(toml, "test.toml").unwrap()
}

/// A single simple package at the repository root
pub fn single_package_config() -> ManifestConfig {
    config(
        r#"
[packages."."]
release_type = "simple"
"#,
    )
}

/// Two simple packages, `packages/a` and `packages/b`
pub fn two_package_config(separate: bool) -> ManifestConfig {
    config(&format!(
        r#"
separate_pull_requests = {separate}

[packages."packages/a"]
release_type = "simple"
component = "a"

[packages."packages/b"]
release_type = "simple"
component = "b"
"#
    ))
}

/// Manifest over `mock` with a fixed date and no polling delays
pub fn manifest(mock: &MockPlatformService, config: ManifestConfig) -> Manifest<'_> {
    Manifest::new(mock, config)
        .unwrap()
        .with_date(release_date())
        .with_poll_policy(RetryPolicy::immediate(3))
}

/// `main` at a released 1.0.0 of the root package, with one fix since
pub fn released_single_package(mock: &MockPlatformService) {
    mock.set_file("main", ".release-please-manifest.json", r#"{".": "1.0.0"}"#);
    mock.set_file("main", "version.txt", "1.0.0\n");
    let released = mock.commit("main", "chore: release 1.0.0", &["version.txt"]);
    mock.add_release("v1.0.0", &released);
    mock.commit("main", "fix: handle empty input", &["src/lib.rs"]);
}
