//! ---
//! alerter_section: "14-versioning"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Version metadata for CLI banners and message footers."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use serde::Serialize;

/// Compile-time version metadata captured via `vergen`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Workspace semantic version.
    pub semver: String,
    /// Git commit hash captured at build time.
    pub git_sha: String,
    /// Build timestamp from the compilation environment.
    pub build_timestamp: String,
    /// Target triple used for the build.
    pub target: String,
    /// Cargo profile used during compilation.
    pub profile: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("VERGEN_GIT_SHA")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or("UNKNOWN")
                .to_owned(),
            profile: option_env!("VERGEN_CARGO_PROFILE")
                .unwrap_or("UNKNOWN")
                .to_owned(),
        }
    }

    /// Footer attached to every alert, e.g. `alert v0.1.0`.
    #[must_use]
    pub fn footer(&self, program: &str) -> String {
        format!("{} v{}", program, self.semver)
    }

    #[must_use]
    pub fn banner(&self, program: &str) -> String {
        format!("{} v{} (git {})", program, self.semver, self.git_sha)
    }

    /// Extended string containing build metadata suitable for `--version` flags.
    #[must_use]
    pub fn extended(&self, program: &str) -> String {
        format!(
            "{banner}\nBuilt: {built}\nTarget: {target}\nProfile: {profile}",
            banner = self.banner(program),
            built = self.build_timestamp,
            target = self.target,
            profile = self.profile
        )
    }
}
