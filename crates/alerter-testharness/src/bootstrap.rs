//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "01-bootstrap"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Resolution of configuration files and binaries under test."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
//! Locates the two binaries and three configuration files an integration run
//! needs, and fails before any test body runs when one of them is absent.
//!
//! Every location has a default relative to the workspace root and can be
//! replaced through an `ALERTER_TEST_*` environment variable:
//!
//! | key             | default                           | override                      |
//! |-----------------|-----------------------------------|-------------------------------|
//! | `config`        | `tests/resources/config.yml`        | `ALERTER_TEST_CONFIG`         |
//! | `client.config` | `tests/resources/client_config.yml` | `ALERTER_TEST_CLIENT_CONFIG`  |
//! | `logconfig`     | `tests/resources/logging.yml`       | `ALERTER_TEST_LOG_CONFIG`     |
//! | `client.binary` | `target/debug/alert`              | `ALERTER_TEST_CLIENT_BINARY`  |
//! | `server.binary` | `target/debug/alerter`            | `ALERTER_TEST_SERVER_BINARY`  |

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::debug;

/// Relocates the default binary directory the same way cargo does.
pub const TARGET_DIR_ENV: &str = "CARGO_TARGET_DIR";

/// Bootstrap failure; names the artifact that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
}

impl ConfigurationError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigurationError::MissingArtifact(path) => path,
        }
    }
}

/// One of the five artifacts handed to the suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarnessProperty {
    ServerConfig,
    ClientConfig,
    LogConfig,
    ClientBinary,
    ServerBinary,
}

impl HarnessProperty {
    /// Resolution order.
    pub const ALL: [HarnessProperty; 5] = [
        HarnessProperty::ServerConfig,
        HarnessProperty::ClientConfig,
        HarnessProperty::LogConfig,
        HarnessProperty::ClientBinary,
        HarnessProperty::ServerBinary,
    ];

    /// Stable property key.
    pub fn key(self) -> &'static str {
        match self {
            HarnessProperty::ServerConfig => "config",
            HarnessProperty::ClientConfig => "client.config",
            HarnessProperty::LogConfig => "logconfig",
            HarnessProperty::ClientBinary => "client.binary",
            HarnessProperty::ServerBinary => "server.binary",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            HarnessProperty::ServerConfig => "ALERTER_TEST_CONFIG",
            HarnessProperty::ClientConfig => "ALERTER_TEST_CLIENT_CONFIG",
            HarnessProperty::LogConfig => "ALERTER_TEST_LOG_CONFIG",
            HarnessProperty::ClientBinary => "ALERTER_TEST_CLIENT_BINARY",
            HarnessProperty::ServerBinary => "ALERTER_TEST_SERVER_BINARY",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|property| property.key() == key)
    }

    fn is_binary(self) -> bool {
        matches!(
            self,
            HarnessProperty::ClientBinary | HarnessProperty::ServerBinary
        )
    }
}

/// Where each artifact is expected, before checking the filesystem.
///
/// Relative entries are joined onto the root passed to [`ArtifactLayout::resolve`];
/// absolute entries are used as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    server_config: PathBuf,
    client_config: PathBuf,
    log_config: PathBuf,
    client_binary: PathBuf,
    server_binary: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::with_binary_dir(Path::new("target").join("debug"))
    }
}

impl ArtifactLayout {
    fn with_binary_dir(binary_dir: PathBuf) -> Self {
        let resources = Path::new("tests").join("resources");
        Self {
            server_config: resources.join("config.yml"),
            client_config: resources.join("client_config.yml"),
            log_config: resources.join("logging.yml"),
            client_binary: binary_dir.join("alert"),
            server_binary: binary_dir.join("alerter"),
        }
    }

    /// Default layout adjusted by the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Default layout adjusted by `lookup`, which maps a variable name to its value.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut layout = match set(TARGET_DIR_ENV) {
            Some(target) => Self::with_binary_dir(PathBuf::from(target).join("debug")),
            None => Self::default(),
        };
        for property in HarnessProperty::ALL {
            if let Some(value) = set(property.env_var()) {
                layout = layout.with_override(property, value);
            }
        }
        layout
    }

    pub fn with_override(mut self, property: HarnessProperty, path: impl Into<PathBuf>) -> Self {
        *self.slot(property) = path.into();
        self
    }

    pub fn get(&self, property: HarnessProperty) -> &Path {
        match property {
            HarnessProperty::ServerConfig => &self.server_config,
            HarnessProperty::ClientConfig => &self.client_config,
            HarnessProperty::LogConfig => &self.log_config,
            HarnessProperty::ClientBinary => &self.client_binary,
            HarnessProperty::ServerBinary => &self.server_binary,
        }
    }

    fn slot(&mut self, property: HarnessProperty) -> &mut PathBuf {
        match property {
            HarnessProperty::ServerConfig => &mut self.server_config,
            HarnessProperty::ClientConfig => &mut self.client_config,
            HarnessProperty::LogConfig => &mut self.log_config,
            HarnessProperty::ClientBinary => &mut self.client_binary,
            HarnessProperty::ServerBinary => &mut self.server_binary,
        }
    }

    /// Check every artifact under `root` and return the resolved paths.
    ///
    /// The first unusable artifact, in [`HarnessProperty::ALL`] order, is reported.
    pub fn resolve(&self, root: &Path) -> Result<HarnessConfiguration, ConfigurationError> {
        let mut resolved = ArtifactLayout {
            server_config: PathBuf::new(),
            client_config: PathBuf::new(),
            log_config: PathBuf::new(),
            client_binary: PathBuf::new(),
            server_binary: PathBuf::new(),
        };
        for property in HarnessProperty::ALL {
            let path = root.join(self.get(property));
            let usable = if property.is_binary() {
                is_executable(&path)
            } else {
                path.exists()
            };
            if !usable {
                return Err(ConfigurationError::MissingArtifact(path));
            }
            debug!(key = property.key(), path = %path.display(), "resolved test artifact");
            *resolved.slot(property) = path;
        }
        Ok(HarnessConfiguration { paths: resolved })
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Resolved, verified artifact locations. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfiguration {
    paths: ArtifactLayout,
}

impl HarnessConfiguration {
    /// Resolution shared by every suite in this test process.
    ///
    /// The first call resolves; later calls return the cached outcome, so a
    /// missing artifact fails each suite with the same error.
    pub fn shared() -> Result<&'static HarnessConfiguration, ConfigurationError> {
        static SHARED: OnceLock<Result<HarnessConfiguration, ConfigurationError>> = OnceLock::new();
        SHARED
            .get_or_init(resolve_configuration)
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Shared configuration for suites that cannot run without it.
    ///
    /// A missing artifact is reported once and ends the test process with
    /// status 1, instead of failing every test on its own.
    pub fn require() -> &'static HarnessConfiguration {
        match Self::shared() {
            Ok(config) => config,
            Err(err) => {
                // written past libtest's capture so the reason survives the exit
                let _ = writeln!(std::io::stderr(), "alerter system tests cannot start: {err}");
                std::process::exit(1)
            }
        }
    }

    pub fn server_config_path(&self) -> &Path {
        &self.paths.server_config
    }

    pub fn client_config_path(&self) -> &Path {
        &self.paths.client_config
    }

    pub fn log_config_path(&self) -> &Path {
        &self.paths.log_config
    }

    pub fn client_binary_path(&self) -> &Path {
        &self.paths.client_binary
    }

    pub fn server_binary_path(&self) -> &Path {
        &self.paths.server_binary
    }

    pub fn get(&self, property: HarnessProperty) -> &Path {
        self.paths.get(property)
    }

    /// Look a path up by its property key, e.g. `client.binary`.
    pub fn property(&self, key: &str) -> Option<&Path> {
        HarnessProperty::from_key(key).map(|property| self.get(property))
    }

    /// `(key, path)` for every property in resolution order.
    pub fn properties(&self) -> impl Iterator<Item = (&'static str, &Path)> + '_ {
        HarnessProperty::ALL
            .into_iter()
            .map(move |property| (property.key(), self.get(property)))
    }

    /// `(ALERTER_TEST_*, path)` pairs that reproduce this resolution in a child process.
    pub fn env_pairs(&self) -> Vec<(&'static str, PathBuf)> {
        HarnessProperty::ALL
            .into_iter()
            .map(|property| (property.env_var(), self.get(property).to_path_buf()))
            .collect()
    }
}

/// Workspace root: two levels above this crate's manifest directory.
pub fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Resolve all artifacts from the environment-adjusted default layout.
pub fn resolve_configuration() -> Result<HarnessConfiguration, ConfigurationError> {
    ArtifactLayout::from_env().resolve(&project_root())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn populate(root: &Path) {
        let resources = root.join("tests/resources");
        fs::create_dir_all(&resources).unwrap();
        for name in ["config.yml", "client_config.yml", "logging.yml"] {
            fs::write(resources.join(name), "socket_path: alert.sock\n").unwrap();
        }
        let bin = root.join("target/debug");
        fs::create_dir_all(&bin).unwrap();
        for name in ["alert", "alerter"] {
            let path = bin.join(name);
            fs::write(&path, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn complete_layout_resolves_to_configured_locations() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());

        let config = ArtifactLayout::default().resolve(dir.path()).unwrap();
        let root = dir.path();
        assert_eq!(config.server_config_path(), root.join("tests/resources/config.yml"));
        assert_eq!(config.client_config_path(), root.join("tests/resources/client_config.yml"));
        assert_eq!(config.log_config_path(), root.join("tests/resources/logging.yml"));
        assert_eq!(config.client_binary_path(), root.join("target/debug/alert"));
        assert_eq!(config.server_binary_path(), root.join("target/debug/alerter"));
    }

    #[test]
    fn each_missing_artifact_is_named() {
        for property in HarnessProperty::ALL {
            let dir = tempfile::tempdir().unwrap();
            populate(dir.path());
            let expected = dir.path().join(ArtifactLayout::default().get(property));
            fs::remove_file(&expected).unwrap();

            let err = ArtifactLayout::default().resolve(dir.path()).unwrap_err();
            assert_eq!(err, ConfigurationError::MissingArtifact(expected.clone()), "{}", property.key());
            assert!(err.to_string().contains(&expected.display().to_string()));
        }
    }

    #[test]
    fn binary_without_execute_bit_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let client = dir.path().join("target/debug/alert");
        fs::set_permissions(&client, fs::Permissions::from_mode(0o644)).unwrap();

        let err = ArtifactLayout::default().resolve(dir.path()).unwrap_err();
        assert_eq!(err.path(), client);
    }

    #[test]
    fn resolution_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let layout = ArtifactLayout::default();
        assert_eq!(layout.resolve(dir.path()).unwrap(), layout.resolve(dir.path()).unwrap());
    }

    #[test]
    fn property_keys_map_to_paths() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let config = ArtifactLayout::default().resolve(dir.path()).unwrap();

        let keys: Vec<_> = config.properties().map(|(key, _)| key).collect();
        assert_eq!(keys, ["config", "client.config", "logconfig", "client.binary", "server.binary"]);
        assert_eq!(config.property("logconfig"), Some(config.log_config_path()));
        assert_eq!(config.property("server.binary"), Some(config.server_binary_path()));
        assert_eq!(config.property("nope"), None);

        let env: HashMap<_, _> = config.env_pairs().into_iter().collect();
        assert_eq!(env["ALERTER_TEST_CLIENT_BINARY"], config.client_binary_path());
    }

    #[test]
    fn environment_overrides_replace_defaults() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let elsewhere = tempfile::tempdir().unwrap();
        let alt_log = elsewhere.path().join("log.yml");
        fs::write(&alt_log, "level: debug\n").unwrap();

        let vars: HashMap<&str, String> = [
            ("ALERTER_TEST_LOG_CONFIG", alt_log.display().to_string()),
            ("ALERTER_TEST_CONFIG", "   ".to_owned()),
        ]
        .into_iter()
        .collect();
        let layout = ArtifactLayout::from_lookup(|name| vars.get(name).cloned());

        let config = layout.resolve(dir.path()).unwrap();
        assert_eq!(config.log_config_path(), alt_log);
        assert_eq!(config.server_config_path(), dir.path().join("tests/resources/config.yml"));
    }

    #[test]
    fn target_dir_relocates_binaries() {
        let layout = ArtifactLayout::from_lookup(|name| {
            (name == TARGET_DIR_ENV).then(|| "/opt/build".to_owned())
        });
        assert_eq!(layout.get(HarnessProperty::ClientBinary), Path::new("/opt/build/debug/alert"));
        assert_eq!(layout.get(HarnessProperty::ServerBinary), Path::new("/opt/build/debug/alerter"));
    }

    #[test]
    fn project_root_holds_workspace_manifest() {
        assert!(project_root().join("Cargo.toml").is_file());
        assert!(project_root().join("crates").is_dir());
    }
}
