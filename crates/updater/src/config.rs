//! Configuration for the updater.

use crate::{
    channel::Channel,
    error::{Result, UpdaterError},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Release manifest published by Plex.
pub const DEFAULT_CATALOG_URL: &str = "https://plex.tv/api/downloads/5.json";

/// Where to find releases and which of them apply to this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Manifest endpoint.
    pub url: String,
    /// Keys leading to the platform object, e.g. `["computer", "Windows"]`.
    pub platform_path: Vec<String>,
    /// Required `build` of a release; empty accepts any.
    pub build: String,
    /// Required `distro` of a release; empty accepts any.
    pub distro: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let (platform, build, distro) = if cfg!(windows) {
            ("Windows", "windows-x86_64", "windows")
        } else if cfg!(target_os = "macos") {
            ("MacOS", "darwin-x86_64", "macos")
        } else {
            ("Linux", "linux-x86_64", "debian")
        };

        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            platform_path: vec!["computer".to_string(), platform.to_string()],
            build: build.to_string(),
            distro: distro.to_string(),
            timeout_secs: 300,
            user_agent: None,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the local installation is discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Executable looked up when the default folder is absent.
    pub executable_name: String,
    /// Background service that must be registered.
    pub service_name: String,
    /// Overrides the platform default install folder.
    pub default_install_path: Option<PathBuf>,
    /// JSON file holding server settings (token, channel, data folder).
    pub settings_file: Option<PathBuf>,
    /// Directories searched for service definitions.
    pub service_dirs: Vec<PathBuf>,
    /// Update channel to use instead of the server's own setting.
    pub channel: Option<Channel>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let (executable_name, service_name) = if cfg!(windows) {
            ("Plex Media Server.exe", "PlexUpdateService")
        } else {
            ("Plex Media Server", "plexmediaserver")
        };

        Self {
            executable_name: executable_name.to_string(),
            service_name: service_name.to_string(),
            default_install_path: None,
            settings_file: None,
            service_dirs: vec![
                PathBuf::from("/etc/systemd/system"),
                PathBuf::from("/lib/systemd/system"),
                PathBuf::from("/usr/lib/systemd/system"),
            ],
            channel: None,
        }
    }
}

/// How verified packages are installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Installer command; `{package}` is replaced by the package path.
    pub command: Vec<String>,
    /// Keep the package in the staging folder after a successful install.
    pub keep_staged: bool,
    /// Overrides the server's updates folder as the download location.
    pub staging_dir: Option<PathBuf>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let command: &[&str] = if cfg!(windows) {
            &["{package}", "/install", "/quiet", "/norestart"]
        } else {
            &["dpkg", "-i", "{package}"]
        };

        Self {
            command: command.iter().map(|arg| arg.to_string()).collect(),
            keep_staged: false,
            staging_dir: None,
        }
    }
}

/// Top-level updater configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    pub catalog: CatalogConfig,
    pub probe: ProbeConfig,
    pub install: InstallConfig,
}

impl UpdaterConfig {
    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            UpdaterError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            UpdaterError::Config(format!("failed to parse {}: {err}", path.display()))
        })
    }

    /// Load from `path` when given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Set the manifest endpoint
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog.url = url.into();
        self
    }

    /// Set the platform path inside the manifest
    pub fn platform_path<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        self.catalog.platform_path = path.into_iter().map(Into::into).collect();
        self
    }

    /// Set the release build and distro filter
    pub fn release_filter(mut self, build: impl Into<String>, distro: impl Into<String>) -> Self {
        self.catalog.build = build.into();
        self.catalog.distro = distro.into();
        self
    }

    /// Set the installer command
    pub fn install_command<S: Into<String>>(mut self, command: impl IntoIterator<Item = S>) -> Self {
        self.install.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Force an update channel
    pub fn channel(mut self, channel: Channel) -> Self {
        self.probe.channel = Some(channel);
        self
    }

    /// Set the download folder
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install.staging_dir = Some(dir.into());
        self
    }
}
