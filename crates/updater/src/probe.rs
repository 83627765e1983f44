//! Discovery of the locally installed server.

use crate::{channel::Channel, config::ProbeConfig, version::Version};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Setting holding the account token.
pub const TOKEN_SETTING: &str = "PlexOnlineToken";
/// Setting holding the numeric update channel.
pub const CHANNEL_SETTING: &str = "ButlerUpdateChannel";
/// Setting overriding the local data folder.
pub const LOCAL_DATA_SETTING: &str = "LocalAppDataPath";

const UPDATES_FOLDER: &str = "Updates";
const ENV_PREFIX: &str = "PLEX_";
const MAX_PATH_SIZE: usize = 256;

/// Operating system services used to inspect the installation.
pub trait PlatformProbe: Send + Sync {
    /// Install folder at the well-known default location, if any.
    fn default_install_path(&self) -> Option<PathBuf>;
    /// Path of an installed component file looked up by executable name.
    fn lookup_installed_component_path(&self, executable_name: &str) -> Option<PathBuf>;
    fn is_service_registered(&self, name: &str) -> bool;
    /// Version of the server installed in `install_folder`.
    fn installed_version(&self, install_folder: &Path) -> Option<Version>;
    /// A server setting by name.
    fn setting(&self, name: &str) -> Option<String>;
    fn default_local_data_folder(&self) -> Option<PathBuf>;
}

/// Snapshot of the installed server, captured once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledServerInfo {
    pub install_folder: PathBuf,
    pub is_installed: bool,
    pub installed_version: Version,
    pub token: Option<String>,
    pub channel: Channel,
    pub local_data_folder: Option<PathBuf>,
    pub updates_folder: Option<PathBuf>,
}

/// Result of probing the local system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Installed(InstalledServerInfo),
    /// No install folder could be found.
    NotInstalled,
    /// The server is installed but its service is not registered.
    ServiceNotInstalled(String),
}

/// Collects [`InstalledServerInfo`] through a [`PlatformProbe`].
pub struct InstalledServerProbe<P> {
    platform: P,
    config: ProbeConfig,
}

impl<P> InstalledServerProbe<P>
where
    P: PlatformProbe,
{
    pub fn new(platform: P, config: ProbeConfig) -> Self {
        Self { platform, config }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Probe the system for the installed server.
    pub fn probe(&self) -> ProbeOutcome {
        let Some(install_folder) = self.install_folder() else {
            tracing::warn!("no installation of the server was found");
            return ProbeOutcome::NotInstalled;
        };

        if !self.platform.is_service_registered(&self.config.service_name) {
            tracing::warn!(service = %self.config.service_name, "service is not registered");
            return ProbeOutcome::ServiceNotInstalled(self.config.service_name.clone());
        }

        let installed_version = self
            .platform
            .installed_version(&install_folder)
            .unwrap_or(Version::UNKNOWN);
        let token = self
            .platform
            .setting(TOKEN_SETTING)
            .filter(|token| !token.trim().is_empty());
        let channel = self.config.channel.unwrap_or_else(|| {
            self.platform
                .setting(CHANNEL_SETTING)
                .map(|value| Channel::from_setting(&value))
                .unwrap_or_default()
        });
        let local_data_folder = self
            .platform
            .setting(LOCAL_DATA_SETTING)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.platform.default_local_data_folder());
        let updates_folder = local_data_folder
            .as_ref()
            .map(|folder| folder.join(UPDATES_FOLDER));

        tracing::debug!(
            folder = %install_folder.display(),
            version = %installed_version,
            %channel,
            "probed installed server"
        );

        ProbeOutcome::Installed(InstalledServerInfo {
            install_folder,
            is_installed: true,
            installed_version,
            token,
            channel,
            local_data_folder,
            updates_folder,
        })
    }

    fn install_folder(&self) -> Option<PathBuf> {
        if let Some(path) = self.platform.default_install_path() {
            if path.is_dir() {
                return Some(path);
            }
        }

        let component = self
            .platform
            .lookup_installed_component_path(&self.config.executable_name)?;
        if component.as_os_str().is_empty() {
            return None;
        }

        if component.as_os_str().len() < MAX_PATH_SIZE && !component.is_dir() {
            return component.parent().map(Path::to_path_buf);
        }
        Some(component)
    }
}

/// [`PlatformProbe`] backed by the local filesystem, `PATH` and processes.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    config: ProbeConfig,
}

impl SystemProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn settings_file_value(&self, name: &str) -> Option<String> {
        let path = self.config.settings_file.as_ref()?;
        let raw = std::fs::read_to_string(path)
            .map_err(|err| {
                tracing::debug!(path = %path.display(), "settings file unreadable: {err}");
            })
            .ok()?;
        let settings: Value = serde_json::from_str(&raw)
            .map_err(|err| {
                tracing::debug!(path = %path.display(), "settings file malformed: {err}");
            })
            .ok()?;

        match settings.get(name)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

impl PlatformProbe for SystemProbe {
    fn default_install_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.default_install_path {
            return Some(path.clone());
        }

        if cfg!(windows) {
            std::env::var_os("ProgramFiles(x86)")
                .map(|folder| PathBuf::from(folder).join("Plex").join("Plex Media Server"))
        } else {
            Some(PathBuf::from("/usr/lib/plexmediaserver"))
        }
    }

    fn lookup_installed_component_path(&self, executable_name: &str) -> Option<PathBuf> {
        which::which(executable_name).ok()
    }

    fn is_service_registered(&self, name: &str) -> bool {
        if cfg!(windows) {
            return Command::new("sc")
                .args(["query", name])
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false);
        }

        let unit = format!("{name}.service");
        self.config
            .service_dirs
            .iter()
            .any(|dir| dir.join(&unit).is_file())
    }

    fn installed_version(&self, install_folder: &Path) -> Option<Version> {
        let executable = install_folder.join(&self.config.executable_name);
        let output = Command::new(&executable)
            .arg("--version")
            .output()
            .map_err(|err| {
                tracing::debug!(path = %executable.display(), "failed to query version: {err}");
            })
            .ok()?;
        if !output.status.success() {
            return None;
        }

        let version = Version::parse_release(&String::from_utf8_lossy(&output.stdout));
        (!version.is_unknown()).then_some(version)
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.settings_file_value(name)
            .or_else(|| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    fn default_local_data_folder(&self) -> Option<PathBuf> {
        if cfg!(windows) {
            std::env::var_os("LOCALAPPDATA")
                .map(|folder| PathBuf::from(folder).join("Plex Media Server"))
        } else {
            Some(PathBuf::from(
                "/var/lib/plexmediaserver/Library/Application Support/Plex Media Server",
            ))
        }
    }
}
