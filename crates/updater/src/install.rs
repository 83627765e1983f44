use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Placeholder in installer command templates.
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Installation trigger for verified packages.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install the package at `package`; `false` means the installer
    /// reported failure.
    async fn install(&self, package: &Path) -> Result<bool>;
}

/// Runs an external installer command.
///
/// Every `{package}` in the template is replaced by the package path. If the
/// template has no placeholder the path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    command: Vec<String>,
}

impl CommandInstaller {
    pub fn new<S: Into<String>>(command: impl IntoIterator<Item = S>) -> Result<Self> {
        let command: Vec<String> = command.into_iter().map(Into::into).collect();
        if !command.first().is_some_and(|program| !program.trim().is_empty()) {
            return Err(UpdaterError::Config("installer command is empty".into()));
        }
        Ok(Self { command })
    }

    /// The command line that would install `package`.
    pub fn command_line(&self, package: &Path) -> Vec<String> {
        let package = package.to_string_lossy();
        let mut args: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace(PACKAGE_PLACEHOLDER, &package))
            .collect();
        if !self.command.iter().any(|arg| arg.contains(PACKAGE_PLACEHOLDER)) {
            args.push(package.into_owned());
        }
        args
    }
}

#[async_trait]
impl Installer for CommandInstaller {
    async fn install(&self, package: &Path) -> Result<bool> {
        let args = self.command_line(package);
        tracing::info!("Running: {}", args.join(" "));

        let status = Command::new(&args[0])
            .args(&args[1..])
            .status()
            .await
            .map_err(|err| UpdaterError::InstallFailed(format!("failed to run {}: {err}", args[0])))?;

        if !status.success() {
            tracing::warn!(code = ?status.code(), "installer exited unsuccessfully");
        }
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_or_appends_package() {
        let installer = CommandInstaller::new(["dpkg", "-i", "{package}"]).unwrap();
        assert_eq!(
            installer.command_line(Path::new("/tmp/pms.deb")),
            vec!["dpkg", "-i", "/tmp/pms.deb"]
        );

        let installer = CommandInstaller::new(["msiexec", "/i"]).unwrap();
        assert_eq!(
            installer.command_line(Path::new("pms.msi")),
            vec!["msiexec", "/i", "pms.msi"]
        );
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandInstaller::new(Vec::<String>::new()).is_err());
        assert!(CommandInstaller::new([" "]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_exit_status() {
        let ok = CommandInstaller::new(["true"]).unwrap();
        assert!(ok.install(Path::new("/tmp/unused")).await.unwrap());

        let failing = CommandInstaller::new(["false"]).unwrap();
        assert!(!failing.install(Path::new("/tmp/unused")).await.unwrap());

        let missing = CommandInstaller::new(["/definitely/not/an/installer"]).unwrap();
        assert!(matches!(
            missing.install(Path::new("/tmp/unused")).await,
            Err(UpdaterError::InstallFailed(_))
        ));
    }
}
