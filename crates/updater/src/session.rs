//! One probe → resolve → update cycle.

use crate::{
    catalog::ReleaseCatalogClient,
    error::{Result, UpdaterError},
    executor::UpdateExecutor,
    fetcher::HttpFetcher,
    install::Installer,
    probe::{InstalledServerInfo, InstalledServerProbe, PlatformProbe, ProbeOutcome},
    resolver::{ReleaseTarget, UpdateResolver},
    status::StatusLog,
    version::Version,
};

/// Versions shown to the user after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
    pub installed: Version,
    pub latest: Version,
    pub update_available: bool,
}

/// An update session bound to one snapshot of the installed server.
pub struct Session<F, I> {
    executor: UpdateExecutor<F, I>,
}

impl<F, I> Session<F, I>
where
    F: HttpFetcher,
    I: Installer,
{
    /// Probe the installation and prepare the resolver.
    ///
    /// Fails with [`UpdaterError::AppNotInstalled`] or
    /// [`UpdaterError::ServiceNotInstalled`] before anything is fetched.
    pub fn initialize<P: PlatformProbe>(
        probe: &InstalledServerProbe<P>,
        catalog: ReleaseCatalogClient<F>,
        target: ReleaseTarget,
        installer: I,
        status: StatusLog,
    ) -> Result<Self> {
        let server = match probe.probe() {
            ProbeOutcome::Installed(server) => server,
            ProbeOutcome::NotInstalled => return Err(UpdaterError::AppNotInstalled),
            ProbeOutcome::ServiceNotInstalled(name) => {
                return Err(UpdaterError::ServiceNotInstalled(name))
            }
        };

        tracing::info!(
            folder = %server.install_folder.display(),
            version = %server.installed_version,
            channel = %server.channel,
            "found Plex Media Server"
        );

        let resolver = UpdateResolver::new(catalog, server, target);
        Ok(Self {
            executor: UpdateExecutor::new(resolver, installer, status),
        })
    }

    /// Adjust the executor, e.g. staging folder or kept packages.
    pub fn configure(
        mut self,
        f: impl FnOnce(UpdateExecutor<F, I>) -> UpdateExecutor<F, I>,
    ) -> Self {
        self.executor = f(self.executor);
        self
    }

    pub fn server(&self) -> &InstalledServerInfo {
        self.executor.resolver().server()
    }

    pub fn status(&self) -> &StatusLog {
        self.executor.status()
    }

    /// Consult the catalog and report installed and latest versions.
    ///
    /// Re-fetches the catalog every time. Nothing is fetched when the
    /// installed version is unknown.
    pub async fn check(&mut self) -> CheckReport {
        let update_available = self.executor.resolver_mut().is_update_available().await;

        CheckReport {
            installed: self.server().installed_version,
            latest: self.executor.resolver().latest_version(),
            update_available,
        }
    }

    /// Run the update. See [`UpdateExecutor::update`].
    pub async fn update(&mut self) -> bool {
        self.executor.update().await
    }
}
