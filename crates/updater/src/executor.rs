use crate::{
    catalog::{Candidate, TOKEN_HEADER},
    checksum::DigestAlgorithm,
    error::{Result, UpdaterError},
    fetcher::{parse_url, HttpFetcher},
    install::Installer,
    package::PackageDescriptor,
    resolver::UpdateResolver,
    status::StatusLog,
    version::Version,
};
use std::fs;
use std::path::{Path, PathBuf};

const FALLBACK_STAGING_DIR: &str = "pms-updater";
const FALLBACK_PACKAGE_NAME: &str = "PlexMediaServer.pkg";

/// Result of a successful [`UpdateExecutor::try_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing newer was published.
    UpToDate,
    /// A verified package was handed to the installer.
    Installed {
        version: Version,
        /// Staged package; removed unless it was kept.
        package: PathBuf,
    },
}

/// Downloads, verifies and installs the release selected by an
/// [`UpdateResolver`].
pub struct UpdateExecutor<F, I> {
    resolver: UpdateResolver<F>,
    installer: I,
    status: StatusLog,
    staging_dir: Option<PathBuf>,
    keep_staged: bool,
}

impl<F, I> UpdateExecutor<F, I>
where
    F: HttpFetcher,
    I: Installer,
{
    pub fn new(resolver: UpdateResolver<F>, installer: I, status: StatusLog) -> Self {
        Self {
            resolver,
            installer,
            status,
            staging_dir: None,
            keep_staged: false,
        }
    }

    /// Download into `dir` instead of the server's updates folder.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Keep verified packages after a successful install.
    pub fn keep_staged(mut self, keep: bool) -> Self {
        self.keep_staged = keep;
        self
    }

    pub fn resolver(&self) -> &UpdateResolver<F> {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut UpdateResolver<F> {
        &mut self.resolver
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    /// Run the update, reporting any failure through the status log.
    pub async fn update(&mut self) -> bool {
        match self.try_update().await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("update failed: {err}");
                self.status
                    .push(format!("The update could not complete: {err}"));
                false
            }
        }
    }

    /// Resolve, download, verify and install the newest release.
    ///
    /// An unknown installed version is never updated and the catalog is not
    /// consulted for it.
    pub async fn try_update(&mut self) -> Result<UpdateOutcome> {
        if !self.resolver.can_check() {
            self.status.push(
                "The installed version could not be determined; no update will be applied.",
            );
            return Ok(UpdateOutcome::UpToDate);
        }

        if !self.resolver.is_resolved() {
            self.status.push("Checking for the latest release...");
            self.resolver.resolve().await?;
        }

        let candidate = match self.resolver.candidate() {
            Some(candidate) if self.resolver.update_available() => candidate.clone(),
            _ => {
                self.status.push(format!(
                    "No update is available (installed: {}, latest: {}).",
                    self.resolver.current_version(),
                    self.resolver.latest_version()
                ));
                return Ok(UpdateOutcome::UpToDate);
            }
        };

        self.status.push(format!(
            "Downloading version {} from {}...",
            candidate.version, candidate.entry.url
        ));
        let staged = self.download(&candidate).await?;

        self.status.push("Verifying the package checksum...");
        let algorithm = DigestAlgorithm::for_checksum(&candidate.entry.checksum);
        let package = match PackageDescriptor::with_algorithm(&staged, algorithm) {
            Ok(package) => package,
            Err(err) => return Err(self.discard(&staged, err)),
        };
        if let Err(err) = package.verify_checksum(&candidate.entry.checksum) {
            return Err(self.discard(&staged, err));
        }

        self.status.push("Verifying the package version...");
        if let Err(err) = package.verify_version(candidate.version) {
            return Err(self.discard(&staged, err));
        }

        self.status
            .push(format!("Installing version {}...", candidate.version));
        match self.installer.install(package.full_path()).await {
            Ok(true) => {}
            Ok(false) => {
                let err = UpdaterError::InstallFailed("the installer reported a failure".into());
                return Err(self.discard(&staged, err));
            }
            Err(err) => return Err(self.discard(&staged, err)),
        }

        if !self.keep_staged {
            remove_staged(&staged);
        }
        self.status.push(format!(
            "Plex Media Server {} was installed.",
            candidate.version
        ));

        Ok(UpdateOutcome::Installed {
            version: candidate.version,
            package: staged,
        })
    }

    fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .or_else(|| self.resolver.server().updates_folder.clone())
            .unwrap_or_else(|| std::env::temp_dir().join(FALLBACK_STAGING_DIR))
    }

    async fn download(&self, candidate: &Candidate) -> Result<PathBuf> {
        let url = parse_url(&candidate.entry.url)?;
        let token = self.resolver.server().token.as_deref();
        let headers: Vec<(&str, &str)> = match token {
            Some(token) if self.resolver.catalog().same_origin(&url) => vec![(TOKEN_HEADER, token)],
            Some(_) => {
                tracing::debug!(%url, "package host differs from the catalog; token withheld");
                Vec::new()
            }
            None => Vec::new(),
        };

        let target = self.staging_dir().join(staged_file_name(candidate));
        let size = self
            .resolver
            .fetcher()
            .download_to(&url, &headers, &target)
            .await?;
        tracing::debug!(path = %target.display(), size, "staged package");
        Ok(target)
    }

    /// Remove a staged package that must not be installed.
    fn discard(&self, staged: &Path, err: UpdaterError) -> UpdaterError {
        remove_staged(staged);
        self.status
            .push(format!("Discarded {}: {err}", staged.display()));
        err
    }
}

/// File name for the staged package; keeps the download's own name so the
/// version embedded in it can be verified. Downloads without a usable name
/// get a fixed one that carries no version, so they never verify.
fn staged_file_name(candidate: &Candidate) -> String {
    match candidate.entry.file_name() {
        Some(name) if name != "." && name != ".." && !name.contains('\\') => name.to_string(),
        _ => FALLBACK_PACKAGE_NAME.to_string(),
    }
}

fn remove_staged(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove staged package {:?}: {}", path, err);
        }
    }
}
