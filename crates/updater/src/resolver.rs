use crate::{
    catalog::{Candidate, ReleaseCatalog, ReleaseCatalogClient, ReleaseCatalogEntry},
    channel::Channel,
    config::CatalogConfig,
    error::Result,
    fetcher::HttpFetcher,
    probe::InstalledServerInfo,
    version::Version,
};

/// Which releases of the manifest apply to this machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub platform_path: Vec<String>,
    /// Required build; empty accepts any.
    pub build: String,
    /// Required distro; empty accepts any.
    pub distro: String,
}

impl ReleaseTarget {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            platform_path: config.platform_path.clone(),
            build: config.build.clone(),
            distro: config.distro.clone(),
        }
    }

    pub fn accepts(&self, entry: &ReleaseCatalogEntry) -> bool {
        let matches = |wanted: &str, actual: &str| {
            wanted.is_empty() || wanted.eq_ignore_ascii_case(actual)
        };
        matches(&self.build, &entry.build) && matches(&self.distro, &entry.distro)
    }
}

/// Pick the newest applicable release for `channel`.
///
/// Entries without a download URL or a known version are skipped. When
/// several share the highest version the first in manifest order wins.
pub fn select_candidate(
    catalog: &ReleaseCatalog,
    target: &ReleaseTarget,
    channel: Channel,
) -> Option<Candidate> {
    let Some(platform) = catalog.platform(target.platform_path.as_slice()) else {
        tracing::debug!(path = ?target.platform_path, "manifest has no such platform");
        return None;
    };
    let declared = platform.declared_version();

    platform
        .releases_for(channel)
        .iter()
        .filter(|entry| !entry.url.is_empty() && target.accepts(entry))
        .map(|entry| Candidate::from_entry(entry, declared))
        .filter(|candidate| !candidate.version.is_unknown())
        .fold(None, |best: Option<Candidate>, candidate| match best {
            Some(best) if best.version >= candidate.version => Some(best),
            _ => Some(candidate),
        })
}

/// Resolution state of an [`UpdateResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing has been resolved yet.
    #[default]
    Unknown,
    /// The catalog was consulted.
    Resolved {
        installed: Version,
        latest: Option<Candidate>,
    },
}

/// Compares the installed server against the release catalog.
pub struct UpdateResolver<F> {
    catalog: ReleaseCatalogClient<F>,
    server: InstalledServerInfo,
    target: ReleaseTarget,
    state: Resolution,
}

impl<F> UpdateResolver<F>
where
    F: HttpFetcher,
{
    pub fn new(
        catalog: ReleaseCatalogClient<F>,
        server: InstalledServerInfo,
        target: ReleaseTarget,
    ) -> Self {
        Self {
            catalog,
            server,
            target,
            state: Resolution::Unknown,
        }
    }

    pub fn server(&self) -> &InstalledServerInfo {
        &self.server
    }

    pub fn catalog(&self) -> &ReleaseCatalogClient<F> {
        &self.catalog
    }

    pub fn fetcher(&self) -> &F {
        self.catalog.fetcher()
    }

    pub fn state(&self) -> &Resolution {
        &self.state
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, Resolution::Resolved { .. })
    }

    /// Fetch the catalog and select the newest release, replacing any
    /// previous resolution. A failed fetch leaves the resolver unresolved.
    pub async fn resolve(&mut self) -> Result<Option<&Candidate>> {
        self.state = Resolution::Unknown;
        let catalog = self
            .catalog
            .fetch(self.server.channel, self.server.token.as_deref())
            .await?;
        let latest = select_candidate(&catalog, &self.target, self.server.channel);

        tracing::debug!(
            installed = %self.server.installed_version,
            latest = ?latest.as_ref().map(|candidate| candidate.version.to_string()),
            "resolved release catalog"
        );

        self.state = Resolution::Resolved {
            installed: self.server.installed_version,
            latest,
        };
        Ok(self.candidate())
    }

    /// Whether the installed version is known, which is required before
    /// the catalog is consulted at all.
    pub fn can_check(&self) -> bool {
        !self.server.installed_version.is_unknown()
    }

    /// Whether a newer release than the installed one is published.
    ///
    /// Re-fetches the catalog on every call. Unknown installed versions,
    /// missing releases and an unreachable catalog all count as "no update".
    pub async fn is_update_available(&mut self) -> bool {
        if !self.can_check() {
            tracing::debug!("installed version unknown; not checking for updates");
            return false;
        }

        if let Err(err) = self.resolve().await {
            tracing::warn!("could not check for updates: {err}");
            return false;
        }

        self.update_available()
    }

    /// Availability according to the current resolution, without fetching.
    pub fn update_available(&self) -> bool {
        match &self.state {
            Resolution::Resolved {
                installed,
                latest: Some(candidate),
            } => !installed.is_unknown() && candidate.version > *installed,
            _ => false,
        }
    }

    /// The selected release, if resolved and one exists.
    pub fn candidate(&self) -> Option<&Candidate> {
        match &self.state {
            Resolution::Resolved { latest, .. } => latest.as_ref(),
            Resolution::Unknown => None,
        }
    }

    /// Newest published version, or unknown before resolution.
    pub fn latest_version(&self) -> Version {
        self.candidate()
            .map(|candidate| candidate.version)
            .unwrap_or(Version::UNKNOWN)
    }

    /// Installed version, or unknown before resolution.
    pub fn current_version(&self) -> Version {
        match &self.state {
            Resolution::Resolved { installed, .. } => *installed,
            Resolution::Unknown => Version::UNKNOWN,
        }
    }
}
