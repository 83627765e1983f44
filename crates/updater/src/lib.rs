//! Update resolution and package verification for Plex Media Server.
//!
//! The updater discovers the installed server through a [`PlatformProbe`],
//! fetches the remote release manifest, selects the newest release for the
//! server's platform and update channel, downloads it and verifies both the
//! checksum and the version embedded in the package file name before the
//! package is handed to an [`Installer`].
//!
//! ```ignore
//! use server_updater::{
//!     CommandInstaller, HttpClient, InstalledServerProbe, ReleaseCatalogClient,
//!     ReleaseTarget, Session, StatusLog, SystemProbe, UpdaterConfig,
//! };
//!
//! # async fn demo() -> server_updater::Result<()> {
//! let config = UpdaterConfig::default();
//! let probe = InstalledServerProbe::new(SystemProbe::new(config.probe.clone()), config.probe.clone());
//! let client = HttpClient::builder().build()?;
//! let catalog = ReleaseCatalogClient::with_url(client, &config.catalog.url)?;
//! let installer = CommandInstaller::new(config.install.command.clone())?;
//!
//! let mut session = Session::initialize(
//!     &probe,
//!     catalog,
//!     ReleaseTarget::from_config(&config.catalog),
//!     installer,
//!     StatusLog::new(),
//! )?;
//!
//! let report = session.check().await;
//! if report.update_available && !session.update().await {
//!     eprintln!("{}", session.status().messages().join("\n"));
//! }
//! # Ok(())
//! # }
//! ```

mod catalog;
mod channel;
mod checksum;
mod config;
mod error;
mod executor;
mod fetcher;
mod install;
mod package;
mod probe;
mod resolver;
mod session;
mod status;
mod version;

pub use catalog::{
    Candidate, PlatformNode, PlatformRelease, ReleaseCatalog, ReleaseCatalogClient,
    ReleaseCatalogEntry, TOKEN_HEADER,
};
pub use channel::Channel;
pub use checksum::{ChecksumVerifier, DigestAlgorithm};
pub use config::{CatalogConfig, InstallConfig, ProbeConfig, UpdaterConfig, DEFAULT_CATALOG_URL};
pub use error::{Result, UpdaterError};
pub use executor::{UpdateExecutor, UpdateOutcome};
pub use fetcher::{HttpClient, HttpClientBuilder, HttpFetcher};
pub use install::{CommandInstaller, Installer, PACKAGE_PLACEHOLDER};
pub use package::PackageDescriptor;
pub use probe::{
    InstalledServerInfo, InstalledServerProbe, PlatformProbe, ProbeOutcome, SystemProbe,
    CHANNEL_SETTING, LOCAL_DATA_SETTING, TOKEN_SETTING,
};
pub use resolver::{select_candidate, ReleaseTarget, Resolution, UpdateResolver};
pub use session::{CheckReport, Session};
pub use status::StatusLog;
pub use version::Version;
