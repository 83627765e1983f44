use std::path::PathBuf;

/// Convenient result alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

/// Errors that can occur while resolving or applying an update.
#[derive(thiserror::Error, Debug)]
pub enum UpdaterError {
    /// An argument was missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The release manifest could not be fetched or parsed.
    #[error("release catalog unavailable: {0}")]
    CatalogUnavailable(String),
    /// Network request failed.
    #[error("download failed: {0}")]
    Fetch(#[from] reqwest::Error),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// The downloaded package hash did not match the manifest.
    #[error("package checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        /// Checksum declared by the manifest.
        expected: String,
        /// Checksum computed from the staged file.
        actual: String,
    },
    /// The version embedded in the package name did not match the manifest.
    #[error("package version mismatch (expected {expected}, got {actual})")]
    VersionMismatch {
        /// Version declared by the manifest.
        expected: String,
        /// Version parsed from the staged file name.
        actual: String,
    },
    /// No version could be parsed from the package file name.
    #[error("package version could not be determined: {0}")]
    UnknownPackageVersion(PathBuf),
    /// The media server is not installed on this machine.
    #[error("Plex Media Server is not installed")]
    AppNotInstalled,
    /// The media server service is not registered.
    #[error("the {0} service is not installed")]
    ServiceNotInstalled(String),
    /// The installation trigger reported a failure.
    #[error("installation failed: {0}")]
    InstallFailed(String),
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl UpdaterError {
    /// Helper for wrapping catalog failures.
    pub fn catalog(msg: impl Into<String>) -> Self {
        UpdaterError::CatalogUnavailable(msg.into())
    }

    /// Whether the error is a post-download verification failure.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            UpdaterError::ChecksumMismatch { .. }
                | UpdaterError::VersionMismatch { .. }
                | UpdaterError::UnknownPackageVersion(_)
        )
    }
}
