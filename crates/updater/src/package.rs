use crate::{
    checksum::{ChecksumVerifier, DigestAlgorithm},
    error::{Result, UpdaterError},
    version::Version,
};
use std::path::{Path, PathBuf};

/// An installation package on the local filesystem.
///
/// Checksum and version are derived from the file when the descriptor is
/// built. A missing or unreadable file leaves them as `None` and
/// [`Version::UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    full_path: PathBuf,
    checksum: Option<String>,
    version: Version,
}

impl PackageDescriptor {
    /// Describe the package at `full_path` using the default digest algorithm.
    pub fn new(full_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_algorithm(full_path, DigestAlgorithm::default())
    }

    /// Describe the package at `full_path`, hashing it with `algorithm`.
    pub fn with_algorithm(full_path: impl Into<PathBuf>, algorithm: DigestAlgorithm) -> Result<Self> {
        let full_path = full_path.into();
        if full_path.as_os_str().is_empty() {
            return Err(UpdaterError::InvalidArgument("package path must not be empty"));
        }

        let checksum = ChecksumVerifier::new(algorithm).digest_file(&full_path);
        let version = if full_path.is_file() {
            Version::parse_path(&full_path)
        } else {
            Version::UNKNOWN
        };

        Ok(Self {
            full_path,
            checksum,
            version,
        })
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn is_known_version(&self) -> bool {
        !self.version.is_unknown()
    }

    /// Whether the computed checksum equals `expected` (case-insensitive).
    pub fn matches_checksum(&self, expected: &str) -> bool {
        self.checksum
            .as_deref()
            .is_some_and(|actual| actual.eq_ignore_ascii_case(expected.trim()))
    }

    /// Fail unless the computed checksum equals `expected`.
    pub fn verify_checksum(&self, expected: &str) -> Result<()> {
        if self.matches_checksum(expected) {
            return Ok(());
        }

        Err(UpdaterError::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual: self.checksum.clone().unwrap_or_else(|| "<none>".to_string()),
        })
    }

    /// Fail unless the parsed version is known and equals `expected`.
    pub fn verify_version(&self, expected: Version) -> Result<()> {
        if !self.is_known_version() {
            return Err(UpdaterError::UnknownPackageVersion(self.full_path.clone()));
        }

        if self.version != expected {
            return Err(UpdaterError::VersionMismatch {
                expected: expected.to_string(),
                actual: self.version.to_string(),
            });
        }

        Ok(())
    }

    /// Check the package against the checksum and version a release declares.
    pub fn verify_against(&self, expected_checksum: &str, expected_version: Version) -> Result<()> {
        self.verify_checksum(expected_checksum)?;
        self.verify_version(expected_version)
    }
}
