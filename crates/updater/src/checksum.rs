//! File digests for downloaded packages.
//!
//! Hashing is lenient: any failure yields `None` so that a partial or corrupt
//! download fails the later checksum comparison instead of aborting early.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 8192;

/// Digest algorithm used for package checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-1, as published by the release manifest.
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Pick the algorithm matching the length of an expected hex digest.
    pub fn for_checksum(expected: &str) -> Self {
        if expected.trim().len() == 64 {
            Self::Sha256
        } else {
            Self::Sha1
        }
    }
}

/// Computes lowercase hex digests of local files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumVerifier {
    algorithm: DigestAlgorithm,
}

impl ChecksumVerifier {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest the file at `path`, or `None` if it cannot be read.
    pub fn digest_file(&self, path: &Path) -> Option<String> {
        if path.as_os_str().is_empty() || !path.is_file() {
            return None;
        }

        let result = match self.algorithm {
            DigestAlgorithm::Sha1 => hash_file::<Sha1>(path),
            DigestAlgorithm::Sha256 => hash_file::<Sha256>(path),
        };

        match result {
            Ok(digest) if !digest.is_empty() => Some(digest),
            Ok(_) => None,
            Err(err) => {
                tracing::debug!(path = %path.display(), "failed to hash file: {err}");
                None
            }
        }
    }

    /// Whether the file at `path` hashes to `expected` (case-insensitive).
    pub fn matches(&self, path: &Path, expected: &str) -> bool {
        self.digest_file(path)
            .is_some_and(|actual| actual.eq_ignore_ascii_case(expected.trim()))
    }
}

fn hash_file<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn sha1_of_known_content() {
        let file = file_with(b"hello world");
        let digest = ChecksumVerifier::default().digest_file(file.path());
        assert_eq!(
            digest.as_deref(),
            Some("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed")
        );
    }

    #[test]
    fn sha256_of_known_content() {
        let file = file_with(b"hello world");
        let digest = ChecksumVerifier::new(DigestAlgorithm::Sha256).digest_file(file.path());
        assert_eq!(
            digest.as_deref(),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
    }

    #[test]
    fn digests_are_deterministic_and_distinct() {
        let verifier = ChecksumVerifier::default();
        let first = file_with(b"package one");
        let second = file_with(b"package two");

        let a = verifier.digest_file(first.path()).unwrap();
        let b = verifier.digest_file(first.path()).unwrap();
        let c = verifier.digest_file(second.path()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, a.to_lowercase());
    }

    #[test]
    fn missing_or_empty_paths_have_no_digest() {
        let verifier = ChecksumVerifier::default();
        assert!(verifier.digest_file(Path::new("")).is_none());
        assert!(verifier
            .digest_file(Path::new("/definitely/not/here/package.exe"))
            .is_none());

        let dir = tempfile::tempdir().unwrap();
        assert!(verifier.digest_file(dir.path()).is_none());
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        let file = file_with(b"hello world");
        let verifier = ChecksumVerifier::default();
        assert!(verifier.matches(file.path(), " 2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED\n"));
        assert!(!verifier.matches(file.path(), "0000"));
    }

    #[test]
    fn algorithm_follows_expected_length() {
        assert_eq!(
            DigestAlgorithm::for_checksum("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"),
            DigestAlgorithm::Sha1
        );
        assert_eq!(
            DigestAlgorithm::for_checksum(
                "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
            ),
            DigestAlgorithm::Sha256
        );
    }
}
