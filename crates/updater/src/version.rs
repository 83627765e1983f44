//! Four-part release versions and the package file name parser.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Pattern for package file names such as `PlexMediaServer-1.32.5.7349-x86.exe`.
const FILE_NAME_PATTERN: &str =
    r"^\S+?(?P<major>\d+)\.(?P<minor>\d+)\.(?P<build>\d+)\.(?P<revision>\d+)\S+$";

fn file_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(FILE_NAME_PATTERN).expect("package file name pattern"))
}

/// A `major.minor.build.revision` version.
///
/// Ordering is lexicographic by component. The default value `0.0.0.0`
/// stands for an unknown version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl Version {
    /// The unknown version.
    pub const UNKNOWN: Version = Version::new(0, 0, 0, 0);

    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Whether this is the unknown version.
    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }

    /// Parse the version embedded in a package file name.
    ///
    /// Returns [`Version::UNKNOWN`] when the name does not match the package
    /// naming pattern or a component does not fit in a `u32`.
    pub fn parse_file_name(file_name: &str) -> Version {
        let Some(captures) = file_name_regex().captures(file_name) else {
            tracing::debug!(file_name, "file name does not carry a version");
            return Version::UNKNOWN;
        };

        let component = |name: &str| captures.name(name)?.as_str().parse::<u32>().ok();
        match (
            component("major"),
            component("minor"),
            component("build"),
            component("revision"),
        ) {
            (Some(major), Some(minor), Some(build), Some(revision)) => {
                Version::new(major, minor, build, revision)
            }
            _ => {
                tracing::debug!(file_name, "version component out of range");
                Version::UNKNOWN
            }
        }
    }

    /// Parse the version from the final component of `path`.
    pub fn parse_path(path: &Path) -> Version {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(Version::parse_file_name)
            .unwrap_or(Version::UNKNOWN)
    }

    /// Leniently parse a version string as published in release manifests or
    /// printed by the server, e.g. `1.32.5.7349-8f4248874` or `v1.32.5.7349`.
    ///
    /// Anything after the fourth numeric component is ignored. Returns
    /// [`Version::UNKNOWN`] if fewer than four components are present.
    pub fn parse_release(text: &str) -> Version {
        let text = text.trim();
        let text = text.strip_prefix(|c: char| c == 'v' || c == 'V').unwrap_or(text);
        let numeric = text
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or_default();

        let mut parts = numeric.split('.').map(|part| part.parse::<u32>().ok());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Some(major)), Some(Some(minor)), Some(Some(build)), Some(Some(revision))) => {
                Version::new(major, minor, build, revision)
            }
            _ => Version::UNKNOWN,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_file_names() {
        let cases = [
            ("PlexMediaServer-1.32.5.7349-8f4248874-x86.exe", Version::new(1, 32, 5, 7349)),
            ("PlexMediaServer-12.0.1.2-x64.exe", Version::new(12, 0, 1, 2)),
            ("plexmediaserver_1.40.0.7998-c29d4c0c8_amd64.deb", Version::new(1, 40, 0, 7998)),
            ("PMS2-3.4.5.6.msi", Version::new(3, 4, 5, 6)),
        ];

        for (name, expected) in cases {
            assert_eq!(Version::parse_file_name(name), expected, "{name}");
        }
    }

    #[test]
    fn formatted_versions_parse_back() {
        for version in [
            Version::new(0, 0, 0, 1),
            Version::new(1, 2, 3, 4),
            Version::new(1, 32, 5, 7349),
            Version::new(4294967295, 10, 200, 3000),
        ] {
            let name = format!("PlexMediaServer-{version}-x86.exe");
            assert_eq!(Version::parse_file_name(&name), version);
        }
    }

    #[test]
    fn rejects_names_without_a_full_version() {
        for name in [
            "",
            "PlexMediaServer.exe",
            "PlexMediaServer-1.2.3-x86.exe",
            "PlexMediaServer-1.2.x.4-x86.exe",
            "1.2.3.4",
            "Plex Media Server-1.2.3.4-x86.exe",
            "PlexMediaServer-1.2.3.99999999999-x86.exe",
        ] {
            assert_eq!(Version::parse_file_name(name), Version::UNKNOWN, "{name:?}");
        }
    }

    #[test]
    fn parses_release_strings() {
        assert_eq!(
            Version::parse_release("1.32.5.7349-8f4248874"),
            Version::new(1, 32, 5, 7349)
        );
        assert_eq!(
            Version::parse_release("v1.40.0.7998-c29d4c0c8\n"),
            Version::new(1, 40, 0, 7998)
        );
        assert_eq!(Version::parse_release("1.2.3"), Version::UNKNOWN);
        assert_eq!(Version::parse_release(""), Version::UNKNOWN);
    }

    #[test]
    fn ordering_is_component_wise() {
        assert!(Version::new(1, 2, 3, 5) > Version::new(1, 2, 3, 4));
        assert!(Version::new(1, 10, 0, 0) > Version::new(1, 9, 99, 99));
        assert!(Version::UNKNOWN.is_unknown());
        assert_eq!(Version::default(), Version::UNKNOWN);
        assert_eq!(Version::new(1, 2, 3, 4).to_string(), "1.2.3.4");
    }
}
