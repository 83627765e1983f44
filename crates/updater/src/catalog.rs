//! Remote release manifest: fetching and the platform tree.
//!
//! The manifest nests platform types (`computer`, `nas`, ...) down to a
//! platform object that lists its releases:
//!
//! ```json
//! {
//!   "computer": {
//!     "Windows": {
//!       "id": "windows",
//!       "version": "1.32.5.7349-8f4248874",
//!       "releases": [
//!         { "label": "Windows 64-bit", "build": "windows-x86_64", "distro": "windows",
//!           "url": "https://.../PlexMediaServer-1.32.5.7349-8f4248874-x86_64.exe",
//!           "checksum": "6b1c..." }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! A platform object may instead carry channel-keyed release arrays
//! (`"public": [...]`, `"beta": [...]` or the numeric channel ids). The tree is
//! read by an explicit walk over [`serde_json::Value`] so unexpected shapes
//! degrade to empty nodes instead of failing the whole document.

use crate::{
    channel::Channel,
    error::{Result, UpdaterError},
    fetcher::{parse_url, HttpFetcher},
    version::Version,
};
use indexmap::IndexMap;
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};

/// Header carrying the account token on manifest requests.
pub const TOKEN_HEADER: &str = "X-Plex-Token";

const RELEASES_KEY: &str = "releases";

/// One downloadable artifact listed in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseCatalogEntry {
    pub label: String,
    /// Build identifier, e.g. `windows-x86_64`.
    pub build: String,
    pub distro: String,
    pub url: String,
    /// Hex digest of the artifact.
    pub checksum: String,
}

impl ReleaseCatalogEntry {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            label: string_field(map, "label"),
            build: string_field(map, "build"),
            distro: string_field(map, "distro"),
            url: string_field(map, "url"),
            checksum: string_field(map, "checksum"),
        }
    }

    /// Final path segment of the download URL.
    pub fn file_name(&self) -> Option<&str> {
        let path = self.url.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        path.rsplit('/').next().filter(|name| !name.is_empty())
    }
}

/// Release information for a single platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformRelease {
    pub id: String,
    pub name: String,
    pub release_date: String,
    /// Version string declared for the platform's current releases.
    pub version: String,
    pub requirements: String,
    pub extra_info: String,
    pub items_added: String,
    pub items_fixed: String,
    pub releases: Vec<ReleaseCatalogEntry>,
    /// Release lists keyed by channel name or id.
    pub channels: IndexMap<String, Vec<ReleaseCatalogEntry>>,
}

impl PlatformRelease {
    fn from_map(map: &Map<String, Value>) -> Self {
        let mut channels = IndexMap::new();
        for (key, value) in map {
            if key != RELEASES_KEY && is_release_array(value) {
                channels.insert(key.clone(), entries(value));
            }
        }

        Self {
            id: string_field(map, "id"),
            name: string_field(map, "name"),
            release_date: string_field(map, "release_date"),
            version: string_field(map, "version"),
            requirements: string_field(map, "requirements"),
            extra_info: string_field(map, "extra_info"),
            items_added: string_field(map, "items_added"),
            items_fixed: string_field(map, "items_fixed"),
            releases: map.get(RELEASES_KEY).map(entries).unwrap_or_default(),
            channels,
        }
    }

    /// Version declared by the platform object, or unknown.
    pub fn declared_version(&self) -> Version {
        Version::parse_release(&self.version)
    }

    /// Releases published for `channel`.
    ///
    /// Uses the channel-keyed list when present, otherwise the plain
    /// `releases` list (the manifest was already requested for the channel).
    pub fn releases_for(&self, channel: Channel) -> &[ReleaseCatalogEntry] {
        self.channels
            .get(channel.as_str())
            .or_else(|| self.channels.get(&channel.id().to_string()))
            .unwrap_or(&self.releases)
    }
}

/// Recursive platform tree of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformNode {
    /// Intermediate grouping such as `computer` or `nas`.
    Branch(IndexMap<String, PlatformNode>),
    /// A platform with its releases.
    Platform(PlatformRelease),
}

impl PlatformNode {
    fn from_map(map: &Map<String, Value>) -> Self {
        if map.get(RELEASES_KEY).is_some_and(Value::is_array)
            || map.values().any(is_release_array)
        {
            return PlatformNode::Platform(PlatformRelease::from_map(map));
        }

        let children = map
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_object()
                    .map(|child| (key.clone(), PlatformNode::from_map(child)))
            })
            .collect();
        PlatformNode::Branch(children)
    }

    /// Walk `path` from this node. Keys match exactly first, then ignoring
    /// ASCII case.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&PlatformNode> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };

        let PlatformNode::Branch(children) = self else {
            return None;
        };

        let head = head.as_ref();
        let child = children.get(head).or_else(|| {
            children
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(head))
                .map(|(_, node)| node)
        })?;
        child.lookup(rest)
    }

    pub fn as_platform(&self) -> Option<&PlatformRelease> {
        match self {
            PlatformNode::Platform(platform) => Some(platform),
            PlatformNode::Branch(_) => None,
        }
    }
}

/// A parsed release manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCatalog {
    root: PlatformNode,
}

impl ReleaseCatalog {
    /// Parse a manifest document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| UpdaterError::catalog(format!("malformed manifest: {err}")))?;
        let map = value
            .as_object()
            .ok_or_else(|| UpdaterError::catalog("manifest root is not an object"))?;

        Ok(Self {
            root: PlatformNode::from_map(map),
        })
    }

    pub fn root(&self) -> &PlatformNode {
        &self.root
    }

    /// The platform object at `path`, if the manifest has one.
    pub fn platform<S: AsRef<str>>(&self, path: &[S]) -> Option<&PlatformRelease> {
        self.root.lookup(path)?.as_platform()
    }
}

/// A release selected as a prospective update target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub entry: ReleaseCatalogEntry,
    pub version: Version,
}

impl Candidate {
    /// Pair an entry with the version the catalog declares for it.
    ///
    /// The platform's `declared` version wins; the version embedded in the
    /// download file name is used only when nothing is declared. The staged
    /// package is later checked against this version.
    pub fn from_entry(entry: &ReleaseCatalogEntry, declared: Version) -> Self {
        let version = if declared.is_unknown() {
            entry
                .file_name()
                .map(Version::parse_file_name)
                .unwrap_or(Version::UNKNOWN)
        } else {
            declared
        };

        Self {
            entry: entry.clone(),
            version,
        }
    }
}

/// Client for the remote release manifest.
pub struct ReleaseCatalogClient<F> {
    fetcher: F,
    url: Url,
}

impl<F> ReleaseCatalogClient<F>
where
    F: HttpFetcher,
{
    pub fn new(fetcher: F, url: Url) -> Self {
        Self { fetcher, url }
    }

    /// Create a client for the manifest at `url`.
    pub fn with_url(fetcher: F, url: &str) -> Result<Self> {
        Ok(Self::new(fetcher, parse_url(url)?))
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Whether `url` shares the manifest endpoint's origin. The account
    /// token is only ever sent there.
    pub fn same_origin(&self, url: &Url) -> bool {
        self.url.origin() == url.origin()
    }

    /// URL requested for `channel`.
    pub fn manifest_url(&self, channel: Channel) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("channel", &channel.id().to_string());
        url
    }

    /// Fetch and parse the manifest. Every call goes to the network.
    pub async fn fetch(&self, channel: Channel, token: Option<&str>) -> Result<ReleaseCatalog> {
        let url = self.manifest_url(channel);
        let headers: Vec<(&str, &str)> = token
            .filter(|token| !token.is_empty())
            .map(|token| vec![(TOKEN_HEADER, token)])
            .unwrap_or_default();

        tracing::debug!(%url, "fetching release manifest");
        let bytes = self
            .fetcher
            .fetch_bytes(&url, &headers)
            .await
            .map_err(|err| UpdaterError::catalog(err.to_string()))?;
        ReleaseCatalog::from_slice(&bytes)
    }
}

fn is_release_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| items.iter().any(Value::is_object))
}

fn entries(value: &Value) -> Vec<ReleaseCatalogEntry> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(ReleaseCatalogEntry::from_map)
                .collect()
        })
        .unwrap_or_default()
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        Some(Value::Bool(value)) => value.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Mutex;

    fn manifest() -> Value {
        json!({
            "computer": {
                "Windows": {
                    "id": "windows",
                    "name": "Windows",
                    "version": "1.2.3.5-abcdef",
                    "release_date": 1700000000,
                    "releases": [
                        {
                            "label": "Windows 32-bit",
                            "build": "windows-x86",
                            "distro": "windows",
                            "url": "https://downloads.example/PlexMediaServer-1.2.3.5-abcdef-x86.exe",
                            "checksum": "aaaa"
                        },
                        { "label": "Windows 64-bit", "build": "windows-x86_64" }
                    ]
                },
                "Linux": {
                    "version": "1.2.3.6",
                    "public": [
                        { "build": "linux-x86_64", "distro": "debian", "url": "https://downloads.example/plexmediaserver_1.2.3.6_amd64.deb" }
                    ],
                    "beta": [
                        { "build": "linux-x86_64", "distro": "debian", "url": "https://downloads.example/plexmediaserver_1.2.4.0_amd64.deb" }
                    ]
                }
            },
            "nas": {
                "Synology": { "releases": [] },
                "note": "ignored"
            }
        })
    }

    fn catalog() -> ReleaseCatalog {
        ReleaseCatalog::from_slice(manifest().to_string().as_bytes()).unwrap()
    }

    #[test]
    fn walks_nested_platforms() {
        let catalog = catalog();
        let windows = catalog.platform(&["computer", "Windows"]).unwrap();
        assert_eq!(windows.id, "windows");
        assert_eq!(windows.release_date, "1700000000");
        assert_eq!(windows.declared_version(), Version::new(1, 2, 3, 5));
        assert_eq!(windows.releases.len(), 2);

        let sparse = &windows.releases[1];
        assert_eq!(sparse.label, "Windows 64-bit");
        assert_eq!(sparse.url, "");
        assert_eq!(sparse.checksum, "");

        assert!(catalog.platform(&["computer", "windows"]).is_some());
        assert!(catalog.platform(&["computer"]).is_none());
        assert!(catalog.platform(&["computer", "MacOS"]).is_none());
    }

    #[test]
    fn empty_release_lists_are_kept() {
        let catalog = catalog();
        let synology = catalog.platform(&["nas", "Synology"]).unwrap();
        assert!(synology.releases_for(Channel::Public).is_empty());
    }

    #[test]
    fn channel_keyed_lists_take_precedence() {
        let catalog = catalog();
        let linux = catalog.platform(&["computer", "Linux"]).unwrap();
        assert!(linux.releases.is_empty());
        assert!(linux.releases_for(Channel::Public)[0].url.contains("1.2.3.6"));
        assert!(linux.releases_for(Channel::Beta)[0].url.contains("1.2.4.0"));
    }

    #[test]
    fn malformed_documents_are_unavailable() {
        assert!(matches!(
            ReleaseCatalog::from_slice(b"not json"),
            Err(UpdaterError::CatalogUnavailable(_))
        ));
        assert!(matches!(
            ReleaseCatalog::from_slice(b"[]"),
            Err(UpdaterError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn candidate_version_prefers_declared_version() {
        let entry = ReleaseCatalogEntry {
            url: "https://downloads.example/1.2.3.5/PlexMediaServer-1.2.3.5-x86.exe?x=1".into(),
            ..Default::default()
        };
        assert_eq!(entry.file_name(), Some("PlexMediaServer-1.2.3.5-x86.exe"));
        let candidate = Candidate::from_entry(&entry, Version::new(1, 2, 3, 6));
        assert_eq!(candidate.version, Version::new(1, 2, 3, 6));

        let undeclared = Candidate::from_entry(&entry, Version::UNKNOWN);
        assert_eq!(undeclared.version, Version::new(1, 2, 3, 5));

        let bare = ReleaseCatalogEntry {
            url: "https://downloads.example/latest".into(),
            ..Default::default()
        };
        assert!(Candidate::from_entry(&bare, Version::UNKNOWN).version.is_unknown());
    }

    struct RecordingFetcher {
        body: Option<Bytes>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait::async_trait]
    impl HttpFetcher for RecordingFetcher {
        async fn fetch_bytes(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Bytes> {
            self.requests.lock().unwrap().push((
                url.to_string(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            self.body
                .clone()
                .ok_or_else(|| UpdaterError::Other("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn fetch_sends_channel_and_token() {
        let fetcher = RecordingFetcher {
            body: Some(Bytes::from(manifest().to_string())),
            requests: Mutex::new(Vec::new()),
        };
        let client = ReleaseCatalogClient::new(
            fetcher,
            Url::parse("https://plex.example/api/downloads/5.json").unwrap(),
        );

        let catalog = client.fetch(Channel::Beta, Some("tok")).await.unwrap();
        assert!(catalog.platform(&["computer", "Linux"]).is_some());

        let requests = client.fetcher().requests.lock().unwrap();
        assert_eq!(
            requests[0].0,
            "https://plex.example/api/downloads/5.json?channel=8"
        );
        assert_eq!(
            requests[0].1,
            vec![(TOKEN_HEADER.to_string(), "tok".to_string())]
        );
    }

    #[test]
    fn origin_comparison_covers_scheme_host_and_port() {
        let client = ReleaseCatalogClient::with_url(
            RecordingFetcher {
                body: None,
                requests: Mutex::new(Vec::new()),
            },
            "https://plex.example/api/downloads/5.json",
        )
        .unwrap();

        let same = Url::parse("https://plex.example/files/pms.exe").unwrap();
        let other_host = Url::parse("https://downloads.example/files/pms.exe").unwrap();
        let other_port = Url::parse("https://plex.example:8443/files/pms.exe").unwrap();
        let plain_http = Url::parse("http://plex.example/files/pms.exe").unwrap();
        assert!(client.same_origin(&same));
        assert!(!client.same_origin(&other_host));
        assert!(!client.same_origin(&other_port));
        assert!(!client.same_origin(&plain_http));
    }

    #[tokio::test]
    async fn network_failure_is_catalog_unavailable() {
        let fetcher = RecordingFetcher {
            body: None,
            requests: Mutex::new(Vec::new()),
        };
        let client = ReleaseCatalogClient::new(
            fetcher,
            Url::parse("https://plex.example/api/downloads/5.json").unwrap(),
        );

        let err = client.fetch(Channel::Public, None).await.unwrap_err();
        assert!(matches!(err, UpdaterError::CatalogUnavailable(_)));
        assert!(client.fetcher().requests.lock().unwrap()[0].1.is_empty());
    }
}
