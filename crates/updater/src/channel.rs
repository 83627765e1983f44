use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release track followed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Public releases.
    #[default]
    Public,
    /// Pre-release builds for subscribers.
    Beta,
}

impl Channel {
    /// Numeric identifier used by the download API and the server settings.
    pub fn id(&self) -> u32 {
        match self {
            Self::Public => 0,
            Self::Beta => 8,
        }
    }

    /// Map a numeric identifier back to a channel; unknown ids are public.
    pub fn from_id(id: u32) -> Self {
        match id {
            8 => Self::Beta,
            _ => Self::Public,
        }
    }

    /// Parse a setting value, accepting either the numeric id or the name.
    pub fn from_setting(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<u32>() {
            Ok(id) => Self::from_id(id),
            Err(_) if value.eq_ignore_ascii_case("beta") => Self::Beta,
            Err(_) => Self::Public,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Beta => "beta",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    /// Strict parse for user input; unlike [`Channel::from_setting`] unknown
    /// values are rejected.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" | "0" => Ok(Self::Public),
            "beta" | "8" => Ok(Self::Beta),
            other => Err(format!("unknown update channel `{other}`")),
        }
    }
}
