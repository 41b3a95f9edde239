use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the metadata document, both in the install root and at the top of
/// the companion repository.
pub const CONFIG_FILE: &str = "config.json";

/// Keys a metadata document must carry to drive an update decision.
pub const REQUIRED_FIELDS: &[&str] = &["version", "app_file", "github_url"];

/// A version value from a metadata document.
///
/// Well-formed documents carry an integer, but a stringly-typed document must
/// not be silently treated as equal — [`Version::as_number`] surfaces a
/// non-numeric string as a fatal error instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Version {
    Number(i64),
    Text(String),
}

impl Version {
    pub fn as_number(&self) -> Result<i64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::InvalidVersion(s.clone())),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// The metadata document describing one installation of the companion
/// application. The same shape is read locally from the install root and
/// remotely from the companion repository; only provenance differs.
///
/// Unknown keys are ignored on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstallConfig {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub app_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub github_url: Option<String>,
}

impl InstallConfig {
    /// Read `config.json` from `dir`.
    ///
    /// Fails soft: a missing file, a permission error, or malformed JSON all
    /// yield `None`. Callers treat those identically to "no metadata".
    pub fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Write the document to `<dir>/config.json`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Io(e.into()))?;
        std::fs::write(dir.join(CONFIG_FILE), content)?;
        Ok(())
    }

    /// True when no field is set at all.
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.app_file.is_none() && self.github_url.is_none()
    }

    /// Whether every field named in `required` is present.
    ///
    /// An empty config never satisfies any requirement set, while an empty
    /// `required` list is vacuously satisfied by any non-empty config. The
    /// two cases are distinct: "nothing to check" is not "nothing present".
    pub fn is_complete(&self, required: &[&str]) -> bool {
        if self.is_empty() {
            return false;
        }
        required.iter().all(|field| self.has_field(field))
    }

    fn has_field(&self, field: &str) -> bool {
        match field {
            "version" => self.version.is_some(),
            "app_file" => self.app_file.is_some(),
            "github_url" => self.github_url.is_some(),
            _ => false,
        }
    }

    /// Project the named fields into `<prefix><field>` keys, skipping any
    /// field absent from this config. Used to display local and remote
    /// metadata side by side under distinct names.
    pub fn assign_fields(&self, fields: &[&str], prefix: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for &field in fields {
            let value = match field {
                "version" => self.version.as_ref().map(Version::to_string),
                "app_file" => self.app_file.clone(),
                "github_url" => self.github_url.clone(),
                _ => None,
            };
            if let Some(value) = value {
                out.insert(format!("{prefix}{field}"), value);
            }
        }
        out
    }
}
