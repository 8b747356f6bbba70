//! Settings loaded from TOML.
//!
//! Reads `pri/config.toml` and then `pri/config.dev.toml`; keys in the later
//! file replace the earlier ones.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph_api::DEFAULT_GRAPH_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "pri/config.toml";
pub const DEV_CONFIG_PATH: &str = "pri/config.dev.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub client_id: String,
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_scopes", deserialize_with = "deserialize_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_authority_host")]
    pub authority_host: String,
    #[serde(default = "default_device_code_timeout_secs")]
    pub device_code_timeout_secs: u64,
    #[serde(default)]
    pub load_cached_token: bool,
}

fn default_tenant_id() -> String {
    "common".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "User.Read".to_string(),
        "Mail.Read".to_string(),
        "Mail.Send".to_string(),
    ]
}

fn default_token_file() -> PathBuf {
    PathBuf::from("pri/tokens.json")
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_device_code_timeout_secs() -> u64 {
    900
}

// Scopes may be a list or one space-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeList {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let scopes = match ScopeList::deserialize(deserializer)? {
        ScopeList::Joined(joined) => joined.split_whitespace().map(str::to_string).collect(),
        ScopeList::List(list) => list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };
    Ok(scopes)
}

impl Settings {
    /// Loads the default base file plus the developer overlay.
    pub fn load_default(base: Option<&Path>) -> Result<Self> {
        let base = base.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Self::load_layered(&[base, Path::new(DEV_CONFIG_PATH)])
    }

    /// Merges the top-level keys of every existing file, later files winning.
    pub fn load_layered<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged = toml::Table::new();
        let mut found = false;

        for path in paths {
            let path = path.as_ref();
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::Config(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
            };
            let table: toml::Table = content.parse().map_err(|e: toml::de::Error| {
                Error::Config(format!("{}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), keys = table.len(), "loaded settings layer");
            merged.extend(table);
            found = true;
        }

        if !found {
            let tried: Vec<String> = paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect();
            return Err(Error::Config(format!(
                "no settings file found (tried {})",
                tried.join(", ")
            )));
        }

        Self::from_table(merged)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        Self::from_table(table)
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        let settings: Settings = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("client_id must not be empty".to_string()));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(Error::Config("tenant_id must not be empty".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("at least one scope is required".to_string()));
        }
        Ok(())
    }

    pub fn device_code_timeout(&self) -> Duration {
        Duration::from_secs(self.device_code_timeout_secs)
    }
}
