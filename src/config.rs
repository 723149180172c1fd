//! Configuration loading and management
//!
//! Handles parsing of `.actweek.toml` configuration files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = ".actweek.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Object store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Owner tags
    #[serde(default)]
    pub owners: OwnersConfig,

    /// Secret lookup configuration
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Notification delivery configuration
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding bucket directories
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Bucket name
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Key prefix where inbound snapshots arrive
    #[serde(default = "default_inbox_prefix")]
    pub inbox_prefix: String,
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".actweek/store")
}

fn default_bucket() -> String {
    "actions".to_string()
}

fn default_inbox_prefix() -> String {
    "inbox/".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            bucket: default_bucket(),
            inbox_prefix: default_inbox_prefix(),
        }
    }
}

/// Owner tag configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnersConfig {
    /// Recognized owner tags, matched as case-insensitive substrings.
    /// Earlier tags win when an owner matches several.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

fn default_tags() -> Vec<String> {
    vec!["ele".to_string(), "merc".to_string()]
}

impl Default for OwnersConfig {
    fn default() -> Self {
        Self {
            tags: default_tags(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretsBackend {
    Env,
    File,
}

/// Secret lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secrets_backend")]
    pub backend: SecretsBackend,

    /// Environment variable prefix (env backend)
    #[serde(default = "default_secrets_prefix")]
    pub prefix: String,

    /// Secrets file (file backend)
    #[serde(default = "default_secrets_file")]
    pub file: PathBuf,

    /// Secret holding the sender identity
    #[serde(default = "default_sender_secret")]
    pub sender: String,

    /// Owner tag -> secret holding that owner's contact address
    #[serde(default = "default_contact_secrets")]
    pub contacts: BTreeMap<String, String>,
}

fn default_secrets_backend() -> SecretsBackend {
    SecretsBackend::Env
}

fn default_secrets_prefix() -> String {
    "ACTWEEK_".to_string()
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from(".actweek/secrets.toml")
}

fn default_sender_secret() -> String {
    "sender".to_string()
}

fn default_contact_secrets() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ele".to_string(), "ele_email".to_string()),
        ("merc".to_string(), "merc_email".to_string()),
    ])
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: default_secrets_backend(),
            prefix: default_secrets_prefix(),
            file: default_secrets_file(),
            sender: default_sender_secret(),
            contacts: default_contact_secrets(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    Outbox,
    Http,
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_backend")]
    pub backend: NotifyBackend,

    /// JSONL file receiving messages (outbox backend)
    #[serde(default = "default_outbox")]
    pub outbox: PathBuf,

    /// Mail API endpoint (http backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Secret holding the mail API bearer token (http backend)
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Request timeout in seconds (http backend)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_notify_backend() -> NotifyBackend {
    NotifyBackend::Outbox
}

fn default_outbox() -> PathBuf {
    PathBuf::from(".actweek/outbox.jsonl")
}

fn default_token_secret() -> String {
    "mail_token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            outbox: default_outbox(),
            endpoint: None,
            token_secret: default_token_secret(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.actweek.toml` from `dir`, or return defaults when absent
    pub fn load_from_dir(dir: &Path) -> crate::error::Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.store.validate()?;
        self.validate_owners()?;
        self.notify.validate()?;
        Ok(())
    }

    fn validate_owners(&self) -> crate::error::Result<()> {
        if self.owners.tags.is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "owners.tags cannot be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for tag in &self.owners.tags {
            if tag.is_empty() || tag.trim() != tag {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "owners.tags entry '{tag}' must be non-empty without surrounding whitespace"
                )));
            }
            if !tag
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
            {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "owners.tags entry '{tag}' must be alphanumeric (plus - and _)"
                )));
            }
            if !seen.insert(tag.to_lowercase()) {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "owners.tags has duplicate entry '{tag}'"
                )));
            }
            if !self.secrets.contacts.contains_key(tag) {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "secrets.contacts has no entry for owner '{tag}'"
                )));
            }
        }

        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> crate::error::Result<()> {
        crate::storage::validate_key(&self.bucket).map_err(|_| {
            crate::error::Error::InvalidConfig(format!("store.bucket '{}' is not a valid name", self.bucket))
        })?;
        if self.bucket.contains('/') {
            return Err(crate::error::Error::InvalidConfig(
                "store.bucket cannot contain '/'".to_string(),
            ));
        }
        if self.inbox_prefix.trim().is_empty() || !self.inbox_prefix.ends_with('/') {
            return Err(crate::error::Error::InvalidConfig(
                "store.inbox_prefix must be a non-empty prefix ending in '/'".to_string(),
            ));
        }
        Ok(())
    }
}

impl NotifyConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.backend == NotifyBackend::Http {
            let endpoint = self.endpoint.as_deref().unwrap_or("").trim();
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(crate::error::Error::InvalidConfig(
                    "notify.endpoint must be an http(s) URL when notify.backend = \"http\"".to_string(),
                ));
            }
        }
        if self.timeout_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "notify.timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
