//! Secret resolution.
//!
//! Sender identity and owner contacts are looked up once, before any
//! processing, and handed to the pipeline as a [`Recipients`] value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{SecretsBackend, SecretsConfig};
use crate::error::{Error, Result};

/// Named secret lookup
pub trait SecretStore {
    fn get(&self, name: &str) -> Result<String>;
}

/// Secrets from environment variables: `{prefix}{NAME}` upper-cased, with
/// `-` and `.` mapped to `_`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecrets {
    prefix: String,
}

impl EnvSecrets {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
            .to_uppercase()
            .replace(['-', '.'], "_")
    }
}

impl SecretStore for EnvSecrets {
    fn get(&self, name: &str) -> Result<String> {
        let var = self.var_name(name);
        match std::env::var(&var) {
            Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(Error::SecretNotFound(format!("{name} (env {var})"))),
        }
    }
}

/// Secrets from a flat TOML table of string values.
#[derive(Debug, Clone)]
pub struct FileSecrets {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileSecrets {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::SecretNotFound(format!("cannot read {}: {err}", path.display()))
        })?;
        let values: BTreeMap<String, String> = toml::from_str(&content)?;
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }
}

impl SecretStore for FileSecrets {
    fn get(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::SecretNotFound(format!("{name} (in {})", self.path.display())))
    }
}

/// Open the configured secret backend. Relative file paths resolve against
/// `base_dir`.
pub fn open(config: &SecretsConfig, base_dir: &Path) -> Result<Box<dyn SecretStore>> {
    match config.backend {
        SecretsBackend::Env => Ok(Box::new(EnvSecrets::new(config.prefix.clone()))),
        SecretsBackend::File => Ok(Box::new(FileSecrets::load(&base_dir.join(&config.file))?)),
    }
}

/// Who mail comes from and where each owner's report goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients {
    pub sender: String,
    contacts: BTreeMap<String, String>,
}

impl Recipients {
    pub fn new(sender: impl Into<String>, contacts: BTreeMap<String, String>) -> Self {
        Self {
            sender: sender.into(),
            contacts,
        }
    }

    /// Resolve the sender and one contact per owner tag.
    pub fn resolve(store: &dyn SecretStore, config: &SecretsConfig, tags: &[String]) -> Result<Self> {
        let sender = store.get(&config.sender)?;
        let mut contacts = BTreeMap::new();
        for tag in tags {
            let secret = config.contacts.get(tag).ok_or_else(|| {
                Error::InvalidConfig(format!("secrets.contacts has no entry for owner '{tag}'"))
            })?;
            contacts.insert(tag.clone(), store.get(secret)?);
        }
        tracing::debug!(owners = contacts.len(), "recipients resolved");
        Ok(Self { sender, contacts })
    }

    pub fn contact(&self, owner: &str) -> Option<&str> {
        self.contacts.get(owner).map(String::as_str)
    }
}
