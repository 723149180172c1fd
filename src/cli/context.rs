//! Shared setup for commands: config, store, collaborators and the clock.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::events::{EventDestination, EventSink};
use crate::mailer::{self, Notifier};
use crate::output::OutputOptions;
use crate::pipeline::Pipeline;
use crate::secrets::{self, Recipients};
use crate::storage::FsObjectStore;

/// Flags every command accepts
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
    pub events: Option<String>,
    pub now: Option<String>,
}

impl GlobalOptions {
    pub fn events_to_stdout(&self) -> bool {
        matches!(
            EventDestination::parse(self.events.as_deref()),
            Some(EventDestination::Stdout)
        )
    }

    /// Output options; events on stdout take over stdout entirely.
    pub fn output(&self) -> OutputOptions {
        let events_to_stdout = self.events_to_stdout();
        OutputOptions {
            json: self.json && !events_to_stdout,
            quiet: self.quiet || events_to_stdout,
        }
    }

    pub fn now(&self) -> Result<DateTime<Utc>> {
        match self.now.as_deref() {
            None => Ok(Utc::now()),
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|err| Error::InvalidArgument(format!("--now '{raw}': {err}"))),
        }
    }

    pub fn open_events(&self) -> Result<Option<EventSink>> {
        EventDestination::parse(self.events.as_deref())
            .as_ref()
            .map(|dest| dest.open())
            .transpose()
    }

    /// Config file path and the directory relative paths resolve against
    pub fn config_location(&self) -> Result<(PathBuf, PathBuf)> {
        match &self.config {
            Some(path) => {
                let base = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok((path.clone(), base))
            }
            None => {
                let cwd = std::env::current_dir()?;
                Ok((cwd.join(CONFIG_FILE), cwd))
            }
        }
    }

    pub fn load_config(&self) -> Result<(Config, PathBuf)> {
        let (path, base) = self.config_location()?;
        let config = match &self.config {
            Some(_) if !path.is_file() => {
                return Err(Error::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            Some(_) => Config::load(&path)?,
            None => Config::load_from_dir(&base)?,
        };
        Ok((config, base))
    }
}

/// Loaded config plus the opened store
pub struct Workspace {
    pub config: Config,
    pub base_dir: PathBuf,
    pub store: FsObjectStore,
}

impl Workspace {
    pub fn open(global: &GlobalOptions) -> Result<Self> {
        let (config, base_dir) = global.load_config()?;
        let store = FsObjectStore::open(base_dir.join(&config.store.root), config.store.bucket.clone())?;
        tracing::debug!(root = %store.root().display(), "store opened");
        Ok(Self {
            config,
            base_dir,
            store,
        })
    }

    /// Resolve recipients and open the notifier. Secrets are read once here.
    pub fn services(&self) -> Result<Services> {
        let secret_store = secrets::open(&self.config.secrets, &self.base_dir)?;
        let recipients =
            Recipients::resolve(secret_store.as_ref(), &self.config.secrets, &self.config.owners.tags)?;
        let notifier = mailer::open(&self.config.notify, secret_store.as_ref(), &self.base_dir)?;
        Ok(Services {
            recipients,
            notifier,
        })
    }

    pub fn pipeline<'a>(&'a self, services: &'a Services) -> Pipeline<'a> {
        Pipeline::new(
            &self.store,
            services.notifier.as_ref(),
            &services.recipients,
            &self.config.owners.tags,
            &self.config.store.inbox_prefix,
        )
    }

    /// Directory inbound sheets land in
    pub fn inbox_dir(&self) -> PathBuf {
        self.store
            .root()
            .join(self.config.store.inbox_prefix.trim_end_matches('/'))
    }
}

pub struct Services {
    pub recipients: Recipients,
    pub notifier: Box<dyn Notifier>,
}
