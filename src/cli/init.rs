//! actweek init command implementation
//!
//! Writes a default `.actweek.toml` and creates the store and inbox
//! directories it points at.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

use super::context::GlobalOptions;

pub struct InitOptions {
    pub force: bool,
    pub global: GlobalOptions,
}

#[derive(serde::Serialize)]
struct InitReport {
    config: PathBuf,
    store: PathBuf,
    created: InitCreated,
    updated: InitUpdated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    store: bool,
    inbox: bool,
}

#[derive(serde::Serialize)]
struct InitUpdated {
    gitignore: bool,
}

pub fn run(opts: InitOptions) -> Result<()> {
    let (config_path, base_dir) = opts.global.config_location()?;

    let created_config = ensure_config(&config_path, opts.force)?;
    let config = Config::load(&config_path)?;

    let store_dir = base_dir.join(&config.store.root).join(&config.store.bucket);
    let created_store = ensure_dir(&store_dir)?;
    let created_inbox = ensure_dir(&store_dir.join(config.store.inbox_prefix.trim_end_matches('/')))?;
    let updated_gitignore = ensure_gitignore(&base_dir)?;

    let report = InitReport {
        config: config_path.clone(),
        store: store_dir.clone(),
        created: InitCreated {
            config: created_config,
            store: created_store,
            inbox: created_inbox,
        },
        updated: InitUpdated {
            gitignore: updated_gitignore,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push("config");
    }
    if created_store {
        created_items.push("store");
    }
    if created_inbox {
        created_items.push("inbox");
    }

    let header = if created_items.is_empty() && !updated_gitignore {
        "actweek init: nothing to do".to_string()
    } else {
        "actweek init: initialized".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("config", config_path.display().to_string());
    human.push_summary("store", store_dir.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    if updated_gitignore {
        human.push_summary("updated", ".gitignore");
    }
    human.push_next_step(format!(
        "set {}SENDER and one contact per owner tag",
        config.secrets.prefix.to_uppercase()
    ));
    human.push_next_step("actweek ingest <sheet.csv>");

    emit_success(opts.global.output(), "init", &report, Some(&human))
}

fn ensure_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() {
        if !path.is_file() {
            return Err(Error::OperationFailed(format!(
                "config exists but is not a file: {}",
                path.display()
            )));
        }
        if !force {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Config::default().save(path)?;
    Ok(true)
}

fn ensure_gitignore(base_dir: &Path) -> Result<bool> {
    let path = base_dir.join(".gitignore");
    if !path.exists() {
        return Ok(false);
    }
    if !path.is_file() {
        return Err(Error::OperationFailed(format!(
            ".gitignore exists but is not a file: {}",
            path.display()
        )));
    }

    let existing = std::fs::read_to_string(&path)?;
    if has_actweek_ignore(&existing) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(".actweek/\n");
    std::fs::write(&path, updated)?;
    Ok(true)
}

fn has_actweek_ignore(contents: &str) -> bool {
    contents.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        trimmed == ".actweek" || trimmed.starts_with(".actweek/")
    })
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::OperationFailed(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(path)?;
    Ok(true)
}
