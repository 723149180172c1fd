#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub const HEADER: &str = "owner,create date,due date,date completed,complete";

/// Monday of ISO week 10, 2024
pub const MONDAY: &str = "2024-03-04T09:00:00Z";
/// Wednesday of ISO week 10, 2024
pub const WEDNESDAY: &str = "2024-03-06T09:00:00Z";

/// A working directory with an initialized config and env secrets
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let ws = Self {
            dir: tempfile::tempdir()?,
        };
        ws.cmd().arg("init").assert().success();
        Ok(ws)
    }

    /// A directory without running `init`
    pub fn bare() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("actweek").expect("binary");
        cmd.current_dir(self.path())
            .env_remove("ACTWEEK_CONFIG")
            .env_remove("RUST_LOG")
            .env("ACTWEEK_SENDER", "reports@example.com")
            .env("ACTWEEK_ELE_EMAIL", "ele@example.com")
            .env("ACTWEEK_MERC_EMAIL", "merc@example.com");
        cmd
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write a sheet with the standard header and the given rows
    pub fn write_sheet(&self, rel_path: &str, rows: &[&str]) -> std::io::Result<PathBuf> {
        let mut contents = format!("{HEADER}\n");
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        self.write_file(rel_path, &contents)
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.path().join(".actweek").join("store").join("actions")
    }

    pub fn object_exists(&self, key: &str) -> bool {
        self.bucket_dir().join(key).is_file()
    }

    pub fn read_object(&self, key: &str) -> std::io::Result<String> {
        fs::read_to_string(self.bucket_dir().join(key))
    }

    /// Messages queued in the outbox
    pub fn outbox(&self) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
        let path = self.path().join(".actweek").join("outbox.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for line in fs::read_to_string(path)?.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}
