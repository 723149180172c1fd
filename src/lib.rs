//! actweek - weekly action sheet reconciliation
//!
//! Each ISO week, the first action sheet that lands in the inbox is archived
//! as the week's requested set and every owner is sent their rows. The next
//! sheet is archived as the completed set; requested rows missing from it are
//! sent back to their owners as incomplete.
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.actweek.toml`
//! - `derive`: Derived columns and counts for the standalone report
//! - `error`: Error types, exit codes and status codes
//! - `events`: JSONL event stream
//! - `lock`: File locking and atomic writes
//! - `mailer`: Owner notifications (outbox file or mail API)
//! - `output`: Human and JSON command output
//! - `pipeline`: The weekly pipeline over injected collaborators
//! - `reconcile`: Set difference and owner partitioning
//! - `secrets`: Secret lookup and recipient resolution
//! - `snapshot`: CSV parsing and validation
//! - `storage`: Object store trait and the directory-backed store
//! - `trigger`: Inbound notification payloads and invocation results
//! - `week`: ISO week keys and the per-week record

pub mod cli;
pub mod config;
pub mod derive;
pub mod error;
pub mod events;
pub mod lock;
pub mod mailer;
pub mod output;
pub mod pipeline;
pub mod reconcile;
pub mod secrets;
pub mod snapshot;
pub mod storage;
pub mod trigger;
pub mod week;

pub use error::{Error, Result};
