//! Shared output formatting for actweek commands.
//!
//! Every command renders either a [`HumanOutput`] or, with `--json`, one
//! envelope object: `{schema_version, command, status, data | error,
//! warnings?, next_steps?}`.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};

pub const SCHEMA_VERSION: &str = "actweek.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Header line plus optional sections, printed in a fixed order.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(flatten)]
    body: B,
    #[serde(skip_serializing_if = "no_items")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "no_items")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct DataBody<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    code: i32,
    status_code: u16,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn no_items(items: &&[String]) -> bool {
    items.is_empty()
}

fn print_json<B: Serialize>(envelope: &Envelope<'_, B>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = match human {
            Some(h) => (h.warnings.as_slice(), h.next_steps.as_slice()),
            None => (&[][..], &[][..]),
        };
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            body: DataBody { data },
            warnings,
            next_steps,
        });
    }

    if let Some(human) = human.filter(|_| !options.quiet) {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);
    if json {
        let next_steps: Vec<String> = hint.into_iter().collect();
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            body: ErrorBody {
                error: ErrorDetail {
                    message: err.to_string(),
                    code: err.exit_code(),
                    status_code: err.status_code(),
                    kind: error_kind(err),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];

    let summary: Vec<String> = output
        .summary
        .iter()
        .map(|(key, value)| match value.as_str() {
            "" => key.clone(),
            value => format!("{key}: {value}"),
        })
        .collect();

    for (title, items) in [
        ("Summary", &summary),
        ("Details", &output.details),
        ("Warnings", &output.warnings),
        ("Next steps", &output.next_steps),
    ] {
        if items.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(format!("{title}:"));
        lines.extend(items.iter().map(|item| format!("- {item}")));
    }

    lines.join("\n")
}

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// First positional argument, skipping flags and the values of global flags
/// that take one.
pub fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if matches!(arg.as_str(), "--config" | "--events" | "--now") {
            args.next();
        } else if !arg.starts_with('-') {
            return arg;
        }
    }
    "actweek".to_string()
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::BLOCKED => "blocked",
        _ => "operation_failed",
    }
}

/// What to do next, when there is one obvious step.
fn error_hint(err: &Error) -> Option<String> {
    let hint = match err {
        Error::InvalidConfig(_) => "fix .actweek.toml then retry".to_string(),
        Error::WeekClosed { week, .. } => format!("actweek week --week {week}"),
        Error::Conflict(_) => "retry; another run updated the week record".to_string(),
        Error::MissingSnapshot { week, .. } => {
            format!("remove {week}_state.json from the store to start week {week} over")
        }
        Error::SecretNotFound(name) => format!("provide secret '{name}' then retry"),
        Error::MissingColumn(_) | Error::InvalidRow { .. } | Error::SchemaMismatch(_) => {
            "fix the sheet and upload it again".to_string()
        }
        Error::Notify(_) | Error::Http(_) => {
            "actweek resume --week <week> once delivery works".to_string()
        }
        _ => return None,
    };
    Some(hint)
}
