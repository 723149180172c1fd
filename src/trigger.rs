//! Inbound trigger payloads and invocation results.
//!
//! The payload is the object-created notification shape used by common
//! object stores: `{"Records":[{"s3":{"bucket":{"name":..},"object":{"key":..}}}]}`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::week::Mode;

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(rename = "Records", default)]
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    key: String,
}

/// Reference to a newly arrived object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerEvent {
    pub bucket: String,
    pub key: String,
}

impl TriggerEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse a notification payload. Only the first record is used.
    pub fn parse(raw: &str) -> Result<Self> {
        let payload: Payload = serde_json::from_str(raw)
            .map_err(|err| Error::InvalidEvent(format!("malformed payload: {err}")))?;
        let record = payload
            .records
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidEvent("payload has no records".to_string()))?;

        let key = decode_key(&record.s3.object.key)?;
        if record.s3.bucket.name.trim().is_empty() || key.trim().is_empty() {
            return Err(Error::InvalidEvent("bucket and key are required".to_string()));
        }
        Ok(Self {
            bucket: record.s3.bucket.name,
            key,
        })
    }

    /// The payload shape for this event, for feeding `handle`
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "Records": [{
                "s3": {
                    "bucket": { "name": self.bucket },
                    "object": { "key": encode_key(&self.key) },
                }
            }]
        })
    }
}

/// Bytes escaped when a key is put back into a payload
const KEY_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'/')
    .remove(b'~');

/// Undo the form encoding object keys carry in notifications (`+` is a space).
///
/// Every `%` must start a two-digit hex escape.
pub fn decode_key(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    for (at, _) in raw.match_indices('%') {
        let escape = bytes.get(at + 1..at + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(Error::InvalidEvent(format!("bad escape in key '{raw}'")));
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| Error::InvalidEvent(format!("key '{raw}' is not UTF-8")))
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ESCAPES).to_string()
}

/// What an invocation reports back to the triggering environment
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl InvocationResult {
    pub fn ok(mode: Mode, message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
            mode: Some(mode),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self {
            status_code: err.status_code(),
            message: err.to_string(),
            mode: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
