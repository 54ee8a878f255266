//! Conversions between the wire forms of both protocol surfaces and
//! [`EmailEntry`].
//!
//! Timestamps travel as whole seconds since the Unix epoch on both surfaces,
//! and "never confirmed" is always `0`, never a null or missing field.
//! Decoding is lenient: a missing or malformed payload yields a zero-valued
//! entry and handlers decide which fields are required. A timestamp chrono
//! cannot represent is the one thing decoding refuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::email_entry::EmailEntry;
use crate::grpc::proto;

/// Converts epoch seconds into a timestamp.
pub fn timestamp_from_unix(seconds: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| format!("{} is not a valid confirmation timestamp.", seconds))
}

pub fn timestamp_to_unix(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp()
}

/// JSON representation of a subscriber record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct JsonEmailEntry {
    #[serde(alias = "id")]
    pub id: i64,
    #[serde(alias = "email")]
    pub email: String,
    #[serde(alias = "confirmed_at")]
    pub confirmed_at: i64,
    #[serde(alias = "opt_out")]
    pub opt_out: bool,
}

impl JsonEmailEntry {
    pub fn decode(body: &[u8]) -> JsonEmailEntry {
        serde_json::from_slice(body).unwrap_or_else(|err| {
            tracing::debug!("Decoding a zero-valued entry from a malformed body: {}", err);
            JsonEmailEntry::default()
        })
    }
}

impl From<&EmailEntry> for JsonEmailEntry {
    fn from(entry: &EmailEntry) -> Self {
        JsonEmailEntry {
            id: entry.id,
            email: entry.email.clone(),
            confirmed_at: timestamp_to_unix(&entry.confirmed_at),
            opt_out: entry.opt_out,
        }
    }
}

impl TryFrom<JsonEmailEntry> for EmailEntry {
    type Error = String;

    fn try_from(wire: JsonEmailEntry) -> Result<Self, Self::Error> {
        Ok(EmailEntry {
            id: wire.id,
            email: wire.email,
            confirmed_at: timestamp_from_unix(wire.confirmed_at)?,
            opt_out: wire.opt_out,
        })
    }
}

impl From<&EmailEntry> for proto::EmailEntry {
    fn from(entry: &EmailEntry) -> Self {
        proto::EmailEntry {
            id: entry.id,
            email: entry.email.clone(),
            confirmed_at: timestamp_to_unix(&entry.confirmed_at),
            opt_out: entry.opt_out,
        }
    }
}

impl TryFrom<proto::EmailEntry> for EmailEntry {
    type Error = String;

    fn try_from(wire: proto::EmailEntry) -> Result<Self, Self::Error> {
        Ok(EmailEntry {
            id: wire.id,
            email: wire.email,
            confirmed_at: timestamp_from_unix(wire.confirmed_at)?,
            opt_out: wire.opt_out,
        })
    }
}

/// An absent nested message decodes the same way as a malformed JSON body.
pub fn decode_proto_entry(wire: Option<proto::EmailEntry>) -> Result<EmailEntry, String> {
    wire.map(EmailEntry::try_from)
        .unwrap_or_else(|| Ok(EmailEntry::default()))
}

pub fn email_response(entry: Option<EmailEntry>) -> proto::EmailResponse {
    proto::EmailResponse {
        email_entry: entry.as_ref().map(proto::EmailEntry::from),
    }
}
