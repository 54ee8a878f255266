use chrono::{DateTime, Utc};

use crate::domain::email_entry::EmailEntry;
use crate::domain::subscriber_email::SubscriberEmail;

/// Validated replacement values for a subscriber record, used by both the
/// update-by-id and the upsert-by-email store operations.
#[derive(Debug, Clone)]
pub struct EntryUpdate {
    pub email: SubscriberEmail,
    pub confirmed_at: DateTime<Utc>,
    pub opt_out: bool,
}

impl TryFrom<EmailEntry> for EntryUpdate {
    type Error = String;

    fn try_from(entry: EmailEntry) -> Result<Self, Self::Error> {
        let email = SubscriberEmail::parse(entry.email)?;

        Ok(EntryUpdate {
            email,
            confirmed_at: entry.confirmed_at,
            opt_out: entry.opt_out,
        })
    }
}
