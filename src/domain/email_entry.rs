use chrono::{DateTime, Utc};

/// A subscriber record as persisted in the `emails` table.
///
/// `confirmed_at` at the Unix epoch means the address was never confirmed.
/// `opt_out` marks the record as soft-deleted: it is still returned by direct
/// lookups but never by batch listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailEntry {
    pub id: i64,
    pub email: String,
    pub confirmed_at: DateTime<Utc>,
    pub opt_out: bool,
}

impl Default for EmailEntry {
    fn default() -> Self {
        EmailEntry {
            id: 0,
            email: String::new(),
            confirmed_at: DateTime::<Utc>::UNIX_EPOCH,
            opt_out: false,
        }
    }
}
