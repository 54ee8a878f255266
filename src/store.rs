use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

use crate::codec::{timestamp_from_unix, timestamp_to_unix};
use crate::domain::email_entry::EmailEntry;
use crate::domain::entry_update::EntryUpdate;
use crate::domain::page_request::PageRequest;
use crate::domain::subscriber_email::SubscriberEmail;

/// Handle over the `emails` table shared by both protocol surfaces.
///
/// Every method is a single statement, so atomicity and write serialization
/// are left to SQLite. Lookups never filter on `opt_out`; only
/// [`MailingListStore::list_page`] hides soft-deleted records.
#[derive(Clone, Debug)]
pub struct MailingListStore {
    db_pool: SqlitePool,
}

impl MailingListStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    pub async fn close(&self) {
        self.db_pool.close().await
    }

    #[tracing::instrument(name = "Ensure the emails table exists", skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), SchemaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS emails (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                email           TEXT NOT NULL UNIQUE,
                confirmed_at    INTEGER NOT NULL DEFAULT 0,
                opt_out         INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.db_pool)
        .await
        .map_err(SchemaError)?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Insert a new email into the database",
        skip(self, email),
        fields(email = %email)
    )]
    pub async fn create(&self, email: &SubscriberEmail) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO emails (email, confirmed_at, opt_out)
            VALUES ($1, 0, FALSE)
            "#,
        )
        .bind(email.as_ref())
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to create email {}: {:?}", email, err);
            StoreError::from_write(err, email)
        })?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Fetch an email from the database",
        skip(self, email),
        fields(email = %email)
    )]
    pub async fn get_by_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Option<EmailEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, confirmed_at, opt_out
            FROM emails
            WHERE email = $1
            "#,
        )
        .bind(email.as_ref())
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to get email {}: {:?}", email, err);
            StoreError::Database(err)
        })?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Replaces every non-id field of the record `id`. Matching no row is not
    /// an error.
    #[tracing::instrument(
        name = "Update an email by id",
        skip(self, update, id),
        fields(id = %id, email = %update.email)
    )]
    pub async fn update(&self, update: &EntryUpdate, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE emails
            SET email = $1,
                confirmed_at = $2,
                opt_out = $3
            WHERE id = $4
            "#,
        )
        .bind(update.email.as_ref())
        .bind(timestamp_to_unix(&update.confirmed_at))
        .bind(update.opt_out)
        .bind(id)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to update email with id {}: {:?}", id, err);
            StoreError::from_write(err, &update.email)
        })?;

        Ok(())
    }

    /// Inserts the record, or refreshes `confirmed_at` and `opt_out` of the
    /// existing record with the same email. The id of an existing record is
    /// kept.
    #[tracing::instrument(
        name = "Upsert an email",
        skip(self, update),
        fields(email = %update.email)
    )]
    pub async fn upsert(&self, update: &EntryUpdate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO emails (email, confirmed_at, opt_out)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET confirmed_at = excluded.confirmed_at,
                opt_out = excluded.opt_out
            "#,
        )
        .bind(update.email.as_ref())
        .bind(timestamp_to_unix(&update.confirmed_at))
        .bind(update.opt_out)
        .execute(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to upsert email {}: {:?}", update.email, err);
            StoreError::Database(err)
        })?;

        Ok(())
    }

    #[tracing::instrument(name = "Soft delete an email by id", skip(self))]
    pub async fn soft_delete(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE emails SET opt_out = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to delete email with id {}: {:?}", id, err);
                StoreError::Database(err)
            })?;

        Ok(())
    }

    #[tracing::instrument(
        name = "Soft delete an email by address",
        skip(self, email),
        fields(email = %email)
    )]
    pub async fn soft_delete_by_email(&self, email: &SubscriberEmail) -> Result<(), StoreError> {
        sqlx::query("UPDATE emails SET opt_out = TRUE WHERE email = $1")
            .bind(email.as_ref())
            .execute(&self.db_pool)
            .await
            .map_err(|err| {
                tracing::error!("Failed to delete email {}: {:?}", email, err);
                StoreError::Database(err)
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetch a page of active emails", skip(self))]
    pub async fn list_page(&self, page: &PageRequest) -> Result<Vec<EmailEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, confirmed_at, opt_out
            FROM emails
            WHERE opt_out = FALSE
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to get a batch of emails: {:?}", err);
            StoreError::Database(err)
        })?;

        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<EmailEntry, StoreError> {
    Ok(EmailEntry {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        confirmed_at: timestamp_from_unix(row.try_get("confirmed_at")?)
            .map_err(|err| sqlx::Error::Decode(err.into()))?,
        opt_out: row.try_get("opt_out")?,
    })
}

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("{0} is already subscribed.")]
    DuplicateEmail(String),
    #[error("Failed to execute a query against the subscriber store.")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    fn from_write(err: sqlx::Error, email: &SubscriberEmail) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);

        if is_unique_violation {
            StoreError::DuplicateEmail(email.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateEmail(_) => write!(f, "{}", self),
            StoreError::Database(err) => write!(f, "{}\nCaused by:\n\t{}", self, err),
        }
    }
}

/// The emails table could not be created. Startup cannot continue.
#[derive(thiserror::Error)]
#[error("Failed to create the emails table.")]
pub struct SchemaError(#[source] pub sqlx::Error);

impl std::fmt::Debug for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\nCaused by:\n\t{}", self, self.0)
    }
}
