use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_option_number_from_string;

use crate::codec::JsonEmailEntry;
use crate::domain::email_entry::EmailEntry;
use crate::domain::entry_update::EntryUpdate;
use crate::domain::page_request::PageRequest;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::store::{MailingListStore, StoreError};

#[derive(Deserialize, Debug)]
pub struct EmailParameters {
    pub email: Option<String>,
}

/// An empty value such as `page=` counts as absent.
#[derive(Deserialize, Debug)]
pub struct BatchParameters {
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub count: Option<i64>,
}

#[tracing::instrument(
    name = "JSON get email",
    skip(parameters, store),
    fields(email = ?parameters.email)
)]
pub async fn handle_get_email(
    parameters: web::Query<EmailParameters>,
    store: web::Data<MailingListStore>,
) -> Result<HttpResponse, JsonApiError> {
    // Only valid addresses are ever stored, so anything else is simply absent
    let email = match SubscriberEmail::parse(parameters.into_inner().email.unwrap_or_default()) {
        Ok(email) => email,
        Err(_) => return Ok(HttpResponse::NoContent().finish()),
    };
    let entry = store.get_by_email(&email).await?;

    Ok(entry_response(HttpResponse::Ok(), entry))
}

#[tracing::instrument(
    name = "JSON create email",
    skip(body, store),
    fields(email = tracing::field::Empty)
)]
pub async fn handle_create_email(
    body: web::Bytes,
    store: web::Data<MailingListStore>,
) -> Result<HttpResponse, JsonApiError> {
    let email = parse_email(JsonEmailEntry::decode(&body).email)?;
    tracing::Span::current().record("email", tracing::field::display(&email));

    store.create(&email).await?;
    let entry = store.get_by_email(&email).await?;

    Ok(entry_response(HttpResponse::Created(), entry))
}

#[tracing::instrument(name = "JSON update email", skip(id, body, store), fields(id = %id))]
pub async fn handle_update_email(
    id: web::Path<i64>,
    body: web::Bytes,
    store: web::Data<MailingListStore>,
) -> Result<HttpResponse, JsonApiError> {
    let entry = EmailEntry::try_from(JsonEmailEntry::decode(&body))
        .map_err(JsonApiError::Validation)?;
    let update = EntryUpdate::try_from(entry).map_err(JsonApiError::Validation)?;

    store.update(&update, id.into_inner()).await?;
    let entry = store.get_by_email(&update.email).await?;

    Ok(entry_response(HttpResponse::Ok(), entry))
}

/// Answers 204 without reading the record back: it still exists, but as an
/// opted-out entry it no longer belongs to the list.
#[tracing::instrument(name = "JSON delete email", skip(id, store), fields(id = %id))]
pub async fn handle_delete_email(
    id: web::Path<i64>,
    store: web::Data<MailingListStore>,
) -> Result<HttpResponse, JsonApiError> {
    store.soft_delete(id.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

#[tracing::instrument(
    name = "JSON get email batch",
    skip(parameters, store),
    fields(page = tracing::field::Empty, count = tracing::field::Empty)
)]
pub async fn handle_get_email_batch(
    parameters: web::Query<BatchParameters>,
    store: web::Data<MailingListStore>,
) -> Result<HttpResponse, JsonApiError> {
    let page = PageRequest::parse(parameters.page, parameters.count)
        .map_err(JsonApiError::Validation)?;
    tracing::Span::current()
        .record("page", page.page())
        .record("count", page.limit());
    let entries = store.list_page(&page).await?;
    let body: Vec<JsonEmailEntry> = entries.iter().map(JsonEmailEntry::from).collect();

    Ok(HttpResponse::Ok().json(body))
}

fn parse_email(email: String) -> Result<SubscriberEmail, JsonApiError> {
    SubscriberEmail::parse(email).map_err(JsonApiError::Validation)
}

/// Absent records have no body, so they are answered with 204.
fn entry_response(
    mut builder: actix_web::HttpResponseBuilder,
    entry: Option<EmailEntry>,
) -> HttpResponse {
    match entry {
        Some(entry) => builder.json(JsonEmailEntry::from(&entry)),
        None => HttpResponse::NoContent().finish(),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "Err")]
    err: String,
}

#[derive(thiserror::Error)]
pub enum JsonApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl std::fmt::Debug for JsonApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonApiError::Validation(message) => write!(f, "Validation error: {}", message),
            JsonApiError::Store(err) => write!(f, "Caused by:\n\t({:?})", err),
        }
    }
}

impl ResponseError for JsonApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            JsonApiError::Validation(_) => StatusCode::BAD_REQUEST,
            JsonApiError::Store(StoreError::DuplicateEmail(_)) => StatusCode::BAD_REQUEST,
            JsonApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            err: self.to_string(),
        })
    }
}
