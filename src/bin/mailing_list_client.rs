use std::time::{SystemTime, UNIX_EPOCH};

use mailing_list::codec::timestamp_from_unix;
use mailing_list::config::get_client_configuration;
use mailing_list::domain::email_entry::EmailEntry;
use mailing_list::grpc::client::MailingListClient;
use mailing_list::telemetry::{get_subscriber, init_subscriber};
use tonic::Status;

fn log_response(operation: &str, response: &Result<Option<EmailEntry>, Status>) {
    match response {
        Ok(Some(entry)) => tracing::info!("{}: response {:?}", operation, entry),
        Ok(None) => tracing::info!("{}: email not found", operation),
        Err(status) => tracing::error!("{}: error {}", operation, status),
    }
}

/// Walks a fresh address through create, confirm, get, delete and a batch
/// listing against a running server.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = get_subscriber(
        String::from("mailing_list_client"),
        String::from("info"),
        std::io::stdout,
    );
    init_subscriber(subscriber);

    let config = get_client_configuration()?;
    let mut client = MailingListClient::connect(
        config.get_endpoint_uri(),
        Some(config.get_request_timeout()),
    )
    .await?;

    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.subsec_nanos();
    let email_addr = format!("subscriber{}@example.com", nanos);

    let created = client.create_email(&email_addr).await;
    log_response("create email", &created);

    let mut entry = created?.ok_or("created email was not returned")?;
    entry.confirmed_at = timestamp_from_unix(10_000)?;
    log_response("update email", &client.update_email(&entry).await);

    log_response("get email", &client.get_email(&entry.email).await);

    log_response("delete email", &client.delete_email(&entry.email).await);

    let entries = client.get_email_batch(1, 5).await?;
    if entries.is_empty() {
        tracing::info!("get email batch: no email entries found");
    }
    for entry in entries {
        tracing::info!("get email batch: {:?}", entry);
    }

    Ok(())
}
