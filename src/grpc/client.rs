use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::domain::email_entry::EmailEntry;
use crate::grpc::proto::mailing_list_service_client::MailingListServiceClient;
use crate::grpc::proto::{
    self, CreateEmailRequest, DeleteEmailRequest, GetEmailBatchRequest, GetEmailRequest,
    UpdateEmailRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Thin wrapper over the generated client that applies a deadline to every
/// call and converts entries back into [`EmailEntry`].
#[derive(Clone)]
pub struct MailingListClient {
    inner: MailingListServiceClient<Channel>,
}

impl MailingListClient {
    pub async fn connect(
        uri: String,
        timeout: Option<Duration>,
    ) -> Result<MailingListClient, tonic::transport::Error> {
        let channel = Endpoint::from_shared(uri)?
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .connect()
            .await?;

        Ok(MailingListClient {
            inner: MailingListServiceClient::new(channel),
        })
    }

    pub async fn create_email(&mut self, email_addr: &str) -> Result<Option<EmailEntry>, Status> {
        let response = self
            .inner
            .create_email(CreateEmailRequest {
                email_addr: email_addr.to_string(),
            })
            .await?;

        decode_entry(response.into_inner().email_entry)
    }

    pub async fn get_email(&mut self, email_addr: &str) -> Result<Option<EmailEntry>, Status> {
        let response = self
            .inner
            .get_email(GetEmailRequest {
                email_addr: email_addr.to_string(),
            })
            .await?;

        decode_entry(response.into_inner().email_entry)
    }

    pub async fn update_email(&mut self, entry: &EmailEntry) -> Result<Option<EmailEntry>, Status> {
        let response = self
            .inner
            .update_email(UpdateEmailRequest {
                email_entry: Some(proto::EmailEntry::from(entry)),
            })
            .await?;

        decode_entry(response.into_inner().email_entry)
    }

    /// Always `None` on success: the server does not read deleted records back.
    pub async fn delete_email(&mut self, email_addr: &str) -> Result<Option<EmailEntry>, Status> {
        let response = self
            .inner
            .delete_email(DeleteEmailRequest {
                email_addr: email_addr.to_string(),
            })
            .await?;

        decode_entry(response.into_inner().email_entry)
    }

    pub async fn get_email_batch(
        &mut self,
        page: i32,
        count: i32,
    ) -> Result<Vec<EmailEntry>, Status> {
        let response = self
            .inner
            .get_email_batch(GetEmailBatchRequest { page, count })
            .await?;

        response
            .into_inner()
            .email_entries
            .into_iter()
            .map(EmailEntry::try_from)
            .collect::<Result<_, _>>()
            .map_err(Status::internal)
    }
}

fn decode_entry(wire: Option<proto::EmailEntry>) -> Result<Option<EmailEntry>, Status> {
    wire.map(EmailEntry::try_from)
        .transpose()
        .map_err(Status::internal)
}
