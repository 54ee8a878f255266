use tonic::{Request, Response, Status};

use crate::codec::{decode_proto_entry, email_response};
use crate::domain::entry_update::EntryUpdate;
use crate::domain::page_request::PageRequest;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::grpc::proto::mailing_list_service_server::MailingListService;
use crate::grpc::proto::{
    CreateEmailRequest, DeleteEmailRequest, EmailResponse, GetEmailBatchRequest,
    GetEmailBatchResponse, GetEmailRequest, UpdateEmailRequest,
};
use crate::store::{MailingListStore, StoreError};

pub struct MailService {
    store: MailingListStore,
}

impl MailService {
    pub fn new(store: MailingListStore) -> Self {
        Self { store }
    }

    async fn current_entry(&self, email: &SubscriberEmail) -> Result<EmailResponse, Status> {
        let entry = self.store.get_by_email(email).await?;

        Ok(email_response(entry))
    }
}

impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => Status::already_exists(err.to_string()),
            StoreError::Database(_) => Status::internal(err.to_string()),
        }
    }
}

fn parse_email(email: String) -> Result<SubscriberEmail, Status> {
    SubscriberEmail::parse(email).map_err(Status::invalid_argument)
}

#[tonic::async_trait]
impl MailingListService for MailService {
    #[tracing::instrument(
        name = "gRPC create email",
        skip(self, request),
        fields(email = %request.get_ref().email_addr)
    )]
    async fn create_email(
        &self,
        request: Request<CreateEmailRequest>,
    ) -> Result<Response<EmailResponse>, Status> {
        let email = parse_email(request.into_inner().email_addr)?;

        self.store.create(&email).await?;

        Ok(Response::new(self.current_entry(&email).await?))
    }

    #[tracing::instrument(
        name = "gRPC get email",
        skip(self, request),
        fields(email = %request.get_ref().email_addr)
    )]
    async fn get_email(
        &self,
        request: Request<GetEmailRequest>,
    ) -> Result<Response<EmailResponse>, Status> {
        let email = match SubscriberEmail::parse(request.into_inner().email_addr) {
            Ok(email) => email,
            Err(_) => return Ok(Response::new(EmailResponse::default())),
        };

        Ok(Response::new(self.current_entry(&email).await?))
    }

    /// The RPC surface has no numeric id in scope, so updates go through the
    /// email-keyed upsert.
    #[tracing::instrument(
        name = "gRPC update email",
        skip(self, request),
        fields(email = ?request.get_ref().email_entry.as_ref().map(|entry| &entry.email))
    )]
    async fn update_email(
        &self,
        request: Request<UpdateEmailRequest>,
    ) -> Result<Response<EmailResponse>, Status> {
        let entry = decode_proto_entry(request.into_inner().email_entry)
            .map_err(Status::invalid_argument)?;
        let update = EntryUpdate::try_from(entry).map_err(Status::invalid_argument)?;

        self.store.upsert(&update).await?;

        Ok(Response::new(self.current_entry(&update.email).await?))
    }

    #[tracing::instrument(
        name = "gRPC delete email",
        skip(self, request),
        fields(email = %request.get_ref().email_addr)
    )]
    async fn delete_email(
        &self,
        request: Request<DeleteEmailRequest>,
    ) -> Result<Response<EmailResponse>, Status> {
        // Invalid addresses cannot be stored, so there is nothing to delete
        if let Ok(email) = SubscriberEmail::parse(request.into_inner().email_addr) {
            self.store.soft_delete_by_email(&email).await?;
        }

        // Deleted records are not read back
        Ok(Response::new(EmailResponse::default()))
    }

    #[tracing::instrument(
        name = "gRPC get email batch",
        skip(self, request),
        fields(page = request.get_ref().page, count = request.get_ref().count)
    )]
    async fn get_email_batch(
        &self,
        request: Request<GetEmailBatchRequest>,
    ) -> Result<Response<GetEmailBatchResponse>, Status> {
        let request = request.into_inner();
        let page = PageRequest::parse(Some(request.page.into()), Some(request.count.into()))
            .map_err(Status::invalid_argument)?;

        let entries = self.store.list_page(&page).await?;

        Ok(Response::new(GetEmailBatchResponse {
            email_entries: entries.iter().map(Into::into).collect(),
        }))
    }
}
