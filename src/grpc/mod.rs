use std::future::Future;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::store::MailingListStore;

pub mod client;
mod service;

pub use service::MailService;

/// Generated protobuf types, service trait and client.
pub mod proto {
    tonic::include_proto!("mailing_list");
}

use proto::mailing_list_service_server::MailingListServiceServer;

/// Serves the RPC surface on `listener` until `shutdown` resolves, then lets
/// in-flight calls finish.
pub async fn serve<F>(
    listener: TcpListener,
    store: MailingListStore,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()>,
{
    let incoming = TcpListenerStream::new(listener);

    Server::builder()
        .trace_fn(|request| tracing::info_span!("gRPC request", path = %request.uri().path()))
        .add_service(MailingListServiceServer::new(MailService::new(store)))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await
}
