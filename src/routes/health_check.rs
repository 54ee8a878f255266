use actix_web::{web, HttpResponse};

use crate::store::MailingListStore;

/// Endpoint used by clients to know if the server and its database are working
#[tracing::instrument(name = "Health Check handler", skip(store))]
pub async fn health_check(store: web::Data<MailingListStore>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(store.pool()).await {
        Ok(_) => HttpResponse::Ok().finish(),
        Err(err) => {
            tracing::error!("Subscriber store is unreachable: {:?}", err);
            HttpResponse::ServiceUnavailable().finish()
        }
    }
}
