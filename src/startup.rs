use std::future::Future;
use std::net::TcpListener;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::oneshot;
use tracing_actix_web::TracingLogger;

use crate::config::Settings;
use crate::grpc;
use crate::routes::{
    handle_create_email, handle_delete_email, handle_get_email, handle_get_email_batch,
    handle_update_email, health_check, JsonApiError,
};
use crate::store::{MailingListStore, SchemaError};

pub struct Application {
    json_port: u16,
    grpc_port: u16,
    json_server: Server,
    grpc_listener: tokio::net::TcpListener,
    store: MailingListStore,
    shutdown_timeout: Duration,
}

impl Application {
    /// Opens the store, makes sure the schema exists and binds both
    /// listeners. Nothing is served until [`Application::run_until_stopped`].
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let store = MailingListStore::new(get_connection_db_pool(&config));
        store.ensure_schema().await?;

        let listener = TcpListener::bind(config.get_json_address())?;
        let json_port = listener.local_addr()?.port();
        let json_server = run(listener, store.clone(), &config)?;

        let grpc_listener = tokio::net::TcpListener::bind(config.get_grpc_address()).await?;
        let grpc_port = grpc_listener.local_addr()?.port();

        tracing::info!(
            "Using db path {} with JSON API on {} and gRPC API on {}",
            config.database_path,
            config.get_json_address(),
            config.get_grpc_address()
        );

        Ok(Self {
            json_port,
            grpc_port,
            json_server,
            grpc_listener,
            store,
            shutdown_timeout: config.get_shutdown_timeout(),
        })
    }

    pub fn get_port(&self) -> u16 {
        self.json_port
    }

    pub fn get_grpc_port(&self) -> u16 {
        self.grpc_port
    }

    pub fn store(&self) -> MailingListStore {
        self.store.clone()
    }

    /// Serves both surfaces until `shutdown` resolves, then drains each one
    /// within the configured timeout and closes the store.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> Result<(), StartupError>
    where
        F: Future<Output = ()>,
    {
        let Application {
            json_server,
            grpc_listener,
            store,
            shutdown_timeout,
            ..
        } = self;

        let json_handle = json_server.handle();
        let mut json_task = tokio::spawn(json_server);

        let (stop_grpc, grpc_stopped) = oneshot::channel::<()>();
        let mut grpc_task = tokio::spawn(grpc::serve(grpc_listener, store.clone(), async move {
            let _ = grpc_stopped.await;
        }));

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Received stop signal, starting graceful shutdown");
            }
            outcome = &mut json_task => {
                tracing::error!("JSON API stopped unexpectedly: {:?}", outcome);
                grpc_task.abort();
                store.close().await;
                return match outcome {
                    Ok(Err(err)) => Err(StartupError::Io(err)),
                    _ => Err(StartupError::ServerExited("JSON API")),
                };
            }
            outcome = &mut grpc_task => {
                tracing::error!("gRPC API stopped unexpectedly: {:?}", outcome);
                json_handle.stop(false).await;
                store.close().await;
                return match outcome {
                    Ok(Err(err)) => Err(StartupError::Grpc(err)),
                    _ => Err(StartupError::ServerExited("gRPC API")),
                };
            }
        }

        tracing::info!("HTTP server graceful stop...");
        // actix bounds its own drain by the configured shutdown timeout
        json_handle.stop(true).await;
        match json_task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!("JSON API failed while stopping: {:?}", err),
            Err(err) => tracing::error!("JSON API task failed: {:?}", err),
        }

        tracing::info!("gRPC server graceful stop...");
        let _ = stop_grpc.send(());
        match tokio::time::timeout(shutdown_timeout, &mut grpc_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => tracing::error!("gRPC API failed while stopping: {:?}", err),
            Ok(Err(err)) => tracing::error!("gRPC API task failed: {:?}", err),
            Err(_) => {
                tracing::warn!("gRPC server did not drain within {:?}", shutdown_timeout);
                grpc_task.abort();
            }
        }

        store.close().await;
        tracing::info!("Shutdown complete");

        Ok(())
    }
}

pub fn run(
    listener: TcpListener,
    store: MailingListStore,
    config: &Settings,
) -> Result<Server, std::io::Error> {
    let store = web::Data::new(store);

    let server = HttpServer::new(move || {
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/email")
                    .route("", web::get().to(handle_get_email))
                    .route("", web::post().to(handle_create_email))
                    .route("/batch", web::get().to(handle_get_email_batch))
                    .route("/{id}", web::put().to(handle_update_email))
                    .route("/{id}", web::delete().to(handle_delete_email)),
            )
            // Malformed query strings and ids answer with the same error envelope as the handlers
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                JsonApiError::Validation(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _| {
                JsonApiError::Validation(err.to_string()).into()
            }))
            .app_data(store.clone())
    })
    .client_request_timeout(config.get_client_request_timeout())
    .client_disconnect_timeout(config.get_client_request_timeout())
    .keep_alive(config.get_keep_alive())
    .shutdown_timeout(config.get_shutdown_timeout().as_secs())
    .disable_signals()
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &Settings) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(config.get_max_connections())
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Failed to bind or serve a listener.")]
    Io(#[from] std::io::Error),
    #[error("Failed to serve the gRPC API.")]
    Grpc(#[from] tonic::transport::Error),
    #[error("The {0} stopped before a stop signal was received.")]
    ServerExited(&'static str),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            write!(f, "\nCaused by:\n\t{}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
