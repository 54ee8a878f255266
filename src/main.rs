use mailing_list::config::get_configuration;
use mailing_list::startup::{shutdown_signal, Application, StartupError};
use mailing_list::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let subscriber = get_subscriber(
        String::from("mailing_list"),
        String::from("info"),
        std::io::stdout,
    );

    init_subscriber(subscriber);

    let config = get_configuration().expect("Failed to read configuration.");
    let application = Application::build(config).await?;

    tracing::info!(
        "JSON API listening on port {} and gRPC API on port {}",
        application.get_port(),
        application.get_grpc_port()
    );

    application.run_until_stopped(shutdown_signal()).await
}
