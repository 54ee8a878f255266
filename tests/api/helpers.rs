use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use reqwest::Response;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use mailing_list::{
    config::get_configuration,
    grpc::client::MailingListClient,
    startup::{get_connection_db_pool, Application, StartupError},
    store::MailingListStore,
    telemetry::{get_subscriber, init_subscriber},
};

static TRACING: Once = Once::new();

// Logs are only printed when TEST_LOG is set, e.g. `TEST_LOG=true cargo test`
fn init_tracing() {
    TRACING.call_once(|| {
        let name = String::from("test");
        let filter = String::from("debug");

        if std::env::var("TEST_LOG").is_ok() {
            init_subscriber(get_subscriber(name, filter, std::io::stdout));
        } else {
            init_subscriber(get_subscriber(name, filter, std::io::sink));
        }
    });
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub grpc_address: String,
    pub grpc_port: u16,
    pub store: MailingListStore,
    pub api_client: reqwest::Client,
    // Keeps the database file alive for the lifetime of the test
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        let (test_app, _) = TestApp::spawn_app_until(std::future::pending::<()>()).await;
        test_app
    }

    /// Spawns the application and stops it once `shutdown` resolves. The
    /// returned handle yields the outcome of the run.
    pub async fn spawn_app_until<F>(shutdown: F) -> (TestApp, JoinHandle<Result<(), StartupError>>)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        init_tracing();

        let db_dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
        let mut config = get_configuration().expect("Missing configuration file.");

        config.set_database_path(db_path(&db_dir));
        // We are using port 0 as way to define a different port per each test. Port 0 is a special case that operating systems
        // take into account: when port is 0, the OS will search for the first available port
        config.set_json_bind(String::from("127.0.0.1:0"));
        config.set_grpc_bind(String::from("127.0.0.1:0"));

        let application = Application::build(config)
            .await
            .expect("Failed to build application.");

        let port = application.get_port();
        let grpc_port = application.get_grpc_port();
        let store = application.store();

        let handle = tokio::spawn(application.run_until_stopped(shutdown));

        let test_app = TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            grpc_address: format!("http://127.0.0.1:{}", grpc_port),
            grpc_port,
            store,
            api_client: reqwest::Client::new(),
            _db_dir: db_dir,
        };

        (test_app, handle)
    }

    pub async fn grpc_client(&self) -> MailingListClient {
        MailingListClient::connect(self.grpc_address.clone(), Some(Duration::from_secs(5)))
            .await
            .expect("Failed to connect to the gRPC API.")
    }

    pub async fn get_health_check(&self) -> Response {
        self.api_client
            .get(&format!("{}/health_check", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_email(&self, body: &serde_json::Value) -> Response {
        self.api_client
            .post(&format!("{}/email", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_raw_email(&self, body: &'static str) -> Response {
        self.api_client
            .post(&format!("{}/email", self.address))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_email(&self, email: &str) -> Response {
        self.api_client
            .get(&format!("{}/email", self.address))
            .query(&[("email", email)])
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_email(&self, id: &str, body: &serde_json::Value) -> Response {
        self.api_client
            .put(&format!("{}/email/{}", self.address, id))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete_email(&self, id: &str) -> Response {
        self.api_client
            .delete(&format!("{}/email/{}", self.address, id))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// `query` is appended verbatim, e.g. `page=2&count=3`.
    pub async fn get_email_batch(&self, query: &str) -> Response {
        self.api_client
            .get(&format!("{}/email/batch?{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Creates `email` through the JSON API and returns the assigned id.
    pub async fn create_email(&self, email: &str) -> i64 {
        let response = self
            .post_email(&serde_json::json!({ "Email": email }))
            .await;
        assert_eq!(201, response.status().as_u16());

        let body: serde_json::Value = response.json().await.expect("Invalid JSON body.");
        body["Id"].as_i64().expect("Missing Id field.")
    }
}

/// A store on a fresh database, without any server in front of it.
pub async fn spawn_store() -> (MailingListStore, TempDir) {
    init_tracing();

    let db_dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
    let mut config = get_configuration().expect("Missing configuration file.");
    config.set_database_path(db_path(&db_dir));

    let store = MailingListStore::new(get_connection_db_pool(&config));
    store
        .ensure_schema()
        .await
        .expect("Failed to create the schema.");

    (store, db_dir)
}

fn db_path(db_dir: &TempDir) -> String {
    db_dir.path().join("list.db").to_string_lossy().into_owned()
}
