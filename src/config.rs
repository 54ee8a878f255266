use std::time::Duration;

use config::{Config, ConfigError, File};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::ConnectOptions;

const ENV_PREFIX: &str = "mailing_list";

#[derive(Debug)]
pub enum Environment {
    Development,
    Production,
}

/// Server settings, read once at startup.
///
/// The three historical options keep their environment names:
/// `MAILING_LIST_DB`, `MAILING_LIST_BIND_PORT` and
/// `MAILING_LIST_GRPC_BIND_PORT`.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(rename = "db")]
    pub database_path: String,
    #[serde(rename = "bind_port")]
    pub json_bind: String,
    #[serde(rename = "grpc_bind_port")]
    pub grpc_bind: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_connections: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub shutdown_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub client_request_timeout_millis: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub keep_alive_secs: u64,
}

/// Settings of the demo gRPC client, `MAILING_LIST_GRPC_ADDR`.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct ClientSettings {
    pub grpc_addr: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub request_timeout_millis: u64,
}

impl Settings {
    pub fn get_json_address(&self) -> String {
        normalize_bind_address(&self.json_bind)
    }

    pub fn get_grpc_address(&self) -> String {
        normalize_bind_address(&self.grpc_bind)
    }

    pub fn get_db_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(tracing::log::LevelFilter::Trace)
    }

    pub fn get_max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn get_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn get_client_request_timeout(&self) -> Duration {
        Duration::from_millis(self.client_request_timeout_millis)
    }

    pub fn get_keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn set_database_path(&mut self, database_path: String) {
        self.database_path = database_path
    }

    pub fn set_json_bind(&mut self, json_bind: String) {
        self.json_bind = json_bind
    }

    pub fn set_grpc_bind(&mut self, grpc_bind: String) {
        self.grpc_bind = grpc_bind
    }
}

impl ClientSettings {
    /// The URI the tonic channel connects to. A bare `:port` targets the
    /// local host.
    pub fn get_endpoint_uri(&self) -> String {
        let address = match self.grpc_addr.strip_prefix(':') {
            Some(port) => format!("127.0.0.1:{}", port),
            None => self.grpc_addr.clone(),
        };

        if address.starts_with("http://") || address.starts_with("https://") {
            address
        } else {
            format!("http://{}", address)
        }
    }

    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_millis)
    }
}

/// A bare `:port` listens on every interface.
pub fn normalize_bind_address(address: &str) -> String {
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => address.to_string(),
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            unknown_env => Err(format!(
                "{} is not supported environment. Use either 'development' or 'production'.",
                unknown_env
            )),
        }
    }
}

fn base_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    let root_path = std::env::current_dir().map_err(|err| ConfigError::Foreign(Box::new(err)))?;
    let config_directory = root_path.join("config");
    // Uses development environment by default
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "development".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    tracing::info!("Application environment = {:?}", environment);

    // Files are optional: every key has a default so the binary runs from any directory
    Ok(Config::builder()
        .add_source(File::from(config_directory.join("base")).required(false))
        .add_source(File::from(config_directory.join(environment.as_str())).required(false)))
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = base_builder()?
        .set_default("db", "list.db")?
        .set_default("bind_port", ":9091")?
        .set_default("grpc_bind_port", ":9092")?
        .set_default("max_connections", 5)?
        .set_default("shutdown_timeout_secs", 30)?
        .set_default("client_request_timeout_millis", 1000)?
        .set_default("keep_alive_secs", 120)?
        // E.g MAILING_LIST_DB would set Settings.database_path
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;

    settings.try_deserialize()
}

pub fn get_client_configuration() -> Result<ClientSettings, ConfigError> {
    let settings = base_builder()?
        .set_default("grpc_addr", ":9092")?
        .set_default("request_timeout_millis", 1000)?
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()?;

    settings.try_deserialize()
}
