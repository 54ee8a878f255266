pub mod codec;
pub mod config;
pub mod domain;
pub mod grpc;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
