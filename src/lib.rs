// src/lib.rs
pub mod batch;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fallback;
pub mod models;
pub mod providers;
pub mod query;
pub mod rpc_client;
pub mod server;
pub mod symbols;
pub mod tool;
pub mod tools;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{RemoteClient, RemoteRequest, RemoteResponse, ReqwestTransport, Transport};
pub use config::ToolsConfig;
pub use envelope::{Confidence, EnvelopeMetadata, ResultEnvelope};
pub use error::{ErrorKind, ProviderError, ToolError};
pub use rpc_client::RpcClient;
pub use server::{configure, AppState};
pub use tool::{Tool, ToolContext, ToolResolver};
