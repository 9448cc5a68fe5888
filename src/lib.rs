//! Multi-client chat and file upload over TCP, with a per-directory
//! additive hash ledger for detecting tampered or stale files.

pub mod args;
pub mod client;
pub mod config;
pub mod error;
pub mod file_info;
pub mod hashtree;
pub mod ledger;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod watcher;

pub use client::Client;
pub use config::ServerConfig;
pub use server::{Server, ServerContext};
