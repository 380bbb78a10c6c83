//! drive_gateway - an HTTP gateway to a Google Drive folder.
//!
//! This library provides:
//! - A Google Drive backend authenticated by service account key or stored user token
//! - An in-memory mock backend used when no credentials are available
//! - A manager that picks a backend once and reports results uniformly
//! - An axum router exposing upload, list, get, delete, download and search
//!
//! # Example
//!
//! ```no_run
//! use drive_gateway::{DriveManager, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load(None)?;
//!     let manager = DriveManager::from_settings(&settings.drive).await;
//!
//!     let page = manager.list_files(10, None).await?;
//!     for file in page.files {
//!         println!("{}\t{}", file.id, file.name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod mock;
pub mod models;

// Re-exports for convenience
pub use auth::{AuthStrategy, Authenticator};
pub use backend::{Backend, DriveBackend};
pub use client::DriveClient;
pub use config::Settings;
pub use error::{DriveError, OperationError, Result};
pub use manager::DriveManager;
pub use mock::MockDrive;
pub use models::{FileListPage, FileRecord, UploadOutcome};
