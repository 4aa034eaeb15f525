//! # Registry Admin
//!
//! Users, groups and access rules for a private container registry, kept in
//! an embedded SQLite store and served over a REST API.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! registry-admin = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use registry_admin::server::{AppState, create_router};
//! use registry_admin::store::SqliteStore;
//! use tokio_util::sync::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let store = SqliteStore::new("./data/registry-admin.db");
//! store.connect(shutdown.clone()).unwrap();
//!
//! let router = create_router(Arc::new(AppState::new(Arc::new(store))));
//! // Serve with axum, cancel `shutdown` to close the store...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `registry-admin` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;

pub use error::{Error, Result};
