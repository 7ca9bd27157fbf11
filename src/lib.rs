//! biblio-rs: a folder-backed personal book library.
//!
//! The library folder is the source of truth. A sync run walks it, maps the
//! stored catalog onto the same normalized keys, and reconciles the two:
//! rows whose file disappeared are removed (with their reading-list entries
//! and annotations), new files get a row.
//!
//! # Features
//!
//! - Catalog sync of PDF, EPUB and AZW files, optionally scoped to a sub-folder
//! - Dry-run analysis before applying
//! - User accounts with bearer-token sessions
//! - Reading lists, annotations and book requests
//! - Cover extraction and page counts from the book files

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book format handlers.
pub mod formats;
/// Folder scanning and catalog sync.
pub mod library;
/// HTTP server.
pub mod server;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use library::Reconciler;
pub use server::AppState;
