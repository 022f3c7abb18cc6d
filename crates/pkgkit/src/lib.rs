//! # pkgkit
//!
//! Pure Rust library for system package management.
//!
//! This crate provides functionality for:
//! - Querying installed and candidate package versions
//! - Installing and removing packages with smart retry logic
//! - Picking the package manager of the current host
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::{BackendKind, detect};
//!
//! let backend = detect(BackendKind::Auto).expect("no package manager");
//! if backend.installed_version("subversion").unwrap().is_none() {
//!     backend.install("subversion", None).expect("install failed");
//! }
//! ```
//!
//! ## Retry Logic
//!
//! Network errors and package database locks are transient. Wrap calls in
//! [`retry::with_retry`] to retry them with exponential backoff.
//!
//! ```no_run
//! use pkgkit::{BackendKind, RetryConfig, detect, retry};
//! use std::time::Duration;
//!
//! let backend = detect(BackendKind::Apt).unwrap();
//! let config = RetryConfig::new(3, Duration::from_secs(5), 2.0);
//! retry::with_retry(&config, Some(&retry::LogCallback), || {
//!     backend.install("subversion", Some("1.14.2-4+b2"))
//! })
//! .unwrap();
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::{Backend, detect, version_matches};
pub use error::{Error, ErrorCategory, Result};
pub use types::{BackendKind, RetryConfig};
