//! Resumable upload and request pipeline for a Microsoft Graph–backed
//! drive (OneDrive personal, business, SharePoint).
//!
//! This crate covers the core of a remote-storage backend adapter: a
//! resumable chunked upload engine, a request pipeline enforcing
//! server-directed throttling and per-phase timeouts, and drive-path
//! resolution with pagination. OAuth acquisition, CLI plumbing, and
//! protocol-specific drive-path subclasses are expected to live in the
//! embedding application; see [`token::TokenProvider`] and
//! [`resolver::DrivePathResolver`] for the boundaries this crate calls
//! through.

pub mod backend;
pub mod config;
pub mod error;
pub mod folder;
mod idle_read;
pub mod pagination;
pub mod pipeline;
pub mod resolver;
pub mod resource;
pub mod throttle;
pub mod token;
pub mod upload;
pub mod url_builder;

pub use backend::{Backend, Quota, UPLOAD_SMALL_LIMIT};
pub use config::{Config, ConfigError, Timeouts};
pub use error::{Error, Result};
pub use token::{StaticTokenProvider, TokenProvider};
