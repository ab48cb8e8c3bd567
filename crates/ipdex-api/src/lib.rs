//! # ipdex-api
//!
//! The read side of ipdex: a cache-aside lookup service over the
//! double-buffered range store, exposed through a small HTTP API.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod server;
pub mod service;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use server::Server;
pub use service::LookupService;
