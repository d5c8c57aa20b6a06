//! Common utilities and shared types for apserve.
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Host policy**: Hostname normalization and block/silence lists via [`HostPolicy`]

pub mod config;
pub mod error;
pub mod host;

pub use config::{Config, FederationConfig};
pub use error::{AppError, AppResult};
pub use host::{HostLists, HostPolicy, SelfHosts, host_of, to_puny};
