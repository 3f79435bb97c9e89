//! Folio core crate - configuration, errors and shared session types.

pub mod config;
pub mod error;
pub mod types;

pub use config::FolioConfig;
pub use error::{FolioError, Result};
pub use types::*;
