// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SchedulerError>;
