//! Error types for Citewise.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, prompts, retrieval, record
//! lookup, and session storage.

use thiserror::Error;

/// Unified error type for Citewise.
///
/// All fallible functions return `Result<T, AppError>`.
/// Recoverable backend failures are absorbed by the answering pipeline;
/// the variants here are what remains when something must propagate.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge pipeline errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Collection search backend errors
    #[error("Search error: {0}")]
    Search(String),

    /// Structured record lookup errors
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Session store errors
    #[error("Session error: {0}")]
    Session(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
