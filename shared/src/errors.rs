//! Shared error types for the trigger coordination system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("Malformed dispatch record for key {key}: {message}")]
    MalformedRecord { key: String, message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
