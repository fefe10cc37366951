//! Error types for AreaDB
//!
//! Only Backing Store failures are errors. Structural conflicts (overlapping
//! intervals, duplicate node names) and absent entries are reported through
//! `bool` / `Option` return values inside `Ok`.

use thiserror::Error;

/// Result type alias using AreaDbError
pub type Result<T> = std::result::Result<T, AreaDbError>;

/// Unified error type for AreaDB operations
#[derive(Debug, Error)]
pub enum AreaDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
