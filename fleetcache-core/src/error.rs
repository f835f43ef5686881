//! Error types for FleetCache operations

use crate::Namespace;
use thiserror::Error;

/// Store layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found in {namespace}: {id}")]
    NotFound { namespace: Namespace, id: String },

    #[error("Write failed in {namespace} for {id}: {reason}")]
    WriteFailed {
        namespace: Namespace,
        id: String,
        reason: String,
    },

    #[error("Eviction failed in {namespace}: {reason}")]
    EvictionFailed { namespace: Namespace, reason: String },

    #[error("Backend error: {reason}")]
    Backend { reason: String },

    #[error("Stored record in {namespace} is corrupt: {reason}")]
    CorruptRecord { namespace: Namespace, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Compute provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComputeError {
    #[error("{operation} failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Throttled by compute provider, retry after {retry_after_ms}ms")]
    Throttled { retry_after_ms: i64 },

    #[error("Credentials rejected for account {account}")]
    Unauthorized { account: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Malformed cache key: {key}")]
    MalformedKey { key: String },

    #[error("Expected {expected} attributes on {id}, found {found}")]
    UnexpectedAttributes {
        id: String,
        expected: String,
        found: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Entity graph snapshot encoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Failed to encode entity graph: {reason}")]
    Encode { reason: String },

    #[error("Failed to decode entity graph: {reason}")]
    Decode { reason: String },
}

/// Master error type for all FleetCache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FleetCacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type alias for FleetCache operations.
pub type FleetCacheResult<T> = Result<T, FleetCacheError>;

// =============================================================================
// TESTS
// =============================================================================
