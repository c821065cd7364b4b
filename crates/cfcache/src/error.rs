// SPDX-License-Identifier: Apache-2.0

use cfcache_model::ValidationError;
use cfcache_store::{StoreError, StoreErrorCode};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheErrorCode {
    StorageUnavailable,
    CorruptMetadata,
    IncompleteEntry,
    CorruptPayload,
    Conflict,
    Io,
    InvalidRequest,
    KernelSource,
    Internal,
}

impl CacheErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StorageUnavailable => "storage_unavailable",
            Self::CorruptMetadata => "corrupt_metadata",
            Self::IncompleteEntry => "incomplete_entry",
            Self::CorruptPayload => "corrupt_payload",
            Self::Conflict => "conflict",
            Self::Io => "io_error",
            Self::InvalidRequest => "invalid_request",
            Self::KernelSource => "kernel_source_error",
            Self::Internal => "internal_error",
        }
    }
}

impl From<StoreErrorCode> for CacheErrorCode {
    fn from(code: StoreErrorCode) -> Self {
        match code {
            StoreErrorCode::StorageUnavailable => Self::StorageUnavailable,
            StoreErrorCode::CorruptMetadata => Self::CorruptMetadata,
            StoreErrorCode::IncompleteEntry => Self::IncompleteEntry,
            StoreErrorCode::CorruptPayload => Self::CorruptPayload,
            StoreErrorCode::Conflict => Self::Conflict,
            StoreErrorCode::NotFound | StoreErrorCode::Io => Self::Io,
            StoreErrorCode::Validation => Self::InvalidRequest,
            StoreErrorCode::Internal => Self::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    Store(StoreError),
    Model(ValidationError),
    /// The caller handed in an inconsistent commit or query.
    InvalidRequest(String),
    /// The kernel computation collaborator failed.
    KernelSource(String),
    Internal(String),
}

impl CacheError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    #[must_use]
    pub fn code(&self) -> CacheErrorCode {
        match self {
            Self::Store(e) => e.code.into(),
            Self::Model(_) | Self::InvalidRequest(_) => CacheErrorCode::InvalidRequest,
            Self::KernelSource(_) => CacheErrorCode::KernelSource,
            Self::Internal(_) => CacheErrorCode::Internal,
        }
    }

    /// Only a missing or inconsistent plane set can be repaired by
    /// recomputing the entry; everything else needs operator attention.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.code() == CacheErrorCode::IncompleteEntry
    }

    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{e}"),
            Self::Model(e) => write!(f, "{}: {e}", self.code().as_str()),
            Self::InvalidRequest(msg) | Self::KernelSource(msg) | Self::Internal(msg) => {
                write!(f, "{}: {msg}", self.code().as_str())
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ValidationError> for CacheError {
    fn from(value: ValidationError) -> Self {
        Self::Model(value)
    }
}
