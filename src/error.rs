//! Store Error Types
//!
//! 저장소 계층 전역 에러 타입 정의

use thiserror::Error;

/// 저장소 에러
#[derive(Error, Debug)]
pub enum StoreError {
    /// `open()` 이전에 호출된 작업
    #[error("Store is not initialized: call open() first")]
    Uninitialized,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Failed to acquire database lock: {0}")]
    Lock(String),

    #[error("Request cancelled: {0}")]
    Cancelled(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// 에러 코드 (UI 쪽 alert/로그 분류용)
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Uninitialized => "STORE_UNINITIALIZED",
            StoreError::Database(_) => "DB_ERROR",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::Serialization(_) => "SERIALIZATION_ERROR",
            StoreError::Zip(_) => "ARCHIVE_ERROR",
            StoreError::Base64(_) => "DECODE_ERROR",
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::InvalidOperation(_) => "INVALID_OPERATION",
            StoreError::InvalidArchive(_) => "INVALID_ARCHIVE",
            StoreError::Lock(_) => "LOCK_ERROR",
            StoreError::Cancelled(_) => "CANCELLED",
        }
    }
}

/// 저장소 결과 타입
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(StoreError::Uninitialized.code(), "STORE_UNINITIALIZED");
        assert_eq!(StoreError::not_found("Scenario", 3).code(), "NOT_FOUND");
        assert_eq!(
            StoreError::not_found("Scenario", 3).to_string(),
            "Scenario not found: 3"
        );
    }
}
