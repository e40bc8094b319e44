// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the LocalFS SDK core

/// Core filesystem error type
///
/// A closed set; every variant has a stable numeric code (see [`FsError::code`])
/// so callers on the other side of the boundary can branch programmatically.
/// Messages name the failing path where one exists.
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid handle")]
    InvalidHandle,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("io error: {0}")]
    Io(String),
}

impl FsError {
    /// Stable numeric code carried across the boundary.
    pub fn code(&self) -> u32 {
        match self {
            FsError::Config(_) => 1,
            FsError::InvalidHandle => 2,
            FsError::InvalidPath(_) => 3,
            FsError::NotFound(_) => 4,
            FsError::NotADirectory(_) => 5,
            FsError::IsADirectory(_) => 6,
            FsError::AlreadyExists(_) => 7,
            FsError::NotEmpty(_) => 8,
            FsError::PermissionDenied(_) => 9,
            FsError::Io(_) => 10,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
