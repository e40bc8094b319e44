// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! External filesystem collaborator
//!
//! The copy operations exchange whole files with the filesystem outside the
//! SDK's tree. That side is a black box to the core: all it must offer is
//! "read all bytes" and "write all bytes", with failures surfaced as
//! `FsError::Io`.

use std::fs;
use std::path::Path;

use crate::error::{FsError, FsResult};

/// Whole-file access to the local filesystem outside the SDK tree.
#[cfg_attr(test, mockall::automock)]
pub trait LocalInterchange: Send + Sync {
    /// Read the entire contents of the external file at `path`.
    fn read_all(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Write `data` to the external file at `path`, creating or truncating it.
    fn write_all(&self, path: &Path, data: &[u8]) -> FsResult<()>;
}

/// [`LocalInterchange`] backed by the host filesystem via `std::fs`.
pub struct HostLocalFs;

impl LocalInterchange for HostLocalFs {
    fn read_all(&self, path: &Path) -> FsResult<Vec<u8>> {
        fs::read(path).map_err(|err| FsError::Io(format!("{}: {err}", path.display())))
    }

    fn write_all(&self, path: &Path, data: &[u8]) -> FsResult<()> {
        fs::write(path, data).map_err(|err| FsError::Io(format!("{}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");

        let host = HostLocalFs;
        host.write_all(&path, b"round trip").unwrap();
        assert_eq!(host.read_all(&path).unwrap(), b"round trip");

        // Truncates on rewrite
        host.write_all(&path, b"x").unwrap();
        assert_eq!(host.read_all(&path).unwrap(), b"x");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostLocalFs.read_all(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.code(), 10);
        assert!(err.to_string().contains("absent"));
    }
}
