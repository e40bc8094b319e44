// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! LocalFS SDK core
//!
//! A concurrency-safe, path-addressed local filesystem client. The whole
//! tree lives behind a single mutation gate owned by [`FsCore`]; every
//! operation acquires the gate for its full duration, so concurrent callers
//! observe each operation as atomic. Results are always copies; no
//! reference into the tree outlives the call that produced it.

pub mod config;
pub mod error;
pub mod local;
pub mod types;
pub mod vfs;

pub use config::{FsConfig, SecurityPolicy};
pub use error::{FsError, FsResult};
pub use local::{HostLocalFs, LocalInterchange};
pub use types::{DirEntry, FileStat, ROOT_ID};
pub use vfs::FsCore;
