// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for the LocalFS SDK

/// The node ID of the root inode
pub const ROOT_ID: u64 = 1;

/// File attributes as returned by inspection operations.
///
/// `size` and `blocks` are recomputed from the payload at every inspection;
/// `ino` is assigned once at creation and stable for the entry's lifetime.
/// Directories report a conventional zero size and block count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    /// File type bits plus permission bits (`S_IFREG`/`S_IFDIR` | mode).
    pub perm: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
}

/// Directory entry information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub len: u64,
}
