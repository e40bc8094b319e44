// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Filesystem state and the gated operation layer
//!
//! [`FsState`] is the path-addressed tree; it is plain data with no interior
//! locking. [`FsCore`] owns it behind one mutex and is the only way in:
//! every operation holds the gate for its full duration, which makes each of
//! them atomic as observed by concurrent callers.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::Mutex;

use tracing::debug;

use crate::config::{FsConfig, SecurityPolicy};
use crate::error::{FsError, FsResult};
use crate::local::{HostLocalFs, LocalInterchange};
use crate::types::{DirEntry, FileStat, ROOT_ID};

/// Internal node ID; equal to the node's inode number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) u64);

/// Filesystem node kinds — a closed set, no symlinks in this surface.
#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    File { data: Vec<u8> },
    Directory { children: HashMap<String, NodeId> },
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) mode: u32,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
}

impl Node {
    /// Classic owner/group/other mode-bit check. The configured identity is
    /// the caller; uid 0 bypasses everything.
    fn allowed(&self, policy: &SecurityPolicy, read: bool, write: bool, exec: bool) -> bool {
        if policy.uid == 0 {
            return true;
        }
        let shift = if policy.uid == self.uid {
            6
        } else if policy.gid == self.gid {
            3
        } else {
            0
        };
        let bits = (self.mode >> shift) & 0o7;
        (!read || bits & 0o4 != 0) && (!write || bits & 0o2 != 0) && (!exec || bits & 0o1 != 0)
    }

    fn stat(&self, id: NodeId) -> FileStat {
        match &self.kind {
            NodeKind::File { data } => FileStat {
                ino: id.0,
                size: data.len() as u64,
                blocks: (data.len() as u64).div_ceil(512),
                perm: libc::S_IFREG as u32 | self.mode,
                nlink: 1,
                uid: self.uid,
                gid: self.gid,
                rdev: 0,
            },
            NodeKind::Directory { .. } => FileStat {
                ino: id.0,
                size: 0,
                blocks: 0,
                perm: libc::S_IFDIR as u32 | self.mode,
                nlink: 2,
                uid: self.uid,
                gid: self.gid,
                rdev: 0,
            },
        }
    }
}

/// Split a path into its normal components.
///
/// Root, `.` and `..` components are dropped, so the result is the absolute
/// path relative to the tree root. Only genuinely empty paths are rejected.
fn normalize(path: &str) -> FsResult<Vec<String>> {
    if path.is_empty() {
        return Err(FsError::InvalidPath("empty path".to_string()));
    }
    Ok(Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str().map(str::to_string),
            _ => None,
        })
        .collect())
}

/// The mutable model of one local filesystem view.
#[derive(Debug)]
pub(crate) struct FsState {
    nodes: HashMap<NodeId, Node>,
    next_ino: u64,
}

impl FsState {
    fn new(policy: &SecurityPolicy) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId(ROOT_ID),
            Node {
                kind: NodeKind::Directory {
                    children: HashMap::new(),
                },
                mode: 0o755,
                uid: policy.uid,
                gid: policy.gid,
            },
        );
        Self {
            nodes,
            next_ino: ROOT_ID + 1,
        }
    }

    fn node(&self, id: NodeId, display: &str) -> FsResult<&Node> {
        self.nodes.get(&id).ok_or_else(|| FsError::NotFound(display.to_string()))
    }

    fn dir_children(&self, id: NodeId, display: &str) -> FsResult<&HashMap<String, NodeId>> {
        match &self.node(id, display)?.kind {
            NodeKind::Directory { children } => Ok(children),
            NodeKind::File { .. } => Err(FsError::NotADirectory(display.to_string())),
        }
    }

    fn insert_node(&mut self, kind: NodeKind, mode: u32, policy: &SecurityPolicy) -> NodeId {
        let id = NodeId(self.next_ino);
        self.next_ino += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                mode,
                uid: policy.uid,
                gid: policy.gid,
            },
        );
        id
    }

    fn link_child(&mut self, parent_id: NodeId, name: String, child: NodeId) {
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get_mut(&parent_id)
        {
            children.insert(name, child);
        }
    }

    fn unlink_child(&mut self, parent_id: NodeId, name: &str) {
        if let Some(Node {
            kind: NodeKind::Directory { children },
            ..
        }) = self.nodes.get_mut(&parent_id)
        {
            children.remove(name);
        }
    }

    /// Walk `comps` from the root, requiring every step to be a directory
    /// (and traversable when enforcement is on).
    fn walk(&self, comps: &[String], display: &str, policy: &SecurityPolicy) -> FsResult<NodeId> {
        let mut current = NodeId(ROOT_ID);
        for name in comps {
            let node = self.node(current, display)?;
            let NodeKind::Directory { children } = &node.kind else {
                return Err(FsError::NotADirectory(display.to_string()));
            };
            if policy.enforce_permissions && !node.allowed(policy, false, false, true) {
                return Err(FsError::PermissionDenied(display.to_string()));
            }
            current = children
                .get(name.as_str())
                .copied()
                .ok_or_else(|| FsError::NotFound(display.to_string()))?;
        }
        Ok(current)
    }

    /// Resolve a path to its node, plus the parent link for non-root entries.
    fn resolve(
        &self,
        path: &str,
        policy: &SecurityPolicy,
    ) -> FsResult<(NodeId, Option<(NodeId, String)>)> {
        let comps = normalize(path)?;
        let Some((name, dir)) = comps.split_last() else {
            return Ok((NodeId(ROOT_ID), None));
        };
        let parent_id = self.walk(dir, path, policy)?;
        let parent = self.node(parent_id, path)?;
        let NodeKind::Directory { children } = &parent.kind else {
            return Err(FsError::NotADirectory(path.to_string()));
        };
        if policy.enforce_permissions && !parent.allowed(policy, false, false, true) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        let id = children
            .get(name.as_str())
            .copied()
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        Ok((id, Some((parent_id, name.clone()))))
    }

    /// Resolve the parent for a creation, requiring the final segment absent.
    fn prepare_create(&self, path: &str, policy: &SecurityPolicy) -> FsResult<(NodeId, String)> {
        let comps = normalize(path)?;
        let Some((name, dir)) = comps.split_last() else {
            return Err(FsError::AlreadyExists(path.to_string()));
        };
        let parent_id = self.walk(dir, path, policy)?;
        let parent = self.node(parent_id, path)?;
        let NodeKind::Directory { children } = &parent.kind else {
            return Err(FsError::NotADirectory(path.to_string()));
        };
        if policy.enforce_permissions && !parent.allowed(policy, false, true, true) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        if children.contains_key(name.as_str()) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        Ok((parent_id, name.clone()))
    }

    fn check_parent_write(
        &self,
        parent_id: NodeId,
        display: &str,
        policy: &SecurityPolicy,
    ) -> FsResult<()> {
        if !policy.enforce_permissions {
            return Ok(());
        }
        let parent = self.node(parent_id, display)?;
        if !parent.allowed(policy, false, true, true) {
            return Err(FsError::PermissionDenied(display.to_string()));
        }
        Ok(())
    }

    fn remove_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                if let NodeKind::Directory { children } = node.kind {
                    stack.extend(children.into_values());
                }
            }
        }
    }

    fn mkdir(&mut self, path: &str, policy: &SecurityPolicy) -> FsResult<()> {
        let (parent_id, name) = self.prepare_create(path, policy)?;
        let id = self.insert_node(
            NodeKind::Directory {
                children: HashMap::new(),
            },
            0o755,
            policy,
        );
        self.link_child(parent_id, name, id);
        Ok(())
    }

    fn delete_dir(&mut self, path: &str, recursive: bool, policy: &SecurityPolicy) -> FsResult<()> {
        let (id, parent) = self.resolve(path, policy)?;
        let Some((parent_id, name)) = parent else {
            return Err(FsError::PermissionDenied(format!(
                "{path}: the root directory is not removable"
            )));
        };
        {
            let node = self.node(id, path)?;
            let NodeKind::Directory { children } = &node.kind else {
                return Err(FsError::NotADirectory(path.to_string()));
            };
            if !recursive && !children.is_empty() {
                return Err(FsError::NotEmpty(path.to_string()));
            }
        }
        self.check_parent_write(parent_id, path, policy)?;
        self.unlink_child(parent_id, &name);
        self.remove_subtree(id);
        Ok(())
    }

    fn rename(&mut self, src: &str, dest: &str, policy: &SecurityPolicy) -> FsResult<()> {
        let src_comps = normalize(src)?;
        let dest_comps = normalize(dest)?;
        if src_comps == dest_comps {
            return Ok(());
        }

        let (src_id, src_parent) = self.resolve(src, policy)?;
        let Some((src_parent_id, src_name)) = src_parent else {
            return Err(FsError::InvalidPath(format!(
                "{src}: cannot rename the root directory"
            )));
        };
        let Some((dest_name, dest_dir)) = dest_comps.split_last() else {
            return Err(FsError::InvalidPath(format!(
                "{dest}: cannot rename over the root directory"
            )));
        };

        let src_is_dir = matches!(self.node(src_id, src)?.kind, NodeKind::Directory { .. });
        if src_is_dir
            && dest_comps.len() > src_comps.len()
            && dest_comps[..src_comps.len()] == src_comps[..]
        {
            return Err(FsError::InvalidPath(format!(
                "{dest}: destination is inside {src}"
            )));
        }

        let dest_parent_id = self.walk(dest_dir, dest, policy)?;
        let existing = self.dir_children(dest_parent_id, dest)?.get(dest_name.as_str()).copied();

        self.check_parent_write(src_parent_id, src, policy)?;
        self.check_parent_write(dest_parent_id, dest, policy)?;

        if let Some(dest_id) = existing {
            if dest_id == src_id {
                return Ok(());
            }
            // Replacement is only allowed kind-over-same-kind.
            let dest_node = self.node(dest_id, dest)?;
            match (src_is_dir, &dest_node.kind) {
                (true, NodeKind::Directory { children }) => {
                    if !children.is_empty() {
                        return Err(FsError::NotEmpty(dest.to_string()));
                    }
                }
                (true, NodeKind::File { .. }) => {
                    return Err(FsError::NotADirectory(dest.to_string()))
                }
                (false, NodeKind::Directory { .. }) => {
                    return Err(FsError::IsADirectory(dest.to_string()))
                }
                (false, NodeKind::File { .. }) => {}
            }
            self.nodes.remove(&dest_id);
            self.unlink_child(dest_parent_id, dest_name);
        }

        self.unlink_child(src_parent_id, &src_name);
        self.link_child(dest_parent_id, dest_name.clone(), src_id);
        Ok(())
    }

    fn create_file_with(
        &mut self,
        path: &str,
        data: Vec<u8>,
        policy: &SecurityPolicy,
    ) -> FsResult<()> {
        let (parent_id, name) = self.prepare_create(path, policy)?;
        let id = self.insert_node(NodeKind::File { data }, 0o644, policy);
        self.link_child(parent_id, name, id);
        Ok(())
    }

    fn delete_file(&mut self, path: &str, policy: &SecurityPolicy) -> FsResult<()> {
        let (id, parent) = self.resolve(path, policy)?;
        let Some((parent_id, name)) = parent else {
            return Err(FsError::IsADirectory(path.to_string()));
        };
        if matches!(self.node(id, path)?.kind, NodeKind::Directory { .. }) {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        self.check_parent_write(parent_id, path, policy)?;
        self.unlink_child(parent_id, &name);
        self.nodes.remove(&id);
        Ok(())
    }

    fn write_file(&mut self, path: &str, data: Vec<u8>, policy: &SecurityPolicy) -> FsResult<()> {
        let (id, _) = self.resolve(path, policy)?;
        let node = self.nodes.get_mut(&id).ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if policy.enforce_permissions && !node.allowed(policy, false, true, false) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        match &mut node.kind {
            NodeKind::File { data: payload } => {
                *payload = data;
                Ok(())
            }
            NodeKind::Directory { .. } => Err(FsError::IsADirectory(path.to_string())),
        }
    }

    fn read_file(&self, path: &str, policy: &SecurityPolicy) -> FsResult<Vec<u8>> {
        let (id, _) = self.resolve(path, policy)?;
        let node = self.node(id, path)?;
        if policy.enforce_permissions && !node.allowed(policy, true, false, false) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        match &node.kind {
            NodeKind::File { data } => Ok(data.clone()),
            NodeKind::Directory { .. } => Err(FsError::IsADirectory(path.to_string())),
        }
    }

    /// Create-or-overwrite used by the copy-in operation.
    fn put_file(
        &mut self,
        overwrite: bool,
        dest: &str,
        data: Vec<u8>,
        policy: &SecurityPolicy,
    ) -> FsResult<()> {
        match self.resolve(dest, policy) {
            Ok((id, _)) => {
                let node =
                    self.nodes.get_mut(&id).ok_or_else(|| FsError::NotFound(dest.to_string()))?;
                if matches!(node.kind, NodeKind::Directory { .. }) {
                    return Err(FsError::IsADirectory(dest.to_string()));
                }
                if !overwrite {
                    return Err(FsError::AlreadyExists(dest.to_string()));
                }
                if policy.enforce_permissions && !node.allowed(policy, false, true, false) {
                    return Err(FsError::PermissionDenied(dest.to_string()));
                }
                if let NodeKind::File { data: payload } = &mut node.kind {
                    *payload = data;
                }
                Ok(())
            }
            Err(FsError::NotFound(_)) => self.create_file_with(dest, data, policy),
            Err(err) => Err(err),
        }
    }

    fn stat(&self, path: &str, policy: &SecurityPolicy) -> FsResult<FileStat> {
        let (id, _) = self.resolve(path, policy)?;
        Ok(self.node(id, path)?.stat(id))
    }

    fn read_dir(&self, path: &str, policy: &SecurityPolicy) -> FsResult<Vec<DirEntry>> {
        let (id, _) = self.resolve(path, policy)?;
        let node = self.node(id, path)?;
        let NodeKind::Directory { children } = &node.kind else {
            return Err(FsError::NotADirectory(path.to_string()));
        };
        if policy.enforce_permissions && !node.allowed(policy, true, false, false) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        let mut entries = children
            .iter()
            .map(|(name, child_id)| {
                let child = self.node(*child_id, path)?;
                Ok(DirEntry {
                    name: name.clone(),
                    is_dir: matches!(child.kind, NodeKind::Directory { .. }),
                    len: match &child.kind {
                        NodeKind::File { data } => data.len() as u64,
                        NodeKind::Directory { .. } => 0,
                    },
                })
            })
            .collect::<FsResult<Vec<_>>>()?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn set_mode(&mut self, path: &str, mode: u32, policy: &SecurityPolicy) -> FsResult<()> {
        let (id, _) = self.resolve(path, policy)?;
        if policy.enforce_permissions {
            let node = self.node(id, path)?;
            if policy.uid != 0 && policy.uid != node.uid {
                return Err(FsError::PermissionDenied(path.to_string()));
            }
        }
        let node = self.nodes.get_mut(&id).ok_or_else(|| FsError::NotFound(path.to_string()))?;
        node.mode = mode & 0o7777;
        Ok(())
    }
}

/// The filesystem client behind the SDK handle.
///
/// Thread-safe; share it with `Arc<FsCore>`. One mutex guards the whole
/// tree, so concurrent operations on the same instance are totally ordered
/// by gate acquisition.
pub struct FsCore {
    config: FsConfig,
    local: Box<dyn LocalInterchange>,
    state: Mutex<FsState>,
}

impl FsCore {
    pub fn new(config: FsConfig) -> Self {
        Self::with_local(config, Box::new(HostLocalFs))
    }

    /// Construct with a custom external-file collaborator (tests use a mock).
    pub fn with_local(config: FsConfig, local: Box<dyn LocalInterchange>) -> Self {
        let state = FsState::new(&config.security);
        Self {
            config,
            local,
            state: Mutex::new(state),
        }
    }

    /// Parse an opaque configuration document and construct the client.
    pub fn from_config_text(text: &str) -> FsResult<Self> {
        Ok(Self::new(FsConfig::from_json(text)?))
    }

    fn policy(&self) -> &SecurityPolicy {
        &self.config.security
    }

    /// True iff the path resolves to any entry kind. Never fails.
    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().resolve(path, self.policy()).is_ok()
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        self.state.lock().unwrap().mkdir(path, self.policy())?;
        debug!(path, "created directory");
        Ok(())
    }

    pub fn delete_dir(&self, path: &str, recursive: bool) -> FsResult<()> {
        self.state.lock().unwrap().delete_dir(path, recursive, self.policy())?;
        debug!(path, recursive, "removed directory");
        Ok(())
    }

    pub fn rename_path(&self, src: &str, dest: &str) -> FsResult<()> {
        self.state.lock().unwrap().rename(src, dest, self.policy())?;
        debug!(src, dest, "renamed");
        Ok(())
    }

    pub fn create_file(&self, path: &str) -> FsResult<()> {
        self.state.lock().unwrap().create_file_with(path, Vec::new(), self.policy())?;
        debug!(path, "created file");
        Ok(())
    }

    pub fn delete_file(&self, path: &str) -> FsResult<()> {
        self.state.lock().unwrap().delete_file(path, self.policy())?;
        debug!(path, "removed file");
        Ok(())
    }

    /// Replace the file's payload wholesale. Does not create on write.
    pub fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        self.state.lock().unwrap().write_file(path, data.to_vec(), self.policy())
    }

    /// Return a copy of the file's current payload.
    pub fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.state.lock().unwrap().read_file(path, self.policy())
    }

    pub fn stat(&self, path: &str) -> FsResult<FileStat> {
        self.state.lock().unwrap().stat(path, self.policy())
    }

    pub fn read_dir(&self, path: &str) -> FsResult<Vec<DirEntry>> {
        self.state.lock().unwrap().read_dir(path, self.policy())
    }

    pub fn set_mode(&self, path: &str, mode: u32) -> FsResult<()> {
        self.state.lock().unwrap().set_mode(path, mode, self.policy())
    }

    /// Copy an external file into the tree, creating or (with `overwrite`)
    /// replacing `dest_path`.
    ///
    /// The external read happens before the gate is taken so a slow source
    /// cannot stall other operations; the existence check and the write are
    /// one critical section.
    pub fn copy_from_local_file(
        &self,
        overwrite: bool,
        local_path: &str,
        dest_path: &str,
    ) -> FsResult<()> {
        let data = self.local.read_all(Path::new(local_path))?;
        self.state.lock().unwrap().put_file(overwrite, dest_path, data, self.policy())?;
        debug!(local_path, dest_path, "copied in from local file");
        Ok(())
    }

    /// Copy a file out of the tree to the external filesystem, creating or
    /// truncating the destination. The external write happens after the gate
    /// is released.
    pub fn copy_to_local_file(&self, src_path: &str, local_path: &str) -> FsResult<()> {
        let data = self.state.lock().unwrap().read_file(src_path, self.policy())?;
        self.local.write_all(Path::new(local_path), &data)?;
        debug!(src_path, local_path, "copied out to local file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MockLocalInterchange;

    fn core() -> FsCore {
        FsCore::new(FsConfig::default())
    }

    fn enforcing_core(uid: u32, gid: u32) -> FsCore {
        let config = FsConfig::from_json(&format!(
            r#"{{"security": {{"enforce_permissions": true, "uid": {uid}, "gid": {gid}}}}}"#
        ))
        .unwrap();
        FsCore::new(config)
    }

    #[test]
    fn missing_paths_do_not_exist() {
        let fs = core();
        assert!(!fs.exists("/nope"));
        assert!(!fs.exists("/nope/deeper"));
        assert_eq!(fs.stat("/nope").unwrap_err().code(), 4);
    }

    #[test]
    fn empty_path_is_invalid() {
        let fs = core();
        assert!(matches!(fs.mkdir("").unwrap_err(), FsError::InvalidPath(_)));
        assert!(!fs.exists(""));
    }

    #[test]
    fn root_always_exists() {
        let fs = core();
        assert!(fs.exists("/"));
        let stat = fs.stat("/").unwrap();
        assert_eq!(stat.ino, ROOT_ID);
        assert_eq!(stat.perm & libc::S_IFMT as u32, libc::S_IFDIR as u32);
        assert_eq!(stat.nlink, 2);
    }

    #[test]
    fn mkdir_then_exists() {
        let fs = core();
        fs.mkdir("/a").unwrap();
        assert!(fs.exists("/a"));
        assert_eq!(fs.mkdir("/a").unwrap_err().code(), 7);
    }

    #[test]
    fn mkdir_does_not_create_parents() {
        let fs = core();
        assert!(matches!(fs.mkdir("/a/b").unwrap_err(), FsError::NotFound(_)));
    }

    #[test]
    fn file_in_the_middle_is_not_a_directory() {
        let fs = core();
        fs.create_file("/f").unwrap();
        assert!(matches!(fs.mkdir("/f/sub").unwrap_err(), FsError::NotADirectory(_)));
        assert!(matches!(fs.stat("/f/sub").unwrap_err(), FsError::NotADirectory(_)));
    }

    #[test]
    fn delete_dir_respects_recursive_flag() {
        let fs = core();
        fs.mkdir("/a").unwrap();
        fs.mkdir("/a/b").unwrap();
        fs.create_file("/a/b/f").unwrap();

        assert!(matches!(fs.delete_dir("/a", false).unwrap_err(), FsError::NotEmpty(_)));
        assert!(fs.exists("/a/b/f"));

        fs.delete_dir("/a", true).unwrap();
        assert!(!fs.exists("/a"));
        assert!(!fs.exists("/a/b"));
        assert!(!fs.exists("/a/b/f"));
    }

    #[test]
    fn delete_dir_on_file_is_not_a_directory() {
        let fs = core();
        fs.create_file("/f").unwrap();
        assert!(matches!(fs.delete_dir("/f", false).unwrap_err(), FsError::NotADirectory(_)));
    }

    #[test]
    fn root_is_never_removable() {
        let fs = core();
        assert_eq!(fs.delete_dir("/", true).unwrap_err().code(), 9);
        assert!(fs.exists("/"));
    }

    #[test]
    fn file_round_trip() {
        let fs = core();
        fs.create_file("/f").unwrap();
        assert_eq!(fs.read_file("/f").unwrap(), Vec::<u8>::new());

        fs.write_file("/f", b"some bytes").unwrap();
        assert_eq!(fs.read_file("/f").unwrap(), b"some bytes");

        // Wholesale replace, not append
        fs.write_file("/f", b"x").unwrap();
        assert_eq!(fs.read_file("/f").unwrap(), b"x");

        // Empty payloads are fine too
        fs.write_file("/f", b"").unwrap();
        assert_eq!(fs.read_file("/f").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn write_does_not_create() {
        let fs = core();
        assert!(matches!(fs.write_file("/f", b"data").unwrap_err(), FsError::NotFound(_)));
    }

    #[test]
    fn file_operations_reject_directories() {
        let fs = core();
        fs.mkdir("/d").unwrap();
        assert_eq!(fs.write_file("/d", b"x").unwrap_err().code(), 6);
        assert_eq!(fs.read_file("/d").unwrap_err().code(), 6);
        assert_eq!(fs.delete_file("/d").unwrap_err().code(), 6);
    }

    #[test]
    fn stat_tracks_payload() {
        let fs = core();
        fs.create_file("/f").unwrap();
        let before = fs.stat("/f").unwrap();
        assert_eq!(before.size, 0);
        assert_eq!(before.blocks, 0);
        assert_eq!(before.nlink, 1);
        assert_eq!(before.perm & libc::S_IFMT as u32, libc::S_IFREG as u32);
        assert_eq!(before.perm & 0o777, 0o644);

        fs.write_file("/f", &[7u8; 513]).unwrap();
        let after = fs.stat("/f").unwrap();
        assert_eq!(after.size, 513);
        assert_eq!(after.blocks, 2);
        // ino assigned at creation stays stable across writes
        assert_eq!(after.ino, before.ino);
    }

    #[test]
    fn create_assigns_fresh_inodes() {
        let fs = core();
        fs.create_file("/a").unwrap();
        fs.create_file("/b").unwrap();
        let a = fs.stat("/a").unwrap();
        let b = fs.stat("/b").unwrap();
        assert_ne!(a.ino, b.ino);
        assert_ne!(a.ino, ROOT_ID);
    }

    #[test]
    fn rename_moves_content_and_attributes() {
        let fs = core();
        fs.mkdir("/a").unwrap();
        fs.create_file("/a/f").unwrap();
        fs.write_file("/a/f", b"payload").unwrap();
        let before = fs.stat("/a/f").unwrap();

        fs.rename_path("/a/f", "/g").unwrap();
        assert!(!fs.exists("/a/f"));
        assert!(fs.exists("/g"));
        assert_eq!(fs.read_file("/g").unwrap(), b"payload");
        let after = fs.stat("/g").unwrap();
        assert_eq!(after.ino, before.ino);
        assert_eq!(after.size, before.size);
    }

    #[test]
    fn rename_replaces_only_same_kind() {
        let fs = core();
        fs.create_file("/f1").unwrap();
        fs.write_file("/f1", b"one").unwrap();
        fs.create_file("/f2").unwrap();
        fs.write_file("/f2", b"two").unwrap();
        fs.mkdir("/d1").unwrap();
        fs.mkdir("/d2").unwrap();

        // file over file replaces content
        fs.rename_path("/f1", "/f2").unwrap();
        assert!(!fs.exists("/f1"));
        assert_eq!(fs.read_file("/f2").unwrap(), b"one");

        // file over directory / directory over file are rejected
        assert_eq!(fs.rename_path("/f2", "/d1").unwrap_err().code(), 6);
        assert_eq!(fs.rename_path("/d1", "/f2").unwrap_err().code(), 5);

        // directory over empty directory is allowed
        fs.rename_path("/d1", "/d2").unwrap();
        assert!(!fs.exists("/d1"));
        assert!(fs.exists("/d2"));

        // ... but not over a non-empty one
        fs.mkdir("/d3").unwrap();
        fs.create_file("/d2/child").unwrap();
        assert_eq!(fs.rename_path("/d3", "/d2").unwrap_err().code(), 8);
    }

    #[test]
    fn rename_rejects_own_subtree() {
        let fs = core();
        fs.mkdir("/a").unwrap();
        assert!(matches!(fs.rename_path("/a", "/a/b").unwrap_err(), FsError::InvalidPath(_)));
        assert!(matches!(fs.rename_path("/", "/a/b").unwrap_err(), FsError::InvalidPath(_)));
    }

    #[test]
    fn rename_to_self_is_a_no_op() {
        let fs = core();
        fs.create_file("/f").unwrap();
        fs.write_file("/f", b"same").unwrap();
        fs.rename_path("/f", "/f").unwrap();
        assert_eq!(fs.read_file("/f").unwrap(), b"same");
    }

    #[test]
    fn rename_needs_existing_dest_parent() {
        let fs = core();
        fs.create_file("/f").unwrap();
        assert!(matches!(fs.rename_path("/f", "/missing/f").unwrap_err(), FsError::NotFound(_)));
    }

    #[test]
    fn delete_file_removes_entry() {
        let fs = core();
        fs.create_file("/f").unwrap();
        fs.delete_file("/f").unwrap();
        assert!(!fs.exists("/f"));
        assert_eq!(fs.delete_file("/f").unwrap_err().code(), 4);
    }

    #[test]
    fn read_dir_lists_children() {
        let fs = core();
        fs.mkdir("/d").unwrap();
        fs.mkdir("/d/sub").unwrap();
        fs.create_file("/d/f").unwrap();
        fs.write_file("/d/f", b"abc").unwrap();

        let entries = fs.read_dir("/d").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "f");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].len, 3);
        assert_eq!(entries[1].name, "sub");
        assert!(entries[1].is_dir);

        assert!(matches!(fs.read_dir("/d/f").unwrap_err(), FsError::NotADirectory(_)));
    }

    #[test]
    fn permission_gate_is_bypassed_when_disabled() {
        let fs = core();
        fs.mkdir("/locked").unwrap();
        fs.set_mode("/locked", 0).unwrap();
        fs.mkdir("/locked/inside").unwrap();
        assert!(fs.exists("/locked/inside"));
    }

    #[test]
    fn permission_gate_denies_unwritable_parent() {
        let fs = enforcing_core(1000, 1000);
        fs.mkdir("/locked").unwrap();
        fs.set_mode("/locked", 0o500).unwrap();
        assert_eq!(fs.mkdir("/locked/inside").unwrap_err().code(), 9);

        fs.set_mode("/locked", 0o700).unwrap();
        fs.mkdir("/locked/inside").unwrap();
    }

    #[test]
    fn permission_gate_denies_unreadable_file() {
        let fs = enforcing_core(1000, 1000);
        fs.create_file("/secret").unwrap();
        fs.set_mode("/secret", 0o200).unwrap();
        assert_eq!(fs.read_file("/secret").unwrap_err().code(), 9);
        fs.write_file("/secret", b"still writable").unwrap();
    }

    #[test]
    fn uid_zero_bypasses_mode_bits() {
        let fs = enforcing_core(0, 0);
        fs.mkdir("/locked").unwrap();
        fs.set_mode("/locked", 0).unwrap();
        fs.mkdir("/locked/inside").unwrap();
    }

    #[test]
    fn copy_from_local_creates_dest() {
        let mut local = MockLocalInterchange::new();
        local
            .expect_read_all()
            .withf(|p| p == Path::new("/tmp/in.bin"))
            .times(1)
            .returning(|_| Ok(b"payload".to_vec()));

        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        fs.copy_from_local_file(false, "/tmp/in.bin", "/dest.bin").unwrap();
        assert_eq!(fs.read_file("/dest.bin").unwrap(), b"payload");
    }

    #[test]
    fn copy_from_local_respects_overwrite_flag() {
        let mut local = MockLocalInterchange::new();
        local.expect_read_all().returning(|_| Ok(b"new".to_vec()));

        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        fs.create_file("/dest").unwrap();
        fs.write_file("/dest", b"old").unwrap();

        assert_eq!(fs.copy_from_local_file(false, "/tmp/in", "/dest").unwrap_err().code(), 7);
        assert_eq!(fs.read_file("/dest").unwrap(), b"old");

        fs.copy_from_local_file(true, "/tmp/in", "/dest").unwrap();
        assert_eq!(fs.read_file("/dest").unwrap(), b"new");
    }

    #[test]
    fn copy_from_local_rejects_directory_dest() {
        let mut local = MockLocalInterchange::new();
        local.expect_read_all().returning(|_| Ok(Vec::new()));

        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        fs.mkdir("/d").unwrap();
        assert_eq!(fs.copy_from_local_file(true, "/tmp/in", "/d").unwrap_err().code(), 6);
    }

    #[test]
    fn copy_from_local_surfaces_io_errors() {
        let mut local = MockLocalInterchange::new();
        local.expect_read_all().returning(|_| Err(FsError::Io("/tmp/in: gone".to_string())));

        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        assert_eq!(fs.copy_from_local_file(false, "/tmp/in", "/dest").unwrap_err().code(), 10);
        assert!(!fs.exists("/dest"));
    }

    #[test]
    fn copy_to_local_writes_payload() {
        let mut local = MockLocalInterchange::new();
        local
            .expect_write_all()
            .withf(|p, data| p == Path::new("/tmp/out.bin") && data == b"payload")
            .times(1)
            .returning(|_, _| Ok(()));

        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        fs.create_file("/src").unwrap();
        fs.write_file("/src", b"payload").unwrap();
        fs.copy_to_local_file("/src", "/tmp/out.bin").unwrap();
    }

    #[test]
    fn copy_to_local_rejects_missing_or_directory_src() {
        // No write_all expectation: the mock panics if the sink is touched.
        let local = MockLocalInterchange::new();
        let fs = FsCore::with_local(FsConfig::default(), Box::new(local));
        fs.mkdir("/d").unwrap();

        assert_eq!(fs.copy_to_local_file("/missing", "/tmp/out").unwrap_err().code(), 4);
        assert_eq!(fs.copy_to_local_file("/d", "/tmp/out").unwrap_err().code(), 6);
    }

    #[test]
    fn normalize_drops_non_normal_components() {
        assert_eq!(normalize("/a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(normalize("a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(normalize("/a//b/").unwrap(), vec!["a", "b"]);
        assert_eq!(normalize("/").unwrap(), Vec::<String>::new());
        assert!(matches!(normalize("").unwrap_err(), FsError::InvalidPath(_)));
    }
}
