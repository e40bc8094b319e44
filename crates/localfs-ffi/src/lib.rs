// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! C ABI for the LocalFS SDK
//!
//! Ownership rules at this boundary:
//! - Input `localfs_bytes` are caller-owned views, valid for the call only.
//! - Output `localfs_bytes` are callee-allocated; the caller must pass them
//!   to [`localfs_bytes_free`] exactly once.
//! - A non-null `localfs_error` return signals failure and must be passed to
//!   [`localfs_error_free`] exactly once; a null return means success. An
//!   error is never paired with a populated output.
//! - `localfs_sdk` handles come from [`localfs_init`] and die in
//!   [`localfs_release`]. Handles are looked up in a process-wide registry
//!   on every call, so operations on a released handle fail closed with
//!   `InvalidHandle` instead of touching freed state.

#![allow(non_camel_case_types)]

use std::collections::HashMap;
use std::os::raw::{c_char, c_uint};
use std::ptr;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use tracing::debug;

use localfs_core::{FsCore, FsError, ROOT_ID};

/// The node ID of the root inode
pub const LOCALFS_ROOT_ID: u64 = ROOT_ID;

/// A contiguous byte run plus its length.
#[repr(C)]
pub struct localfs_bytes {
    pub data: *const u8,
    pub len: usize,
}

/// Error carrier: stable numeric class code plus a UTF-8 message.
#[repr(C)]
pub struct localfs_error {
    pub code: c_uint,
    pub message: localfs_bytes,
}

/// Attribute record copied out through a caller-provided location.
#[repr(C)]
pub struct localfs_file_stat {
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub perm: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
}

/// Opaque SDK handle. The pointer value is a registry key, never
/// dereferenced, so a stale handle cannot touch freed memory.
#[repr(C)]
pub struct localfs_sdk {
    _private: [u8; 0],
}

struct HandleTable {
    next_id: u64,
    entries: HashMap<u64, Arc<FsCore>>,
}

lazy_static! {
    static ref HANDLES: Mutex<HandleTable> = Mutex::new(HandleTable {
        next_id: 1,
        entries: HashMap::new(),
    });
}

fn handle_ptr(id: u64) -> *mut localfs_sdk {
    id as usize as *mut localfs_sdk
}

fn handle_id(sdk: *mut localfs_sdk) -> u64 {
    sdk as usize as u64
}

fn core_for(sdk: *mut localfs_sdk) -> Option<Arc<FsCore>> {
    if sdk.is_null() {
        return None;
    }
    HANDLES.lock().unwrap().entries.get(&handle_id(sdk)).cloned()
}

fn leak_bytes(data: Vec<u8>) -> localfs_bytes {
    let boxed = data.into_boxed_slice();
    let len = boxed.len();
    localfs_bytes {
        data: Box::into_raw(boxed) as *const u8,
        len,
    }
}

fn make_error(err: &FsError) -> *mut localfs_error {
    Box::into_raw(Box::new(localfs_error {
        code: err.code(),
        message: leak_bytes(err.to_string().into_bytes()),
    }))
}

fn result_to_error(result: Result<(), FsError>) -> *mut localfs_error {
    match result {
        Ok(()) => ptr::null_mut(),
        Err(err) => make_error(&err),
    }
}

fn path_arg<'a>(path: *const c_char) -> Result<&'a str, FsError> {
    if path.is_null() {
        return Err(FsError::InvalidPath("null path".to_string()));
    }
    unsafe { std::ffi::CStr::from_ptr(path) }
        .to_str()
        .map_err(|_| FsError::InvalidPath("path is not valid UTF-8".to_string()))
}

/// Initialize one SDK handle from an opaque configuration document.
///
/// On success writes the handle to `out_sdk` and returns null; on failure
/// writes null to `out_sdk` and returns a `ConfigError` carrier.
#[no_mangle]
pub extern "C" fn localfs_init(
    config: *const c_char,
    out_sdk: *mut *mut localfs_sdk,
) -> *mut localfs_error {
    if out_sdk.is_null() {
        return make_error(&FsError::Config("null output handle".to_string()));
    }
    unsafe { *out_sdk = ptr::null_mut() };
    if config.is_null() {
        return make_error(&FsError::Config("null configuration".to_string()));
    }
    let text = match unsafe { std::ffi::CStr::from_ptr(config) }.to_str() {
        Ok(text) => text,
        Err(_) => {
            return make_error(&FsError::Config("configuration is not valid UTF-8".to_string()))
        }
    };
    match FsCore::from_config_text(text) {
        Ok(core) => {
            let mut table = HANDLES.lock().unwrap();
            let id = table.next_id;
            table.next_id += 1;
            table.entries.insert(id, Arc::new(core));
            debug!(id, "sdk handle initialized");
            unsafe { *out_sdk = handle_ptr(id) };
            ptr::null_mut()
        }
        Err(err) => make_error(&err),
    }
}

/// Release a handle. The filesystem state is destroyed once the last
/// in-flight operation drops its reference. Safe to call with null; calling
/// anything else with the handle afterwards yields `InvalidHandle`.
#[no_mangle]
pub extern "C" fn localfs_release(sdk: *mut localfs_sdk) {
    if sdk.is_null() {
        return;
    }
    let id = handle_id(sdk);
    if HANDLES.lock().unwrap().entries.remove(&id).is_some() {
        debug!(id, "sdk handle released");
    }
}

/// True iff the path resolves to any entry. Unresolvable paths (and invalid
/// arguments) are false, never an error.
#[no_mangle]
pub extern "C" fn localfs_exists(sdk: *mut localfs_sdk, path: *const c_char) -> bool {
    let Some(core) = core_for(sdk) else {
        return false;
    };
    match path_arg(path) {
        Ok(path) => core.exists(path),
        Err(_) => false,
    }
}

#[no_mangle]
pub extern "C" fn localfs_mkdir(sdk: *mut localfs_sdk, path: *const c_char) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match path_arg(path) {
        Ok(path) => result_to_error(core.mkdir(path)),
        Err(err) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_delete_dir(
    sdk: *mut localfs_sdk,
    path: *const c_char,
    recursive: bool,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match path_arg(path) {
        Ok(path) => result_to_error(core.delete_dir(path, recursive)),
        Err(err) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_rename_path(
    sdk: *mut localfs_sdk,
    src_path: *const c_char,
    dest_path: *const c_char,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match (path_arg(src_path), path_arg(dest_path)) {
        (Ok(src), Ok(dest)) => result_to_error(core.rename_path(src, dest)),
        (Err(err), _) | (_, Err(err)) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_copy_from_local_file(
    sdk: *mut localfs_sdk,
    overwrite: bool,
    local_file_path: *const c_char,
    dest_file_path: *const c_char,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match (path_arg(local_file_path), path_arg(dest_file_path)) {
        (Ok(local), Ok(dest)) => result_to_error(core.copy_from_local_file(overwrite, local, dest)),
        (Err(err), _) | (_, Err(err)) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_copy_to_local_file(
    sdk: *mut localfs_sdk,
    src_file_path: *const c_char,
    local_file_path: *const c_char,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match (path_arg(src_file_path), path_arg(local_file_path)) {
        (Ok(src), Ok(local)) => result_to_error(core.copy_to_local_file(src, local)),
        (Err(err), _) | (_, Err(err)) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_create_file(
    sdk: *mut localfs_sdk,
    path: *const c_char,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match path_arg(path) {
        Ok(path) => result_to_error(core.create_file(path)),
        Err(err) => make_error(&err),
    }
}

#[no_mangle]
pub extern "C" fn localfs_delete_file(
    sdk: *mut localfs_sdk,
    path: *const c_char,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    match path_arg(path) {
        Ok(path) => result_to_error(core.delete_file(path)),
        Err(err) => make_error(&err),
    }
}

/// Copy the entry's attributes into `out_stat`. No ownership transfer.
#[no_mangle]
pub extern "C" fn localfs_stat(
    sdk: *mut localfs_sdk,
    path: *const c_char,
    out_stat: *mut localfs_file_stat,
) -> *mut localfs_error {
    if out_stat.is_null() {
        return make_error(&FsError::InvalidPath("null output stat".to_string()));
    }
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    let path = match path_arg(path) {
        Ok(path) => path,
        Err(err) => return make_error(&err),
    };
    match core.stat(path) {
        Ok(stat) => {
            unsafe {
                *out_stat = localfs_file_stat {
                    ino: stat.ino,
                    size: stat.size,
                    blocks: stat.blocks,
                    perm: stat.perm,
                    nlink: stat.nlink,
                    uid: stat.uid,
                    gid: stat.gid,
                    rdev: stat.rdev,
                };
            }
            ptr::null_mut()
        }
        Err(err) => make_error(&err),
    }
}

/// Replace the file's payload with the caller-owned `content` view.
#[no_mangle]
pub extern "C" fn localfs_write_file(
    sdk: *mut localfs_sdk,
    path: *const c_char,
    content: localfs_bytes,
) -> *mut localfs_error {
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    let path = match path_arg(path) {
        Ok(path) => path,
        Err(err) => return make_error(&err),
    };
    let data: &[u8] = if content.data.is_null() {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(content.data, content.len) }
    };
    result_to_error(core.write_file(path, data))
}

/// Read the whole file into a callee-allocated buffer written to
/// `out_content`. The caller owns the buffer and must release it with
/// [`localfs_bytes_free`].
#[no_mangle]
pub extern "C" fn localfs_read_file(
    sdk: *mut localfs_sdk,
    path: *const c_char,
    out_content: *mut localfs_bytes,
) -> *mut localfs_error {
    if out_content.is_null() {
        return make_error(&FsError::InvalidPath("null output buffer".to_string()));
    }
    unsafe {
        *out_content = localfs_bytes {
            data: ptr::null(),
            len: 0,
        };
    }
    let Some(core) = core_for(sdk) else {
        return make_error(&FsError::InvalidHandle);
    };
    let path = match path_arg(path) {
        Ok(path) => path,
        Err(err) => return make_error(&err),
    };
    match core.read_file(path) {
        Ok(data) => {
            unsafe { *out_content = leak_bytes(data) };
            ptr::null_mut()
        }
        Err(err) => make_error(&err),
    }
}

/// Release a callee-allocated buffer. Null data is a no-op.
#[no_mangle]
pub extern "C" fn localfs_bytes_free(bytes: localfs_bytes) {
    if bytes.data.is_null() {
        return;
    }
    let slice = ptr::slice_from_raw_parts_mut(bytes.data as *mut u8, bytes.len);
    drop(unsafe { Box::from_raw(slice) });
}

/// Release an error carrier and its message. Null is a no-op.
#[no_mangle]
pub extern "C" fn localfs_error_free(err: *mut localfs_error) {
    if err.is_null() {
        return;
    }
    let err = unsafe { Box::from_raw(err) };
    localfs_bytes_free(err.message);
}
