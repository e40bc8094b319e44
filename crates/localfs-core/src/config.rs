// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the LocalFS SDK core
//!
//! The SDK is initialized from an opaque JSON document handed across the
//! boundary. Every field has a default, so `{}` is a valid configuration.

use serde::Deserialize;

use crate::error::{FsError, FsResult};

/// Top-level SDK configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    pub security: SecurityPolicy,
}

/// Permission enforcement policy
///
/// `uid`/`gid` serve double duty: they are the identity operations are
/// checked against when enforcement is on, and the ownership stamped onto
/// newly created nodes.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityPolicy {
    /// When false, all permission checks are bypassed entirely.
    pub enforce_permissions: bool,
    pub uid: u32,
    pub gid: u32,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enforce_permissions: false,
            uid: 0,
            gid: 0,
        }
    }
}

impl FsConfig {
    /// Parse a configuration document as received from the boundary.
    pub fn from_json(text: &str) -> FsResult<Self> {
        serde_json::from_str(text).map_err(|err| FsError::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = FsConfig::from_json("{}").unwrap();
        assert!(!config.security.enforce_permissions);
        assert_eq!(config.security.uid, 0);
        assert_eq!(config.security.gid, 0);
    }

    #[test]
    fn full_document_round_trips() {
        let config = FsConfig::from_json(
            r#"{"security": {"enforce_permissions": true, "uid": 1000, "gid": 1000}}"#,
        )
        .unwrap();
        assert!(config.security.enforce_permissions);
        assert_eq!(config.security.uid, 1000);
        assert_eq!(config.security.gid, 1000);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = FsConfig::from_json("not json").unwrap_err();
        assert_eq!(err.code(), 1);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = FsConfig::from_json(r#"{"sekurity": {}}"#).unwrap_err();
        assert!(matches!(err, FsError::Config(_)));
    }
}
