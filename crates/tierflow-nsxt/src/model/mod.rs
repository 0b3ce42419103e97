//! Wire models of the NSX-T control plane
//!
//! Field names follow the vendor's JSON schema. Optional vendor fields are
//! `Option<T>` and are omitted on the wire when `None`; an empty string is a
//! distinct value and is sent as-is.

pub mod manager;
pub mod policy;

use serde::{Deserialize, Serialize};

pub use manager::*;
pub use policy::*;

/// Scope/value pair attached to every NSX-T object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// One page of a cursor-based listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,

    /// Opaque cursor of the next page; absent or empty on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<i64>,
}

impl<T> ListResult<T> {
    pub fn single_page(results: Vec<T>) -> Self {
        let count = results.len() as i64;
        Self {
            results,
            cursor: None,
            result_count: Some(count),
        }
    }

    /// Cursor to request next, `None` when this is the last page
    pub fn next_cursor(&self) -> Option<String> {
        self.cursor.clone().filter(|c| !c.is_empty())
    }
}

/// Response of `GET /api/v1/node/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVersion {
    pub product_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
}

/// API generation of the control plane
///
/// Decides how DHCP is provided for the cluster segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiGeneration {
    /// Pre-3.0: DHCP only through the manager (advanced) API
    V2,
    /// 3.0 and later: DHCP server configs in the policy API
    V3,
}

impl ApiGeneration {
    /// Derive the generation from a product version like `3.1.2.0.0.17883603`.
    pub fn from_product_version(version: &str) -> Option<Self> {
        let major: u32 = version.split('.').next()?.trim().parse().ok()?;
        Some(if major >= 3 {
            ApiGeneration::V3
        } else {
            ApiGeneration::V2
        })
    }
}

impl std::fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiGeneration::V2 => write!(f, "v2"),
            ApiGeneration::V3 => write!(f, "v3"),
        }
    }
}
