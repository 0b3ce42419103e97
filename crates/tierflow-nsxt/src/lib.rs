//! tierflow NSX-T access layer
//!
//! Typed clients for the two NSX-T API families a cluster network touches:
//!
//! - **Policy API** (`/policy/api/v1`): declarative objects addressed by
//!   path, created and updated with `PATCH`
//! - **Manager API** (`/api/v1`): imperative objects with server-assigned
//!   ids and `_revision` based updates, needed for DHCP before 3.0
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              tierflow-infra              │
//! │      tasks ─► PolicyApi / ManagerApi     │
//! └─────────────────┬────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────┐
//! │              tierflow-nsxt               │
//! │  Connector ─► PolicyClient, ManagerClient│
//! │       RestClient (auth, retries)         │
//! └──────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod connector;
pub mod error;
#[cfg(feature = "test-utils")]
pub mod fake;
pub mod model;
pub mod paging;
pub mod paths;
pub mod transport;

// Re-exports
pub use api::{ManagerApi, PolicyApi};
pub use auth::{Credentials, TokenCache};
pub use client::{ManagerClient, PolicyClient};
pub use connector::{Connector, ConnectorConfig, TlsConfig};
pub use error::{NsxtError, Result};
pub use model::{ApiGeneration, ListResult, NodeVersion, Tag};
pub use transport::{RestClient, RetryConfig};
