//! tierflow infrastructure pipeline
//!
//! Converges the network infrastructure of one cluster in an NSX-T control
//! plane and tears it down again.
//!
//! ```text
//! Spec ──► Ensurer ──► Task, Task, ... ──► PolicyApi / ManagerApi
//!             │
//!             ▼
//!           State ◄──► StateStore ──► KvBackend (memory, file)
//! ```
//!
//! Tasks run strictly in sequence. Each one reads the references written by
//! the tasks before it and adds its own, so the state is checkpointable after
//! any step and a later run resumes where an earlier one stopped.

pub mod action;
pub mod cidr;
pub mod context;
pub mod ensurer;
pub mod error;
pub mod spec;
pub mod state;
pub mod store;
pub mod tags;
pub mod task;

// Re-exports
pub use action::Action;
pub use context::{EnsurerContext, RealizationConfig};
pub use ensurer::{Ensurer, TaskOutcome};
pub use error::{InfraError, Result, StoreError, StoreResult};
pub use spec::Spec;
pub use state::{AdvancedDhcpState, Reference, STATE_VERSION, State};
pub use store::{FileBackend, KvBackend, MemoryBackend, StateStore};
pub use tags::ClusterIdentity;
pub use task::{Recoverable, Task};
