//! HTTP implementations of the control-plane API traits

mod manager;
mod policy;

pub use manager::ManagerClient;
pub use policy::PolicyClient;
