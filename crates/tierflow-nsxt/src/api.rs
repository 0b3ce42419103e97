//! Control-plane API traits
//!
//! Tasks only talk to the control plane through these traits so that the
//! HTTP clients and the in-memory fake are interchangeable.

use crate::error::Result;
use crate::model::{
    DhcpIpPool, DhcpProfile, DhcpServerConfig, IpAddressAllocation, LbKind, ListResult,
    LocaleServices, LogicalDhcpServer, LogicalPort, LogicalSwitch, PolicyNatRule, PolicyObject,
    RealizedEntity, Segment, Tier1,
};
use async_trait::async_trait;

/// Declarative policy API (`/policy/api/v1`)
///
/// `patch_*` calls create or update the object under the given id.
#[async_trait]
pub trait PolicyApi: Send + Sync {
    async fn list_tier0s(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>>;

    async fn list_transport_zones(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>>;

    async fn list_edge_clusters(&self, cursor: Option<String>)
    -> Result<ListResult<PolicyObject>>;

    async fn list_ip_pools(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>>;

    async fn get_tier1(&self, id: &str) -> Result<Tier1>;

    async fn patch_tier1(&self, id: &str, tier1: &Tier1) -> Result<()>;

    async fn delete_tier1(&self, id: &str) -> Result<()>;

    async fn get_locale_service(&self, tier1_id: &str, id: &str) -> Result<LocaleServices>;

    async fn patch_locale_service(
        &self,
        tier1_id: &str,
        id: &str,
        service: &LocaleServices,
    ) -> Result<()>;

    async fn delete_locale_service(&self, tier1_id: &str, id: &str) -> Result<()>;

    async fn get_segment(&self, tier1_id: &str, id: &str) -> Result<Segment>;

    async fn patch_segment(&self, tier1_id: &str, id: &str, segment: &Segment) -> Result<()>;

    async fn delete_segment(&self, tier1_id: &str, id: &str) -> Result<()>;

    async fn get_ip_allocation(&self, pool_id: &str, id: &str) -> Result<IpAddressAllocation>;

    async fn patch_ip_allocation(
        &self,
        pool_id: &str,
        id: &str,
        allocation: &IpAddressAllocation,
    ) -> Result<()>;

    async fn delete_ip_allocation(&self, pool_id: &str, id: &str) -> Result<()>;

    /// Realized entities of an intent path
    async fn list_realized_entities(&self, intent_path: &str) -> Result<Vec<RealizedEntity>>;

    async fn get_nat_rule(&self, tier1_id: &str, id: &str) -> Result<PolicyNatRule>;

    async fn patch_nat_rule(&self, tier1_id: &str, id: &str, rule: &PolicyNatRule)
    -> Result<()>;

    async fn delete_nat_rule(&self, tier1_id: &str, id: &str) -> Result<()>;

    async fn get_dhcp_server_config(&self, id: &str) -> Result<DhcpServerConfig>;

    async fn patch_dhcp_server_config(&self, id: &str, config: &DhcpServerConfig) -> Result<()>;

    async fn delete_dhcp_server_config(&self, id: &str) -> Result<()>;

    async fn list_lb_objects(
        &self,
        kind: LbKind,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>>;

    async fn delete_lb_object(&self, kind: LbKind, id: &str) -> Result<()>;
}

/// Manager (advanced) API (`/api/v1`)
///
/// Creation assigns the id server-side; updates must carry the `_revision`
/// read before.
#[async_trait]
pub trait ManagerApi: Send + Sync {
    async fn list_logical_switches(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalSwitch>>;

    async fn list_dhcp_profiles(&self, cursor: Option<String>) -> Result<ListResult<DhcpProfile>>;

    async fn get_dhcp_profile(&self, id: &str) -> Result<DhcpProfile>;

    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<DhcpProfile>;

    async fn update_dhcp_profile(&self, id: &str, profile: &DhcpProfile) -> Result<DhcpProfile>;

    async fn delete_dhcp_profile(&self, id: &str) -> Result<()>;

    async fn list_dhcp_servers(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalDhcpServer>>;

    async fn get_dhcp_server(&self, id: &str) -> Result<LogicalDhcpServer>;

    async fn create_dhcp_server(&self, server: &LogicalDhcpServer) -> Result<LogicalDhcpServer>;

    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<LogicalDhcpServer>;

    async fn delete_dhcp_server(&self, id: &str) -> Result<()>;

    async fn list_logical_ports(&self, cursor: Option<String>) -> Result<ListResult<LogicalPort>>;

    async fn get_logical_port(&self, id: &str) -> Result<LogicalPort>;

    async fn create_logical_port(&self, port: &LogicalPort) -> Result<LogicalPort>;

    async fn update_logical_port(&self, id: &str, port: &LogicalPort) -> Result<LogicalPort>;

    /// Deletes the port and detaches whatever is attached to it
    async fn delete_logical_port(&self, id: &str) -> Result<()>;

    async fn list_dhcp_ip_pools(
        &self,
        server_id: &str,
        cursor: Option<String>,
    ) -> Result<ListResult<DhcpIpPool>>;

    async fn get_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<DhcpIpPool>;

    async fn create_dhcp_ip_pool(&self, server_id: &str, pool: &DhcpIpPool) -> Result<DhcpIpPool>;

    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<DhcpIpPool>;

    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<()>;
}
