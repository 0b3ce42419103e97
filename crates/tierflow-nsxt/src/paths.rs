//! Object paths in the policy tree and resource paths of the manager API
//!
//! Policy paths are the identifiers other policy objects refer to, e.g. a
//! segment's `connectivity_path` is the path of its tier-1 gateway.

/// Default enforcement point holding transport zones and edge clusters
pub const ENFORCEMENT_POINT: &str = "/infra/sites/default/enforcement-points/default";

/// NAT section of user-defined rules
pub const NAT_SECTION: &str = "USER";

pub fn tier0s() -> String {
    "/infra/tier-0s".to_string()
}

pub fn tier1(id: &str) -> String {
    format!("/infra/tier-1s/{}", id)
}

pub fn locale_service(tier1_id: &str, id: &str) -> String {
    format!("{}/locale-services/{}", tier1(tier1_id), id)
}

pub fn segment(tier1_id: &str, id: &str) -> String {
    format!("{}/segments/{}", tier1(tier1_id), id)
}

pub fn transport_zones() -> String {
    format!("{}/transport-zones", ENFORCEMENT_POINT)
}

pub fn edge_clusters() -> String {
    format!("{}/edge-clusters", ENFORCEMENT_POINT)
}

pub fn ip_pools() -> String {
    "/infra/ip-pools".to_string()
}

pub fn ip_allocation(pool_id: &str, id: &str) -> String {
    format!("{}/{}/ip-allocations/{}", ip_pools(), pool_id, id)
}

pub fn nat_rule(tier1_id: &str, id: &str) -> String {
    format!("{}/nat/{}/nat-rules/{}", tier1(tier1_id), NAT_SECTION, id)
}

pub fn dhcp_server_config(id: &str) -> String {
    format!("/infra/dhcp-server-configs/{}", id)
}

pub fn lb_object(collection: &str, id: &str) -> String {
    format!("/infra/{}/{}", collection, id)
}

pub fn dhcp_profile(id: &str) -> String {
    format!("/api/v1/dhcp/server-profiles/{}", id)
}

pub fn dhcp_server(id: &str) -> String {
    format!("/api/v1/dhcp/servers/{}", id)
}

pub fn dhcp_ip_pool(server_id: &str, id: &str) -> String {
    format!("{}/ip-pools/{}", dhcp_server(server_id), id)
}

pub fn logical_port(id: &str) -> String {
    format!("/api/v1/logical-ports/{}", id)
}

pub fn logical_switch(id: &str) -> String {
    format!("/api/v1/logical-switches/{}", id)
}

/// Last path segment, i.e. the object id of a policy path
pub fn id_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Id of the tier-1 gateway a nested policy path lives under
pub fn tier1_id_of(path: &str) -> Option<&str> {
    path.strip_prefix("/infra/tier-1s/")?
        .split('/')
        .next()
        .filter(|id| !id.is_empty())
}
