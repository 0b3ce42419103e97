//! In-memory control plane for tests
//!
//! Implements both API traits over plain maps with the referential checks
//! of the real control plane (a tier-1 gateway cannot be deleted while
//! segments hang off it, and so on), delayed IP realization, fault
//! injection and a call log.

use crate::api::{ManagerApi, PolicyApi};
use crate::error::{NsxtError, Result};
use crate::model::{
    AttributeVal, DhcpIpPool, DhcpProfile, DhcpServerConfig, IpAddressAllocation, LbKind,
    ListResult, LocaleServices, LogicalDhcpServer, LogicalPort, LogicalSwitch, PolicyNatRule,
    PolicyObject, RealizedEntity, Segment, Tag, Tier1,
};
use crate::paths;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// Tag scope linking a realized logical switch to its policy segment
pub const POLICY_PATH_SCOPE: &str = "policyPath";

#[derive(Default)]
struct Inner {
    tier0s: Vec<PolicyObject>,
    transport_zones: Vec<PolicyObject>,
    edge_clusters: Vec<PolicyObject>,
    ip_pools: Vec<PolicyObject>,
    lb_objects: HashMap<&'static str, Vec<PolicyObject>>,

    tier1s: BTreeMap<String, Tier1>,
    locale_services: BTreeMap<(String, String), LocaleServices>,
    segments: BTreeMap<(String, String), Segment>,
    allocations: BTreeMap<(String, String), IpAddressAllocation>,
    pending_realization: HashMap<String, u32>,
    realized_ips: HashMap<String, String>,
    nat_rules: BTreeMap<(String, String), PolicyNatRule>,
    dhcp_configs: BTreeMap<String, DhcpServerConfig>,

    logical_switches: Vec<LogicalSwitch>,
    dhcp_profiles: BTreeMap<String, DhcpProfile>,
    dhcp_servers: BTreeMap<String, LogicalDhcpServer>,
    logical_ports: BTreeMap<String, LogicalPort>,
    dhcp_ip_pools: BTreeMap<(String, String), DhcpIpPool>,

    calls: Vec<String>,
    failures: HashSet<String>,
    next_ip: u32,
}

/// In-memory NSX-T
pub struct FakeNsxt {
    inner: Mutex<Inner>,
    page_size: usize,
    realization_polls: u32,
    realize_switches: bool,
}

impl Default for FakeNsxt {
    fn default() -> Self {
        Self::new()
    }
}

fn object(kind: &str, id: &str, display_name: &str) -> PolicyObject {
    PolicyObject {
        id: id.to_string(),
        path: format!("{}/{}", kind, id),
        display_name: Some(display_name.to_string()),
        tags: Vec::new(),
    }
}

fn not_found(what: impl Into<String>) -> NsxtError {
    NsxtError::NotFound(what.into())
}

fn in_use(what: &str) -> NsxtError {
    NsxtError::Api {
        status: 400,
        code: Some(500030),
        message: format!("{} is still in use", what),
    }
}

fn page<T: Clone>(items: &[T], cursor: Option<String>, size: usize) -> ListResult<T> {
    let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
    let end = (start + size).min(items.len());
    let results = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    ListResult {
        results,
        cursor: (end < items.len()).then(|| end.to_string()),
        result_count: Some(items.len() as i64),
    }
}

impl FakeNsxt {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_ip: 10,
                ..Inner::default()
            }),
            page_size: 2,
            realization_polls: 1,
            realize_switches: true,
        }
    }

    /// Control plane pre-populated with the objects of a typical region
    ///
    /// Names: tier-0 `tier0-gw`, transport zone `tz-overlay`, edge cluster
    /// `edge-cluster-1`, IP pool `snat-pool`, each among a few decoys so
    /// lookups have to page.
    pub fn with_region() -> Self {
        let fake = Self::new();
        {
            let mut inner = fake.lock();
            inner.tier0s = vec![
                object("/infra/tier-0s", "t0-other", "other-gw"),
                object("/infra/tier-0s", "t0-legacy", "legacy"),
                object("/infra/tier-0s", "t0-main", "tier0-gw"),
            ];
            let ep = paths::ENFORCEMENT_POINT;
            inner.transport_zones = vec![
                object(&format!("{}/transport-zones", ep), "tz-vlan", "tz-vlan"),
                object(&format!("{}/transport-zones", ep), "tz-1", "tz-overlay"),
            ];
            inner.edge_clusters = vec![object(
                &format!("{}/edge-clusters", ep),
                "ec-1",
                "edge-cluster-1",
            )];
            inner.ip_pools = vec![
                object("/infra/ip-pools", "pool-a", "pool-a"),
                object("/infra/ip-pools", "pool-b", "pool-b"),
                object("/infra/ip-pools", "pool-c", "pool-c"),
                object("/infra/ip-pools", "snat", "snat-pool"),
            ];
        }
        fake
    }

    /// Number of realized-state polls answering "not realized yet"
    pub fn with_realization_polls(mut self, polls: u32) -> Self {
        self.realization_polls = polls;
        self
    }

    /// Whether creating a segment also creates its logical switch
    pub fn with_switch_realization(mut self, enabled: bool) -> Self {
        self.realize_switches = enabled;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call and fail it if a failure was injected.
    fn enter(&self, op: &str, subject: &str) -> Result<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(format!("{} {}", op, subject));
        if inner.failures.remove(op) {
            return Err(NsxtError::Api {
                status: 500,
                code: None,
                message: format!("injected failure in {}", op),
            });
        }
        Ok(inner)
    }

    /// Make the next call of `op` (a trait method name) fail.
    pub fn fail_next(&self, op: &str) {
        self.lock().failures.insert(op.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Calls that changed something (create, patch, update, delete)
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["patch_", "create_", "update_", "delete_"]
                    .iter()
                    .any(|p| c.starts_with(p))
            })
            .collect()
    }

    pub fn add_lb_object(&self, kind: LbKind, id: &str, tags: Vec<Tag>) {
        let mut obj = object(&format!("/infra/{}", kind.collection()), id, id);
        obj.tags = tags;
        self.lock()
            .lb_objects
            .entry(kind.collection())
            .or_default()
            .push(obj);
    }

    pub fn lb_object_ids(&self, kind: LbKind) -> Vec<String> {
        self.lock()
            .lb_objects
            .get(kind.collection())
            .map(|objs| objs.iter().map(|o| o.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn add_logical_switch(&self, switch: LogicalSwitch) {
        self.lock().logical_switches.push(switch);
    }

    pub fn add_dhcp_profile(&self, profile: DhcpProfile) -> String {
        let id = profile
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut profile = profile;
        profile.id = Some(id.clone());
        profile.revision = Some(0);
        self.lock().dhcp_profiles.insert(id.clone(), profile);
        id
    }

    pub fn tier1(&self, id: &str) -> Option<Tier1> {
        self.lock().tier1s.get(id).cloned()
    }

    pub fn segment(&self, tier1_id: &str, id: &str) -> Option<Segment> {
        self.lock()
            .segments
            .get(&(tier1_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn nat_rule(&self, tier1_id: &str, id: &str) -> Option<PolicyNatRule> {
        self.lock()
            .nat_rules
            .get(&(tier1_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn dhcp_server(&self, id: &str) -> Option<LogicalDhcpServer> {
        self.lock().dhcp_servers.get(id).cloned()
    }

    /// Simulate an operator deleting a tier-1 gateway behind our back.
    pub fn remove_tier1(&self, id: &str) {
        self.lock().tier1s.remove(id);
    }

    pub fn remove_segment(&self, tier1_id: &str, id: &str) {
        self.lock()
            .segments
            .remove(&(tier1_id.to_string(), id.to_string()));
    }

    pub fn remove_dhcp_profile(&self, id: &str) {
        self.lock().dhcp_profiles.remove(id);
    }

    /// Change a stored tier-1 gateway as if edited out of band.
    pub fn edit_tier1(&self, id: &str, edit: impl FnOnce(&mut Tier1)) {
        if let Some(tier1) = self.lock().tier1s.get_mut(id) {
            edit(tier1);
        }
    }

    /// Total number of objects this control plane holds for clusters
    pub fn managed_object_count(&self) -> usize {
        let inner = self.lock();
        inner.tier1s.len()
            + inner.locale_services.len()
            + inner.segments.len()
            + inner.allocations.len()
            + inner.nat_rules.len()
            + inner.dhcp_configs.len()
            + inner.dhcp_profiles.len()
            + inner.dhcp_servers.len()
            + inner.logical_ports.len()
            + inner.dhcp_ip_pools.len()
    }
}

fn key(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

#[async_trait]
impl PolicyApi for FakeNsxt {
    async fn list_tier0s(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>> {
        let inner = self.enter("list_tier0s", cursor.as_deref().unwrap_or(""))?;
        Ok(page(&inner.tier0s, cursor, self.page_size))
    }

    async fn list_transport_zones(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        let inner = self.enter("list_transport_zones", cursor.as_deref().unwrap_or(""))?;
        Ok(page(&inner.transport_zones, cursor, self.page_size))
    }

    async fn list_edge_clusters(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        let inner = self.enter("list_edge_clusters", cursor.as_deref().unwrap_or(""))?;
        Ok(page(&inner.edge_clusters, cursor, self.page_size))
    }

    async fn list_ip_pools(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>> {
        let inner = self.enter("list_ip_pools", cursor.as_deref().unwrap_or(""))?;
        Ok(page(&inner.ip_pools, cursor, self.page_size))
    }

    async fn get_tier1(&self, id: &str) -> Result<Tier1> {
        let inner = self.enter("get_tier1", id)?;
        inner
            .tier1s
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(paths::tier1(id)))
    }

    async fn patch_tier1(&self, id: &str, tier1: &Tier1) -> Result<()> {
        let mut inner = self.enter("patch_tier1", id)?;
        let mut stored = tier1.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(paths::tier1(id));
        inner.tier1s.insert(id.to_string(), stored);
        Ok(())
    }

    async fn delete_tier1(&self, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_tier1", id)?;
        let has_children = inner.locale_services.keys().any(|(t1, _)| t1 == id)
            || inner.segments.keys().any(|(t1, _)| t1 == id)
            || inner.nat_rules.keys().any(|(t1, _)| t1 == id);
        if has_children {
            return Err(in_use(&paths::tier1(id)));
        }
        inner
            .tier1s
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(paths::tier1(id)))
    }

    async fn get_locale_service(&self, tier1_id: &str, id: &str) -> Result<LocaleServices> {
        let inner = self.enter("get_locale_service", id)?;
        inner
            .locale_services
            .get(&key(tier1_id, id))
            .cloned()
            .ok_or_else(|| not_found(paths::locale_service(tier1_id, id)))
    }

    async fn patch_locale_service(
        &self,
        tier1_id: &str,
        id: &str,
        service: &LocaleServices,
    ) -> Result<()> {
        let mut inner = self.enter("patch_locale_service", id)?;
        if !inner.tier1s.contains_key(tier1_id) {
            return Err(not_found(paths::tier1(tier1_id)));
        }
        let mut stored = service.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(paths::locale_service(tier1_id, id));
        inner.locale_services.insert(key(tier1_id, id), stored);
        Ok(())
    }

    async fn delete_locale_service(&self, tier1_id: &str, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_locale_service", id)?;
        inner
            .locale_services
            .remove(&key(tier1_id, id))
            .map(|_| ())
            .ok_or_else(|| not_found(paths::locale_service(tier1_id, id)))
    }

    async fn get_segment(&self, tier1_id: &str, id: &str) -> Result<Segment> {
        let inner = self.enter("get_segment", id)?;
        inner
            .segments
            .get(&key(tier1_id, id))
            .cloned()
            .ok_or_else(|| not_found(paths::segment(tier1_id, id)))
    }

    async fn patch_segment(&self, tier1_id: &str, id: &str, segment: &Segment) -> Result<()> {
        let mut inner = self.enter("patch_segment", id)?;
        if !inner.tier1s.contains_key(tier1_id) {
            return Err(not_found(paths::tier1(tier1_id)));
        }
        let path = paths::segment(tier1_id, id);
        let mut stored = segment.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(path.clone());
        let is_new = inner.segments.insert(key(tier1_id, id), stored).is_none();
        if is_new && self.realize_switches {
            inner.logical_switches.push(LogicalSwitch {
                id: format!("ls-{}", id),
                display_name: segment.display_name.clone(),
                tags: vec![Tag::new(POLICY_PATH_SCOPE, path)],
            });
        }
        Ok(())
    }

    async fn delete_segment(&self, tier1_id: &str, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_segment", id)?;
        let path = paths::segment(tier1_id, id);
        let switch_ids: Vec<String> = inner
            .logical_switches
            .iter()
            .filter(|s| s.tags.iter().any(|t| t.tag == path))
            .map(|s| s.id.clone())
            .collect();
        let ports_attached = inner.logical_ports.values().any(|p| {
            p.logical_switch_id
                .as_ref()
                .is_some_and(|ls| switch_ids.contains(ls))
        });
        if ports_attached {
            return Err(in_use(&path));
        }
        inner
            .segments
            .remove(&key(tier1_id, id))
            .ok_or_else(|| not_found(path))?;
        inner
            .logical_switches
            .retain(|s| !switch_ids.contains(&s.id));
        Ok(())
    }

    async fn get_ip_allocation(&self, pool_id: &str, id: &str) -> Result<IpAddressAllocation> {
        let inner = self.enter("get_ip_allocation", id)?;
        inner
            .allocations
            .get(&key(pool_id, id))
            .cloned()
            .ok_or_else(|| not_found(paths::ip_allocation(pool_id, id)))
    }

    async fn patch_ip_allocation(
        &self,
        pool_id: &str,
        id: &str,
        allocation: &IpAddressAllocation,
    ) -> Result<()> {
        let mut inner = self.enter("patch_ip_allocation", id)?;
        let path = paths::ip_allocation(pool_id, id);
        let mut stored = allocation.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(path.clone());
        if inner.allocations.insert(key(pool_id, id), stored).is_none() {
            inner
                .pending_realization
                .insert(path.clone(), self.realization_polls);
            let ip = format!("192.0.2.{}", inner.next_ip);
            inner.next_ip += 1;
            inner.realized_ips.insert(path, ip);
        }
        Ok(())
    }

    async fn delete_ip_allocation(&self, pool_id: &str, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_ip_allocation", id)?;
        let path = paths::ip_allocation(pool_id, id);
        inner.realized_ips.remove(&path);
        inner.pending_realization.remove(&path);
        inner
            .allocations
            .remove(&key(pool_id, id))
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn list_realized_entities(&self, intent_path: &str) -> Result<Vec<RealizedEntity>> {
        let mut inner = self.enter("list_realized_entities", intent_path)?;
        let Some(ip) = inner.realized_ips.get(intent_path).cloned() else {
            return Err(not_found(intent_path));
        };
        let pending = inner
            .pending_realization
            .get_mut(intent_path)
            .map(|remaining| {
                let was = *remaining;
                *remaining = remaining.saturating_sub(1);
                was
            })
            .unwrap_or(0);
        if pending > 0 {
            return Ok(vec![RealizedEntity {
                entity_type: Some("IpAllocation".to_string()),
                state: Some("UNREALIZED".to_string()),
                extended_attributes: Vec::new(),
            }]);
        }
        Ok(vec![RealizedEntity {
            entity_type: Some("IpAllocation".to_string()),
            state: Some("REALIZED".to_string()),
            extended_attributes: vec![AttributeVal {
                key: "allocation_ip".to_string(),
                values: vec![ip],
            }],
        }])
    }

    async fn get_nat_rule(&self, tier1_id: &str, id: &str) -> Result<PolicyNatRule> {
        let inner = self.enter("get_nat_rule", id)?;
        inner
            .nat_rules
            .get(&key(tier1_id, id))
            .cloned()
            .ok_or_else(|| not_found(paths::nat_rule(tier1_id, id)))
    }

    async fn patch_nat_rule(&self, tier1_id: &str, id: &str, rule: &PolicyNatRule) -> Result<()> {
        let mut inner = self.enter("patch_nat_rule", id)?;
        if !inner.tier1s.contains_key(tier1_id) {
            return Err(not_found(paths::tier1(tier1_id)));
        }
        let mut stored = rule.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(paths::nat_rule(tier1_id, id));
        inner.nat_rules.insert(key(tier1_id, id), stored);
        Ok(())
    }

    async fn delete_nat_rule(&self, tier1_id: &str, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_nat_rule", id)?;
        inner
            .nat_rules
            .remove(&key(tier1_id, id))
            .map(|_| ())
            .ok_or_else(|| not_found(paths::nat_rule(tier1_id, id)))
    }

    async fn get_dhcp_server_config(&self, id: &str) -> Result<DhcpServerConfig> {
        let inner = self.enter("get_dhcp_server_config", id)?;
        inner
            .dhcp_configs
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(paths::dhcp_server_config(id)))
    }

    async fn patch_dhcp_server_config(&self, id: &str, config: &DhcpServerConfig) -> Result<()> {
        let mut inner = self.enter("patch_dhcp_server_config", id)?;
        let mut stored = config.clone();
        stored.id = Some(id.to_string());
        stored.path = Some(paths::dhcp_server_config(id));
        inner.dhcp_configs.insert(id.to_string(), stored);
        Ok(())
    }

    async fn delete_dhcp_server_config(&self, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_dhcp_server_config", id)?;
        let path = paths::dhcp_server_config(id);
        if inner
            .segments
            .values()
            .any(|s| s.dhcp_config_path.as_deref() == Some(path.as_str()))
        {
            return Err(in_use(&path));
        }
        inner
            .dhcp_configs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn list_lb_objects(
        &self,
        kind: LbKind,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        let inner = self.enter("list_lb_objects", kind.collection())?;
        let objects = inner
            .lb_objects
            .get(kind.collection())
            .cloned()
            .unwrap_or_default();
        Ok(page(&objects, cursor, self.page_size))
    }

    async fn delete_lb_object(&self, kind: LbKind, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_lb_object", id)?;
        let objects = inner.lb_objects.entry(kind.collection()).or_default();
        let before = objects.len();
        objects.retain(|o| o.id != id);
        if objects.len() == before {
            return Err(not_found(paths::lb_object(kind.collection(), id)));
        }
        Ok(())
    }
}

fn check_revision(stored: Option<i64>, given: Option<i64>, what: &str) -> Result<i64> {
    let stored = stored.unwrap_or(0);
    if given != Some(stored) {
        return Err(NsxtError::Api {
            status: 412,
            code: Some(208),
            message: format!("{} was modified by someone else", what),
        });
    }
    Ok(stored + 1)
}

#[async_trait]
impl ManagerApi for FakeNsxt {
    async fn list_logical_switches(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalSwitch>> {
        let inner = self.enter("list_logical_switches", cursor.as_deref().unwrap_or(""))?;
        Ok(page(&inner.logical_switches, cursor, self.page_size))
    }

    async fn list_dhcp_profiles(&self, cursor: Option<String>) -> Result<ListResult<DhcpProfile>> {
        let inner = self.enter("list_dhcp_profiles", cursor.as_deref().unwrap_or(""))?;
        let all: Vec<DhcpProfile> = inner.dhcp_profiles.values().cloned().collect();
        Ok(page(&all, cursor, self.page_size))
    }

    async fn get_dhcp_profile(&self, id: &str) -> Result<DhcpProfile> {
        let inner = self.enter("get_dhcp_profile", id)?;
        inner
            .dhcp_profiles
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(paths::dhcp_profile(id)))
    }

    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<DhcpProfile> {
        let mut inner = self.enter("create_dhcp_profile", "")?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = profile.clone();
        stored.id = Some(id.clone());
        stored.revision = Some(0);
        inner.dhcp_profiles.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_dhcp_profile(&self, id: &str, profile: &DhcpProfile) -> Result<DhcpProfile> {
        let mut inner = self.enter("update_dhcp_profile", id)?;
        let current = inner
            .dhcp_profiles
            .get(id)
            .ok_or_else(|| not_found(paths::dhcp_profile(id)))?;
        let revision = check_revision(current.revision, profile.revision, id)?;
        let mut stored = profile.clone();
        stored.id = Some(id.to_string());
        stored.revision = Some(revision);
        inner.dhcp_profiles.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn delete_dhcp_profile(&self, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_dhcp_profile", id)?;
        if inner
            .dhcp_servers
            .values()
            .any(|s| s.dhcp_profile_id.as_deref() == Some(id))
        {
            return Err(in_use(&paths::dhcp_profile(id)));
        }
        inner
            .dhcp_profiles
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(paths::dhcp_profile(id)))
    }

    async fn list_dhcp_servers(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalDhcpServer>> {
        let inner = self.enter("list_dhcp_servers", cursor.as_deref().unwrap_or(""))?;
        let all: Vec<LogicalDhcpServer> = inner.dhcp_servers.values().cloned().collect();
        Ok(page(&all, cursor, self.page_size))
    }

    async fn get_dhcp_server(&self, id: &str) -> Result<LogicalDhcpServer> {
        let inner = self.enter("get_dhcp_server", id)?;
        inner
            .dhcp_servers
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(paths::dhcp_server(id)))
    }

    async fn create_dhcp_server(&self, server: &LogicalDhcpServer) -> Result<LogicalDhcpServer> {
        let mut inner = self.enter("create_dhcp_server", "")?;
        let profile_id = server.dhcp_profile_id.clone().unwrap_or_default();
        if !inner.dhcp_profiles.contains_key(&profile_id) {
            return Err(not_found(paths::dhcp_profile(&profile_id)));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = server.clone();
        stored.id = Some(id.clone());
        stored.revision = Some(0);
        inner.dhcp_servers.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<LogicalDhcpServer> {
        let mut inner = self.enter("update_dhcp_server", id)?;
        let current = inner
            .dhcp_servers
            .get(id)
            .ok_or_else(|| not_found(paths::dhcp_server(id)))?;
        let revision = check_revision(current.revision, server.revision, id)?;
        let mut stored = server.clone();
        stored.id = Some(id.to_string());
        stored.revision = Some(revision);
        inner.dhcp_servers.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_dhcp_server", id)?;
        let attached = inner.logical_ports.values().any(|p| {
            p.attachment
                .as_ref()
                .is_some_and(|a| a.id == id)
        });
        let has_pools = inner.dhcp_ip_pools.keys().any(|(server, _)| server == id);
        if attached || has_pools {
            return Err(in_use(&paths::dhcp_server(id)));
        }
        inner
            .dhcp_servers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(paths::dhcp_server(id)))
    }

    async fn list_logical_ports(&self, cursor: Option<String>) -> Result<ListResult<LogicalPort>> {
        let inner = self.enter("list_logical_ports", cursor.as_deref().unwrap_or(""))?;
        let all: Vec<LogicalPort> = inner.logical_ports.values().cloned().collect();
        Ok(page(&all, cursor, self.page_size))
    }

    async fn get_logical_port(&self, id: &str) -> Result<LogicalPort> {
        let inner = self.enter("get_logical_port", id)?;
        inner
            .logical_ports
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(paths::logical_port(id)))
    }

    async fn create_logical_port(&self, port: &LogicalPort) -> Result<LogicalPort> {
        let mut inner = self.enter("create_logical_port", "")?;
        let switch_id = port.logical_switch_id.clone().unwrap_or_default();
        if !inner.logical_switches.iter().any(|s| s.id == switch_id) {
            return Err(not_found(paths::logical_switch(&switch_id)));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = port.clone();
        stored.id = Some(id.clone());
        stored.revision = Some(0);
        inner.logical_ports.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_logical_port(&self, id: &str, port: &LogicalPort) -> Result<LogicalPort> {
        let mut inner = self.enter("update_logical_port", id)?;
        let current = inner
            .logical_ports
            .get(id)
            .ok_or_else(|| not_found(paths::logical_port(id)))?;
        let revision = check_revision(current.revision, port.revision, id)?;
        let mut stored = port.clone();
        stored.id = Some(id.to_string());
        stored.revision = Some(revision);
        inner.logical_ports.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn delete_logical_port(&self, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_logical_port", id)?;
        inner
            .logical_ports
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(paths::logical_port(id)))
    }

    async fn list_dhcp_ip_pools(
        &self,
        server_id: &str,
        cursor: Option<String>,
    ) -> Result<ListResult<DhcpIpPool>> {
        let inner = self.enter("list_dhcp_ip_pools", server_id)?;
        let all: Vec<DhcpIpPool> = inner
            .dhcp_ip_pools
            .iter()
            .filter(|((server, _), _)| server == server_id)
            .map(|(_, pool)| pool.clone())
            .collect();
        Ok(page(&all, cursor, self.page_size))
    }

    async fn get_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<DhcpIpPool> {
        let inner = self.enter("get_dhcp_ip_pool", id)?;
        inner
            .dhcp_ip_pools
            .get(&key(server_id, id))
            .cloned()
            .ok_or_else(|| not_found(paths::dhcp_ip_pool(server_id, id)))
    }

    async fn create_dhcp_ip_pool(&self, server_id: &str, pool: &DhcpIpPool) -> Result<DhcpIpPool> {
        let mut inner = self.enter("create_dhcp_ip_pool", server_id)?;
        if !inner.dhcp_servers.contains_key(server_id) {
            return Err(not_found(paths::dhcp_server(server_id)));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = pool.clone();
        stored.id = Some(id.clone());
        stored.revision = Some(0);
        inner.dhcp_ip_pools.insert(key(server_id, &id), stored.clone());
        Ok(stored)
    }

    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<DhcpIpPool> {
        let mut inner = self.enter("update_dhcp_ip_pool", id)?;
        let current = inner
            .dhcp_ip_pools
            .get(&key(server_id, id))
            .ok_or_else(|| not_found(paths::dhcp_ip_pool(server_id, id)))?;
        let revision = check_revision(current.revision, pool.revision, id)?;
        let mut stored = pool.clone();
        stored.id = Some(id.to_string());
        stored.revision = Some(revision);
        inner.dhcp_ip_pools.insert(key(server_id, id), stored.clone());
        Ok(stored)
    }

    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<()> {
        let mut inner = self.enter("delete_dhcp_ip_pool", id)?;
        inner
            .dhcp_ip_pools
            .remove(&key(server_id, id))
            .map(|_| ())
            .ok_or_else(|| not_found(paths::dhcp_ip_pool(server_id, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::find_first;

    #[tokio::test]
    async fn test_lookup_pages_through_seeded_objects() {
        let fake = FakeNsxt::with_region();
        let found = find_first(
            |cursor| fake.list_ip_pools(cursor),
            |p| p.display_name.as_deref() == Some("snat-pool"),
        )
        .await
        .unwrap();
        assert_eq!(found.unwrap().path, "/infra/ip-pools/snat");
        assert_eq!(
            fake.calls()
                .iter()
                .filter(|c| c.starts_with("list_ip_pools"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_tier1_with_children_cannot_be_deleted() {
        let fake = FakeNsxt::new();
        fake.patch_tier1("t1", &Tier1::default()).await.unwrap();
        fake.patch_segment("t1", "seg", &Segment::default())
            .await
            .unwrap();

        let err = fake.delete_tier1("t1").await.unwrap_err();
        assert!(!err.is_not_found());

        fake.delete_segment("t1", "seg").await.unwrap();
        fake.delete_tier1("t1").await.unwrap();
        assert!(fake.get_tier1("t1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_allocation_realizes_after_configured_polls() {
        let fake = FakeNsxt::new().with_realization_polls(2);
        fake.patch_ip_allocation("pool", "a1", &IpAddressAllocation::default())
            .await
            .unwrap();
        let path = paths::ip_allocation("pool", "a1");

        for _ in 0..2 {
            let entities = fake.list_realized_entities(&path).await.unwrap();
            assert!(entities[0].attribute("allocation_ip").is_none());
        }
        let entities = fake.list_realized_entities(&path).await.unwrap();
        assert_eq!(entities[0].attribute("allocation_ip"), Some("192.0.2.10"));
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let fake = FakeNsxt::new();
        let created = fake
            .create_dhcp_profile(&DhcpProfile::default())
            .await
            .unwrap();
        let id = created.id.clone().unwrap();

        let updated = fake.update_dhcp_profile(&id, &created).await.unwrap();
        assert_eq!(updated.revision, Some(1));

        let err = fake.update_dhcp_profile(&id, &created).await.unwrap_err();
        assert!(matches!(err, NsxtError::Api { status: 412, .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_hits_once() {
        let fake = FakeNsxt::new();
        fake.fail_next("get_tier1");
        assert!(matches!(
            fake.get_tier1("x").await,
            Err(NsxtError::Api { status: 500, .. })
        ));
        assert!(fake.get_tier1("x").await.unwrap_err().is_not_found());
    }
}
