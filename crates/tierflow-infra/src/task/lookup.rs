//! Resolution of pre-existing objects by display name

use super::Task;
use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::{InfraError, Result};
use crate::spec::Spec;
use crate::state::{Reference, State};
use async_trait::async_trait;
use tierflow_nsxt::model::PolicyObject;
use tierflow_nsxt::paging::find_first;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Tier0Gateway,
    EdgeCluster,
    TransportZone,
    SnatIpPool,
}

/// Read-only task binding a named object the cluster depends on
///
/// Never creates anything; a name that matches no object is an error.
pub struct LookupTask {
    kind: Kind,
}

impl LookupTask {
    pub fn tier0_gateway() -> Self {
        Self {
            kind: Kind::Tier0Gateway,
        }
    }

    pub fn edge_cluster() -> Self {
        Self {
            kind: Kind::EdgeCluster,
        }
    }

    pub fn transport_zone() -> Self {
        Self {
            kind: Kind::TransportZone,
        }
    }

    pub fn snat_ip_pool() -> Self {
        Self {
            kind: Kind::SnatIpPool,
        }
    }

    fn name<'a>(&self, spec: &'a Spec) -> &'a str {
        match self.kind {
            Kind::Tier0Gateway => &spec.tier0_gateway_name,
            Kind::EdgeCluster => &spec.edge_cluster_name,
            Kind::TransportZone => &spec.transport_zone_name,
            Kind::SnatIpPool => &spec.snat_ip_pool_name,
        }
    }

    fn slot<'a>(&self, state: &'a mut State) -> &'a mut Option<Reference> {
        match self.kind {
            Kind::Tier0Gateway => &mut state.tier0_gateway_ref,
            Kind::EdgeCluster => &mut state.edge_cluster_ref,
            Kind::TransportZone => &mut state.transport_zone_ref,
            Kind::SnatIpPool => &mut state.snat_ip_pool_ref,
        }
    }

    async fn find(&self, ctx: &EnsurerContext, name: &str) -> Result<Option<PolicyObject>> {
        let policy = &ctx.policy;
        let matches = |o: &PolicyObject| o.display_name.as_deref() == Some(name);
        let found = match self.kind {
            Kind::Tier0Gateway => find_first(|c| policy.list_tier0s(c), matches).await?,
            Kind::EdgeCluster => find_first(|c| policy.list_edge_clusters(c), matches).await?,
            Kind::TransportZone => {
                find_first(|c| policy.list_transport_zones(c), matches).await?
            }
            Kind::SnatIpPool => find_first(|c| policy.list_ip_pools(c), matches).await?,
        };
        Ok(found)
    }
}

#[async_trait]
impl Task for LookupTask {
    fn label(&self) -> &'static str {
        match self.kind {
            Kind::Tier0Gateway => "tier0-gateway-lookup",
            Kind::EdgeCluster => "edge-cluster-lookup",
            Kind::TransportZone => "transport-zone-lookup",
            Kind::SnatIpPool => "snat-ip-pool-lookup",
        }
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let name = self.name(spec);
        let object = self
            .find(ctx, name)
            .await?
            .ok_or_else(|| InfraError::LookupNotFound {
                kind: self.label(),
                name: name.to_string(),
            })?;
        *self.slot(state) = Some(Reference::new(object.id, object.path));
        Ok(Action::Found)
    }

    async fn ensure_deleted(&self, _ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        // Bound objects belong to the operator; only forget them.
        *self.slot(state) = None;
        Ok(false)
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        match self.kind {
            Kind::Tier0Gateway => state.tier0_gateway_ref.as_ref(),
            Kind::EdgeCluster => state.edge_cluster_ref.as_ref(),
            Kind::TransportZone => state.transport_zone_ref.as_ref(),
            Kind::SnatIpPool => state.snat_ip_pool_ref.as_ref(),
        }
    }
}
