//! Tier-1 gateway of the cluster and its edge cluster binding

use super::{Task, delete_referenced, new_id, parent_tier1, read_or_heal, require};
use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::Result;
use crate::spec::Spec;
use crate::state::{Reference, State};
use crate::tags::same_tags;
use async_trait::async_trait;
use tierflow_nsxt::model::{LocaleServices, Tier1};
use tierflow_nsxt::paths;

const FAILOVER_MODE: &str = "PREEMPTIVE";
const POOL_ALLOCATION: &str = "ROUTING";
const ROUTE_ADVERTISEMENT: [&str; 3] = ["TIER1_CONNECTED", "TIER1_NAT", "TIER1_STATIC_ROUTES"];

pub struct Tier1GatewayTask;

impl Tier1GatewayTask {
    const LABEL: &'static str = "tier1-gateway";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<Tier1> {
        let tier0 = require(&state.tier0_gateway_ref, Self::LABEL, "tier-0 gateway")?;
        Ok(Tier1 {
            display_name: Some(spec.object_name()),
            description: Some(format!("Tier-1 gateway of cluster {}", spec.cluster_name)),
            tier0_path: Some(tier0.path.clone()),
            failover_mode: Some(FAILOVER_MODE.to_string()),
            pool_allocation: Some(POOL_ALLOCATION.to_string()),
            route_advertisement_types: ROUTE_ADVERTISEMENT.map(String::from).to_vec(),
            tags: ctx.identity.tags(),
            ..Tier1::default()
        })
    }

    fn differs(current: &Tier1, desired: &Tier1) -> bool {
        let mut advertised = current.route_advertisement_types.clone();
        advertised.sort();
        let mut wanted = desired.route_advertisement_types.clone();
        wanted.sort();

        current.display_name != desired.display_name
            || current.description != desired.description
            || current.tier0_path != desired.tier0_path
            || current.failover_mode != desired.failover_mode
            || current.pool_allocation != desired.pool_allocation
            || advertised != wanted
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for Tier1GatewayTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let desired = Self::desired(ctx, spec, state)?;
        let policy = &ctx.policy;

        let current = read_or_heal(Self::LABEL, &mut state.tier1_gateway_ref, |id| async move {
            policy.get_tier1(&id).await
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.tier1_gateway_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            policy.patch_tier1(&reference.id, &desired).await?;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_tier1(&id, &desired).await?;
        state.tier1_gateway_ref = Some(Reference::new(&id, paths::tier1(&id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let policy = &ctx.policy;
        delete_referenced(Self::LABEL, &mut state.tier1_gateway_ref, |id| async move {
            policy.delete_tier1(&id).await
        })
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.tier1_gateway_ref.as_ref()
    }
}

/// Locale services placing the tier-1 gateway on the edge cluster
pub struct LocaleServiceTask;

impl LocaleServiceTask {
    const LABEL: &'static str = "locale-service";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<LocaleServices> {
        let edge_cluster = require(&state.edge_cluster_ref, Self::LABEL, "edge cluster")?;
        Ok(LocaleServices {
            display_name: Some(spec.object_name()),
            edge_cluster_path: Some(edge_cluster.path.clone()),
            tags: ctx.identity.tags(),
            ..LocaleServices::default()
        })
    }

    fn differs(current: &LocaleServices, desired: &LocaleServices) -> bool {
        current.display_name != desired.display_name
            || current.edge_cluster_path != desired.edge_cluster_path
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for LocaleServiceTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let desired = Self::desired(ctx, spec, state)?;
        let tier1_id = require(&state.tier1_gateway_ref, Self::LABEL, "tier-1 gateway")?
            .id
            .clone();
        let policy = &ctx.policy;

        let current = read_or_heal(Self::LABEL, &mut state.locale_service_ref, |id| {
            let tier1_id = tier1_id.clone();
            async move { policy.get_locale_service(&tier1_id, &id).await }
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.locale_service_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            policy
                .patch_locale_service(&tier1_id, &reference.id, &desired)
                .await?;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_locale_service(&tier1_id, &id, &desired).await?;
        state.locale_service_ref = Some(Reference::new(&id, paths::locale_service(&tier1_id, &id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let Some(reference) = &state.locale_service_ref else {
            return Ok(false);
        };
        let tier1_id = parent_tier1(reference, Self::LABEL)?;
        let policy = &ctx.policy;
        delete_referenced(Self::LABEL, &mut state.locale_service_ref, |id| async move {
            policy.delete_locale_service(&tier1_id, &id).await
        })
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.locale_service_ref.as_ref()
    }
}
