//! SNAT address of the cluster: allocation, realization wait and NAT rule

use super::{Task, delete_referenced, new_id, parent_tier1, read_or_heal, require};
use crate::action::Action;
use crate::cidr::parse_cidr;
use crate::context::EnsurerContext;
use crate::error::{InfraError, Result};
use crate::spec::Spec;
use crate::state::{Reference, State};
use crate::tags::same_tags;
use async_trait::async_trait;
use tierflow_nsxt::model::{IpAddressAllocation, PolicyNatRule};
use tierflow_nsxt::paths;
use tokio::time::Instant;

/// Extended attribute of a realized allocation holding the address
const ALLOCATION_IP_ATTRIBUTE: &str = "allocation_ip";

/// Allocation of the SNAT address from the configured IP pool
pub struct SnatIpAllocationTask;

impl SnatIpAllocationTask {
    const LABEL: &'static str = "snat-ip-allocation";

    fn desired(ctx: &EnsurerContext, spec: &Spec) -> IpAddressAllocation {
        IpAddressAllocation {
            display_name: Some(spec.object_name()),
            tags: ctx.identity.tags(),
            ..IpAddressAllocation::default()
        }
    }

    // The pool picks the address, so a chosen `allocation_ip` is not drift.
    fn differs(current: &IpAddressAllocation, desired: &IpAddressAllocation) -> bool {
        current.display_name != desired.display_name || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for SnatIpAllocationTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let pool_id = require(&state.snat_ip_pool_ref, Self::LABEL, "SNAT IP pool")?
            .id
            .clone();
        let mut desired = Self::desired(ctx, spec);
        let policy = &ctx.policy;

        let current = read_or_heal(Self::LABEL, &mut state.snat_ip_address_alloc_ref, |id| {
            let pool_id = pool_id.clone();
            async move { policy.get_ip_allocation(&pool_id, &id).await }
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.snat_ip_address_alloc_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            desired.allocation_ip = current.allocation_ip;
            policy
                .patch_ip_allocation(&pool_id, &reference.id, &desired)
                .await?;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_ip_allocation(&pool_id, &id, &desired).await?;
        state.snat_ip_address_alloc_ref =
            Some(Reference::new(&id, paths::ip_allocation(&pool_id, &id)));
        // A new allocation may realize to a different address.
        state.snat_ip_address = None;
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        if state.snat_ip_address_alloc_ref.is_none() {
            return Ok(false);
        }
        let pool_id = require(&state.snat_ip_pool_ref, Self::LABEL, "SNAT IP pool")?
            .id
            .clone();
        let policy = &ctx.policy;
        delete_referenced(Self::LABEL, &mut state.snat_ip_address_alloc_ref, |id| async move {
            policy.delete_ip_allocation(&pool_id, &id).await
        })
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.snat_ip_address_alloc_ref.as_ref()
    }
}

/// Bounded wait until the allocated SNAT address is realized
///
/// Polls the realized state of the allocation with a doubling interval capped
/// at the configured maximum, and fails once the timeout has passed.
pub struct SnatIpRealizationTask;

impl SnatIpRealizationTask {
    const LABEL: &'static str = "snat-ip-realization";

    async fn realized_address(ctx: &EnsurerContext, intent_path: &str) -> Result<String> {
        let config = ctx.realization;
        let deadline = Instant::now() + config.timeout;
        let mut interval = config.initial_interval;
        loop {
            match ctx.policy.list_realized_entities(intent_path).await {
                Ok(entities) => {
                    if let Some(ip) = entities
                        .iter()
                        .find_map(|e| e.attribute(ALLOCATION_IP_ATTRIBUTE))
                        .filter(|ip| !ip.is_empty())
                    {
                        return Ok(ip.to_string());
                    }
                }
                // Not realized at all yet
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(InfraError::RealizationTimeout {
                    path: intent_path.to_string(),
                    timeout: config.timeout,
                });
            }
            tracing::debug!(path = intent_path, ?interval, "Waiting for SNAT IP realization");
            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(config.max_interval);
        }
    }
}

#[async_trait]
impl Task for SnatIpRealizationTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        _spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let allocation = require(
            &state.snat_ip_address_alloc_ref,
            Self::LABEL,
            "SNAT IP allocation",
        )?;
        let address = Self::realized_address(ctx, &allocation.path).await?;
        let action = match state.snat_ip_address.as_deref() {
            None => Action::Found,
            Some(known) if known == address => Action::Unchanged,
            Some(_) => Action::Updated,
        };
        state.snat_ip_address = Some(address);
        Ok(action)
    }

    // Nothing remote; the address goes away with its allocation.
    async fn ensure_deleted(&self, _ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        state.snat_ip_address = None;
        Ok(false)
    }

    fn reference<'a>(&self, _state: &'a State) -> Option<&'a Reference> {
        None
    }
}

const SNAT_ACTION: &str = "SNAT";
const SNAT_FIREWALL_MATCH: &str = "MATCH_INTERNAL_ADDRESS";
const SNAT_SEQUENCE_NUMBER: i64 = 100;

/// Source NAT of the workers network to the realized address
pub struct SnatRuleTask;

impl SnatRuleTask {
    const LABEL: &'static str = "snat-rule";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<PolicyNatRule> {
        let address = state
            .snat_ip_address
            .clone()
            .ok_or(InfraError::MissingDependency {
                task: Self::LABEL,
                dependency: "realized SNAT IP address",
            })?;
        let workers = parse_cidr(&spec.workers_network)?;
        Ok(PolicyNatRule {
            display_name: Some(spec.object_name()),
            action: Some(SNAT_ACTION.to_string()),
            source_network: Some(workers.to_string()),
            translated_network: Some(address),
            sequence_number: Some(SNAT_SEQUENCE_NUMBER),
            enabled: Some(true),
            logging: Some(false),
            firewall_match: Some(SNAT_FIREWALL_MATCH.to_string()),
            tags: ctx.identity.tags(),
            ..PolicyNatRule::default()
        })
    }

    fn differs(current: &PolicyNatRule, desired: &PolicyNatRule) -> bool {
        current.display_name != desired.display_name
            || current.action != desired.action
            || current.source_network != desired.source_network
            || current.translated_network != desired.translated_network
            || current.sequence_number != desired.sequence_number
            || current.enabled != desired.enabled
            || current.logging != desired.logging
            || current.firewall_match != desired.firewall_match
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for SnatRuleTask {
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

        let current = read_or_heal(Self::LABEL, &mut state.snat_rule_ref, |id| {
            let tier1_id = tier1_id.clone();
            async move { policy.get_nat_rule(&tier1_id, &id).await }
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.snat_rule_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            policy
                .patch_nat_rule(&tier1_id, &reference.id, &desired)
                .await?;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_nat_rule(&tier1_id, &id, &desired).await?;
        state.snat_rule_ref = Some(Reference::new(&id, paths::nat_rule(&tier1_id, &id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let Some(reference) = &state.snat_rule_ref else {
            return Ok(false);
        };
        let tier1_id = parent_tier1(reference, Self::LABEL)?;
        let policy = &ctx.policy;
        delete_referenced(Self::LABEL, &mut state.snat_rule_ref, |id| async move {
            policy.delete_nat_rule(&tier1_id, &id).await
        })
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.snat_rule_ref.as_ref()
    }
}
