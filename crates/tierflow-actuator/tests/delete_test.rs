mod common;

use common::{Harness, request};
use std::sync::atomic::Ordering;
use tierflow_actuator::ActuatorError;
use tierflow_infra::{InfraError, State};
use tierflow_nsxt::model::LbKind;
use tierflow_nsxt::{ApiGeneration, Tag};

#[tokio::test]
async fn test_delete_without_state_is_a_noop() {
    let h = Harness::new(ApiGeneration::V3);

    h.actuator.delete(&request()).await.unwrap();

    assert_eq!(h.connects(), 0);
    assert!(h.fake.calls().is_empty());
}

#[tokio::test]
async fn test_delete_when_creation_never_started() {
    let h = Harness::new(ApiGeneration::V3);
    h.store.save(common::NAMESPACE, &State::new()).await.unwrap();
    h.factory.unreachable.store(true, Ordering::SeqCst);

    h.actuator.delete(&request()).await.unwrap();

    assert_eq!(h.connects(), 0);
}

#[tokio::test]
async fn test_delete_removes_everything() -> anyhow::Result<()> {
    let h = Harness::new(ApiGeneration::V3);
    h.actuator.reconcile(&request()).await?;
    let owner = vec![Tag::new("owner", "shoot--dev--app")];
    h.fake.add_lb_object(LbKind::VirtualServer, "vs-1", owner.clone());
    h.fake.add_lb_object(LbKind::Pool, "pool-1", owner.clone());
    h.fake.add_lb_object(LbKind::Service, "svc-1", owner);
    h.fake
        .add_lb_object(LbKind::Service, "svc-foreign", vec![Tag::new("owner", "other")]);

    h.actuator.delete(&request()).await?;

    assert_eq!(h.fake.managed_object_count(), 0);
    assert!(h.fake.lb_object_ids(LbKind::VirtualServer).is_empty());
    assert!(h.fake.lb_object_ids(LbKind::Pool).is_empty());
    assert_eq!(h.fake.lb_object_ids(LbKind::Service), vec!["svc-foreign"]);
    assert!(h.stored_state().await.is_none());

    // A repeated delete finds no state and stays away from the manager
    let connects = h.connects();
    h.actuator.delete(&request()).await?;
    assert_eq!(h.connects(), connects);
    Ok(())
}

#[tokio::test]
async fn test_failed_load_balancer_cleanup_does_not_block() {
    let h = Harness::new(ApiGeneration::V3);
    h.actuator.reconcile(&request()).await.unwrap();
    h.fake.fail_next("list_lb_objects");

    h.actuator.delete(&request()).await.unwrap();

    assert_eq!(h.fake.managed_object_count(), 0);
}

#[tokio::test]
async fn test_failed_delete_saves_progress() {
    let h = Harness::new(ApiGeneration::V3);
    h.actuator.reconcile(&request()).await.unwrap();
    h.fake.fail_next("delete_tier1");

    let err = h.actuator.delete(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        ActuatorError::Infra(InfraError::Task {
            task: "tier1-gateway",
            ..
        })
    ));

    let saved = h.stored_state().await.unwrap();
    assert!(saved.tier1_gateway_ref.is_some());
    assert!(saved.locale_service_ref.is_none());
    assert!(saved.segment_ref.is_none());
    assert!(saved.snat_rule_ref.is_none());

    h.actuator.delete(&request()).await.unwrap();
    assert_eq!(h.fake.managed_object_count(), 0);
    assert!(h.stored_state().await.is_none());
}

#[tokio::test]
async fn test_delete_after_failed_gateway_recreation() -> anyhow::Result<()> {
    let h = Harness::new(ApiGeneration::V3);
    let status = h.actuator.reconcile(&request()).await?;
    let tier1 = status.nsxt.tier1_gateway_ref.unwrap();
    h.fake.remove_tier1(&tier1.id);
    h.fake.fail_next("patch_tier1");

    assert!(h.actuator.reconcile(&request()).await.is_err());
    let saved = h.stored_state().await.unwrap();
    assert_eq!(saved.tier1_gateway_ref, Some(tier1));
    assert!(saved.segment_ref.is_some());

    h.actuator.delete(&request()).await?;

    assert_eq!(h.fake.managed_object_count(), 0);
    assert!(h.stored_state().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delete_after_upgrade_removes_manager_dhcp() -> anyhow::Result<()> {
    let h = Harness::new(ApiGeneration::V2);
    let status = h.actuator.reconcile(&request()).await?;
    assert!(status.nsxt.advanced_dhcp.is_some());
    *h.factory.generation.lock().unwrap() = ApiGeneration::V3;
    let status = h.actuator.reconcile(&request()).await?;
    assert!(status.nsxt.advanced_dhcp.is_some());
    assert!(status.nsxt.dhcp_server_config_ref.is_some());

    h.actuator.delete(&request()).await?;

    assert_eq!(h.fake.managed_object_count(), 0);
    assert!(h.stored_state().await.is_none());
    Ok(())
}
