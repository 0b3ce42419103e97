//! Cleanup of load-balancer objects owned by the cluster
//!
//! The cloud-controller creates these out of band. They hang off the
//! cluster's tier-1 gateway, so they have to go before the teardown.

use tierflow_nsxt::model::LbKind;
use tierflow_nsxt::{PolicyApi, paging};

/// Deletion order: a pool cannot go while a virtual server uses it, a
/// service cannot go while it has virtual servers.
const ORDER: [LbKind; 3] = [LbKind::VirtualServer, LbKind::Pool, LbKind::Service];

/// Delete every load-balancer object tagged `{scope: cluster_name}`.
///
/// Returns the number of deleted objects. Errors abort the cleanup; the
/// caller decides whether they matter.
pub async fn cleanup_load_balancers(
    policy: &dyn PolicyApi,
    scope: &str,
    cluster_name: &str,
) -> tierflow_nsxt::Result<usize> {
    let mut deleted = 0;
    for kind in ORDER {
        let owned = paging::collect_matching(
            |cursor| policy.list_lb_objects(kind, cursor),
            |obj| {
                obj.tags
                    .iter()
                    .any(|t| t.scope == scope && t.tag == cluster_name)
            },
        )
        .await?;

        for obj in owned {
            match policy.delete_lb_object(kind, &obj.id).await {
                Ok(()) => {
                    tracing::info!(kind = %kind, id = %obj.id, "Deleted load-balancer object");
                    deleted += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(deleted)
}
