//! Policy API client

use crate::api::PolicyApi;
use crate::error::Result;
use crate::model::{
    DhcpServerConfig, IpAddressAllocation, LbKind, ListResult, LocaleServices, PolicyNatRule,
    PolicyObject, RealizedEntity, Segment, Tier1,
};
use crate::paths;
use crate::transport::{RestClient, cursor_query};
use async_trait::async_trait;
use std::sync::Arc;

const POLICY_BASE: &str = "/policy/api/v1";

/// Client of the declarative policy API
pub struct PolicyClient {
    rest: Arc<RestClient>,
}

impl PolicyClient {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }

    fn url(path: &str) -> String {
        format!("{}{}", POLICY_BASE, path)
    }

    async fn list(&self, path: &str, cursor: Option<String>) -> Result<ListResult<PolicyObject>> {
        self.rest.get(&Self::url(path), &cursor_query(cursor)).await
    }
}

#[derive(serde::Deserialize)]
struct RealizedEntities {
    #[serde(default)]
    results: Vec<RealizedEntity>,
}

#[async_trait]
impl PolicyApi for PolicyClient {
    async fn list_tier0s(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>> {
        self.list(&paths::tier0s(), cursor).await
    }

    async fn list_transport_zones(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        self.list(&paths::transport_zones(), cursor).await
    }

    async fn list_edge_clusters(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        self.list(&paths::edge_clusters(), cursor).await
    }

    async fn list_ip_pools(&self, cursor: Option<String>) -> Result<ListResult<PolicyObject>> {
        self.list(&paths::ip_pools(), cursor).await
    }

    async fn get_tier1(&self, id: &str) -> Result<Tier1> {
        self.rest.get(&Self::url(&paths::tier1(id)), &[]).await
    }

    async fn patch_tier1(&self, id: &str, tier1: &Tier1) -> Result<()> {
        self.rest.patch(&Self::url(&paths::tier1(id)), tier1).await
    }

    async fn delete_tier1(&self, id: &str) -> Result<()> {
        self.rest.delete(&Self::url(&paths::tier1(id)), &[]).await
    }

    async fn get_locale_service(&self, tier1_id: &str, id: &str) -> Result<LocaleServices> {
        let path = paths::locale_service(tier1_id, id);
        self.rest.get(&Self::url(&path), &[]).await
    }

    async fn patch_locale_service(
        &self,
        tier1_id: &str,
        id: &str,
        service: &LocaleServices,
    ) -> Result<()> {
        let path = paths::locale_service(tier1_id, id);
        self.rest.patch(&Self::url(&path), service).await
    }

    async fn delete_locale_service(&self, tier1_id: &str, id: &str) -> Result<()> {
        let path = paths::locale_service(tier1_id, id);
        self.rest.delete(&Self::url(&path), &[]).await
    }

    async fn get_segment(&self, tier1_id: &str, id: &str) -> Result<Segment> {
        let path = paths::segment(tier1_id, id);
        self.rest.get(&Self::url(&path), &[]).await
    }

    async fn patch_segment(&self, tier1_id: &str, id: &str, segment: &Segment) -> Result<()> {
        let path = paths::segment(tier1_id, id);
        self.rest.patch(&Self::url(&path), segment).await
    }

    async fn delete_segment(&self, tier1_id: &str, id: &str) -> Result<()> {
        let path = paths::segment(tier1_id, id);
        self.rest.delete(&Self::url(&path), &[]).await
    }

    async fn get_ip_allocation(&self, pool_id: &str, id: &str) -> Result<IpAddressAllocation> {
        let path = paths::ip_allocation(pool_id, id);
        self.rest.get(&Self::url(&path), &[]).await
    }

    async fn patch_ip_allocation(
        &self,
        pool_id: &str,
        id: &str,
        allocation: &IpAddressAllocation,
    ) -> Result<()> {
        let path = paths::ip_allocation(pool_id, id);
        self.rest.patch(&Self::url(&path), allocation).await
    }

    async fn delete_ip_allocation(&self, pool_id: &str, id: &str) -> Result<()> {
        let path = paths::ip_allocation(pool_id, id);
        self.rest.delete(&Self::url(&path), &[]).await
    }

    async fn list_realized_entities(&self, intent_path: &str) -> Result<Vec<RealizedEntity>> {
        let entities: RealizedEntities = self
            .rest
            .get(
                &Self::url("/infra/realized-state/realized-entities"),
                &[("intent_path", intent_path.to_string())],
            )
            .await?;
        Ok(entities.results)
    }

    async fn get_nat_rule(&self, tier1_id: &str, id: &str) -> Result<PolicyNatRule> {
        let path = paths::nat_rule(tier1_id, id);
        self.rest.get(&Self::url(&path), &[]).await
    }

    async fn patch_nat_rule(&self, tier1_id: &str, id: &str, rule: &PolicyNatRule) -> Result<()> {
        let path = paths::nat_rule(tier1_id, id);
        self.rest.patch(&Self::url(&path), rule).await
    }

    async fn delete_nat_rule(&self, tier1_id: &str, id: &str) -> Result<()> {
        let path = paths::nat_rule(tier1_id, id);
        self.rest.delete(&Self::url(&path), &[]).await
    }

    async fn get_dhcp_server_config(&self, id: &str) -> Result<DhcpServerConfig> {
        let path = paths::dhcp_server_config(id);
        self.rest.get(&Self::url(&path), &[]).await
    }

    async fn patch_dhcp_server_config(&self, id: &str, config: &DhcpServerConfig) -> Result<()> {
        let path = paths::dhcp_server_config(id);
        self.rest.patch(&Self::url(&path), config).await
    }

    async fn delete_dhcp_server_config(&self, id: &str) -> Result<()> {
        let path = paths::dhcp_server_config(id);
        self.rest.delete(&Self::url(&path), &[]).await
    }

    async fn list_lb_objects(
        &self,
        kind: LbKind,
        cursor: Option<String>,
    ) -> Result<ListResult<PolicyObject>> {
        self.list(&format!("/infra/{}", kind.collection()), cursor)
            .await
    }

    async fn delete_lb_object(&self, kind: LbKind, id: &str) -> Result<()> {
        let path = paths::lb_object(kind.collection(), id);
        self.rest
            .delete(&Self::url(&path), &[("force", "true".to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::api::PolicyApi;
    use crate::auth::{Credentials, TokenCache};
    use crate::connector::{Connector, ConnectorConfig};
    use crate::model::{LbKind, Tier1};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn policy(server: &MockServer) -> Arc<dyn PolicyApi> {
        Mock::given(method("GET"))
            .and(path("/api/v1/node/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"product_version": "3.2.1"})),
            )
            .mount(server)
            .await;
        let config = ConnectorConfig::new(
            server.uri(),
            Credentials::Basic {
                username: "admin".to_string(),
                password: "secret".to_string(),
            },
        );
        Connector::connect(&config, &TokenCache::default())
            .await
            .unwrap()
            .policy()
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/policy/api/v1/infra/tier-1s/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/policy/api/v1/infra/dhcp-server-configs/gone"))
            .respond_with(ResponseTemplate::new(400).set_body_json(
                serde_json::json!({"error_code": 600, "error_message": "not found"}),
            ))
            .mount(&server)
            .await;

        let policy = policy(&server).await;
        assert!(policy.get_tier1("gone").await.unwrap_err().is_not_found());
        assert!(
            policy
                .get_dhcp_server_config("gone")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_list_passes_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/policy/api/v1/infra/tier-0s"))
            .and(query_param("cursor", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": "t0", "path": "/infra/tier-0s/t0", "display_name": "tier0-gw"}],
                "result_count": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = policy(&server)
            .await
            .list_tier0s(Some("page-2".to_string()))
            .await
            .unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].display_name.as_deref(), Some("tier0-gw"));
        assert!(page.next_cursor().is_none());
    }

    #[tokio::test]
    async fn test_patch_sends_object() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/policy/api/v1/infra/tier-1s/t1"))
            .and(body_partial_json(serde_json::json!({
                "display_name": "eu1--shoot",
                "failover_mode": "PREEMPTIVE"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tier1 = Tier1 {
            display_name: Some("eu1--shoot".to_string()),
            failover_mode: Some("PREEMPTIVE".to_string()),
            ..Tier1::default()
        };
        policy(&server).await.patch_tier1("t1", &tier1).await.unwrap();
    }

    #[tokio::test]
    async fn test_lb_objects_are_force_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/policy/api/v1/infra/lb-pools/pool-1"))
            .and(query_param("force", "true"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        policy(&server)
            .await
            .delete_lb_object(LbKind::Pool, "pool-1")
            .await
            .unwrap();
    }
}
