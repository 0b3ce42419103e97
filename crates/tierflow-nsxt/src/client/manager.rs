//! Manager (advanced) API client

use crate::api::ManagerApi;
use crate::error::Result;
use crate::model::{
    DhcpIpPool, DhcpProfile, ListResult, LogicalDhcpServer, LogicalPort, LogicalSwitch,
};
use crate::paths;
use crate::transport::{RestClient, cursor_query};
use async_trait::async_trait;
use std::sync::Arc;

/// Client of the manager API
pub struct ManagerClient {
    rest: Arc<RestClient>,
}

impl ManagerClient {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ManagerApi for ManagerClient {
    async fn list_logical_switches(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalSwitch>> {
        self.rest
            .get("/api/v1/logical-switches", &cursor_query(cursor))
            .await
    }

    async fn list_dhcp_profiles(&self, cursor: Option<String>) -> Result<ListResult<DhcpProfile>> {
        self.rest
            .get("/api/v1/dhcp/server-profiles", &cursor_query(cursor))
            .await
    }

    async fn get_dhcp_profile(&self, id: &str) -> Result<DhcpProfile> {
        self.rest.get(&paths::dhcp_profile(id), &[]).await
    }

    async fn create_dhcp_profile(&self, profile: &DhcpProfile) -> Result<DhcpProfile> {
        self.rest.post("/api/v1/dhcp/server-profiles", profile).await
    }

    async fn update_dhcp_profile(&self, id: &str, profile: &DhcpProfile) -> Result<DhcpProfile> {
        self.rest.put(&paths::dhcp_profile(id), profile).await
    }

    async fn delete_dhcp_profile(&self, id: &str) -> Result<()> {
        self.rest.delete(&paths::dhcp_profile(id), &[]).await
    }

    async fn list_dhcp_servers(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResult<LogicalDhcpServer>> {
        self.rest
            .get("/api/v1/dhcp/servers", &cursor_query(cursor))
            .await
    }

    async fn get_dhcp_server(&self, id: &str) -> Result<LogicalDhcpServer> {
        self.rest.get(&paths::dhcp_server(id), &[]).await
    }

    async fn create_dhcp_server(&self, server: &LogicalDhcpServer) -> Result<LogicalDhcpServer> {
        self.rest.post("/api/v1/dhcp/servers", server).await
    }

    async fn update_dhcp_server(
        &self,
        id: &str,
        server: &LogicalDhcpServer,
    ) -> Result<LogicalDhcpServer> {
        self.rest.put(&paths::dhcp_server(id), server).await
    }

    async fn delete_dhcp_server(&self, id: &str) -> Result<()> {
        self.rest.delete(&paths::dhcp_server(id), &[]).await
    }

    async fn list_logical_ports(&self, cursor: Option<String>) -> Result<ListResult<LogicalPort>> {
        self.rest
            .get("/api/v1/logical-ports", &cursor_query(cursor))
            .await
    }

    async fn get_logical_port(&self, id: &str) -> Result<LogicalPort> {
        self.rest.get(&paths::logical_port(id), &[]).await
    }

    async fn create_logical_port(&self, port: &LogicalPort) -> Result<LogicalPort> {
        self.rest.post("/api/v1/logical-ports", port).await
    }

    async fn update_logical_port(&self, id: &str, port: &LogicalPort) -> Result<LogicalPort> {
        self.rest.put(&paths::logical_port(id), port).await
    }

    async fn delete_logical_port(&self, id: &str) -> Result<()> {
        self.rest
            .delete(&paths::logical_port(id), &[("detach", "true".to_string())])
            .await
    }

    async fn list_dhcp_ip_pools(
        &self,
        server_id: &str,
        cursor: Option<String>,
    ) -> Result<ListResult<DhcpIpPool>> {
        let path = format!("{}/ip-pools", paths::dhcp_server(server_id));
        self.rest.get(&path, &cursor_query(cursor)).await
    }

    async fn get_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<DhcpIpPool> {
        self.rest.get(&paths::dhcp_ip_pool(server_id, id), &[]).await
    }

    async fn create_dhcp_ip_pool(&self, server_id: &str, pool: &DhcpIpPool) -> Result<DhcpIpPool> {
        let path = format!("{}/ip-pools", paths::dhcp_server(server_id));
        self.rest.post(&path, pool).await
    }

    async fn update_dhcp_ip_pool(
        &self,
        server_id: &str,
        id: &str,
        pool: &DhcpIpPool,
    ) -> Result<DhcpIpPool> {
        self.rest.put(&paths::dhcp_ip_pool(server_id, id), pool).await
    }

    async fn delete_dhcp_ip_pool(&self, server_id: &str, id: &str) -> Result<()> {
        self.rest.delete(&paths::dhcp_ip_pool(server_id, id), &[]).await
    }
}
