//! What the cluster-lifecycle operator asks for

use crate::error::{ActuatorError, Result};
use tierflow_config::RegionConfig;
use tierflow_infra::Spec;
use tierflow_nsxt::{ConnectorConfig, Credentials, TlsConfig};

/// NSX-T secret of a cluster, as extracted by the caller
#[derive(Clone)]
pub enum NsxtSecret {
    UserPassword { username: String, password: String },
    ApiToken(String),
}

impl std::fmt::Debug for NsxtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NsxtSecret::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .finish_non_exhaustive(),
            NsxtSecret::ApiToken(_) => f.write_str("ApiToken(..)"),
        }
    }
}

/// One cluster's reconcile or delete request
#[derive(Debug, Clone)]
pub struct ClusterRequest {
    /// Key of the cluster's state record
    pub namespace: String,
    pub region: String,

    pub garden_id: String,
    pub garden_name: String,
    pub cluster_name: String,
    pub workers_network: String,

    pub secret: NsxtSecret,
}

impl ClusterRequest {
    pub fn spec(&self, region: &RegionConfig) -> Spec {
        Spec {
            tier0_gateway_name: region.tier0_gateway_name.clone(),
            edge_cluster_name: region.edge_cluster_name.clone(),
            transport_zone_name: region.transport_zone_name.clone(),
            snat_ip_pool_name: region.snat_ip_pool_name.clone(),
            garden_id: self.garden_id.clone(),
            garden_name: self.garden_name.clone(),
            cluster_name: self.cluster_name.clone(),
            workers_network: self.workers_network.clone(),
            dns_servers: region.dns_servers.clone(),
        }
    }

    /// Credentials in the mode the region requires
    pub fn credentials(&self, region: &RegionConfig) -> Result<Credentials> {
        let credentials = match (&self.secret, &region.vmc_auth_host) {
            (NsxtSecret::ApiToken(token), Some(auth_host)) => Credentials::ApiToken {
                auth_host: auth_host.clone(),
                api_token: token.clone(),
            },
            (NsxtSecret::ApiToken(_), None) => {
                return Err(ActuatorError::Config(format!(
                    "region '{}' has no vmcAuthHost to exchange an API token at",
                    region.name
                )));
            }
            (NsxtSecret::UserPassword { .. }, Some(_)) => {
                return Err(ActuatorError::Config(format!(
                    "region '{}' requires an API token",
                    region.name
                )));
            }
            (NsxtSecret::UserPassword { username, password }, None) => {
                if region.nsxt_remote_auth {
                    Credentials::Remote {
                        username: username.clone(),
                        password: password.clone(),
                    }
                } else {
                    Credentials::Basic {
                        username: username.clone(),
                        password: password.clone(),
                    }
                }
            }
        };
        credentials
            .validate()
            .map_err(|e| ActuatorError::Config(e.to_string()))?;
        Ok(credentials)
    }

    pub fn connector_config(&self, region: &RegionConfig, retries: u32) -> Result<ConnectorConfig> {
        let mut config = ConnectorConfig::new(&region.nsxt_host, self.credentials(region)?);
        config.tls = TlsConfig {
            insecure: region.nsxt_insecure_ssl,
            ca_file: region.nsxt_ca_file.clone(),
            ..TlsConfig::default()
        };
        config.retries = retries;
        config
            .validate()
            .map_err(|e| ActuatorError::Config(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionConfig {
        RegionConfig {
            name: "eu-1".to_string(),
            nsxt_host: "nsx.example.com".to_string(),
            tier0_gateway_name: "tier0-gw".to_string(),
            edge_cluster_name: "edge-cluster-1".to_string(),
            transport_zone_name: "tz-overlay".to_string(),
            snat_ip_pool_name: "snat-pool".to_string(),
            ..RegionConfig::default()
        }
    }

    fn request(secret: NsxtSecret) -> ClusterRequest {
        ClusterRequest {
            namespace: "shoot--dev--app".to_string(),
            region: "eu-1".to_string(),
            garden_id: "garden-eu1".to_string(),
            garden_name: "eu1".to_string(),
            cluster_name: "shoot--dev--app".to_string(),
            workers_network: "10.250.0.0/16".to_string(),
            secret,
        }
    }

    fn user() -> NsxtSecret {
        NsxtSecret::UserPassword {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_credential_modes() {
        let mut region = region();
        let creds = request(user()).credentials(&region).unwrap();
        assert_eq!(creds.mode(), "basic");

        region.nsxt_remote_auth = true;
        let creds = request(user()).credentials(&region).unwrap();
        assert_eq!(creds.mode(), "remote");

        region.vmc_auth_host = Some("console.example.com".to_string());
        let creds = request(NsxtSecret::ApiToken("tok".to_string()))
            .credentials(&region)
            .unwrap();
        assert_eq!(creds.mode(), "api-token");
        assert!(request(user()).credentials(&region).is_err());
    }

    #[test]
    fn test_empty_password_is_a_config_error() {
        let secret = NsxtSecret::UserPassword {
            username: "admin".to_string(),
            password: String::new(),
        };
        assert!(matches!(
            request(secret).credentials(&region()),
            Err(ActuatorError::Config(_))
        ));
    }

    #[test]
    fn test_secret_is_not_printed() {
        let printed = format!("{:?}", request(NsxtSecret::ApiToken("hunter2".to_string())));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_spec_takes_names_from_region() {
        let spec = request(user()).spec(&region());
        assert_eq!(spec.tier0_gateway_name, "tier0-gw");
        assert_eq!(spec.cluster_name, "shoot--dev--app");
        assert!(spec.validate().is_ok());
    }
}
