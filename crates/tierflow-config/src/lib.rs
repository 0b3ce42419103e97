//! tierflow controller configuration
//!
//! Regions map to NSX-T managers. Each region names the pre-existing objects
//! cluster networks bind to and the vSphere placement of cluster machines,
//! optionally overridden per zone.

pub mod controller;
pub mod error;

pub use controller::{
    ControllerConfig, LoadBalancerSettings, Placement, RealizationSettings, RegionConfig,
    ZoneConfig,
};
pub use error::*;

use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "TIERFLOW_CONFIG_PATH";
const LOCAL_CONFIG_FILE: &str = "tierflow.yaml";

/// Config directory of tierflow (`<config dir>/tierflow`)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("tierflow"))
}

/// Locate the controller config file.
///
/// Search order:
/// 1. `TIERFLOW_CONFIG_PATH`
/// 2. `./tierflow.yaml`
/// 3. `<config dir>/tierflow/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let local = std::env::current_dir()?.join(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Ok(dir) = get_config_dir() {
        let global = dir.join("config.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Find, parse and validate the controller config.
pub fn load_config() -> Result<ControllerConfig> {
    ControllerConfig::load(find_config_file()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str = r#"
regions:
  - name: eu-1
    nsxtHost: nsx.example.com
    tier0GatewayName: tier0-gw
    edgeClusterName: edge-cluster-1
    transportZoneName: tz-overlay
    snatIpPoolName: snat-pool
"#;

    #[test]
    fn test_get_config_dir() {
        if let Ok(dir) = get_config_dir() {
            assert!(dir.ends_with("tierflow"));
        }
    }

    #[test]
    #[serial]
    fn test_env_var_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, MINIMAL).unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&config_path), || {
            assert_eq!(find_config_file().unwrap(), config_path);
            let config = load_config().unwrap();
            assert_eq!(config.regions[0].name, "eu-1");
        });
    }

    #[test]
    #[serial]
    fn test_local_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(LOCAL_CONFIG_FILE), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let found = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(found.unwrap().ends_with(LOCAL_CONFIG_FILE));
    }

    #[test]
    #[serial]
    fn test_missing_env_target_falls_through() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(LOCAL_CONFIG_FILE), MINIMAL).unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let found = temp_env::with_var(
            CONFIG_PATH_ENV,
            Some(temp_dir.path().join("nope.yaml")),
            find_config_file,
        );
        std::env::set_current_dir(original_dir).unwrap();

        assert!(found.unwrap().ends_with(LOCAL_CONFIG_FILE));
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("broken.yaml");
        fs::write(&config_path, "regions: []\n").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&config_path), || {
            assert!(matches!(load_config(), Err(ConfigError::Invalid(_))));
        });
    }
}
