use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - TIERFLOW_CONFIG_PATH\n\
        - ./tierflow.yaml\n\
        - <config dir>/tierflow/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("Region not configured: {0}")]
    UnknownRegion(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
