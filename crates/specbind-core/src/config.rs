use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level project configuration loaded from `.specbind.yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpecbindConfig {
    pub input: String,
    /// Overrides the document's `basePath` when set.
    pub base_path: Option<String>,
    /// Abort on the first invalid operation instead of skipping it.
    pub strict: bool,
    pub security: SecurityConfig,
}

impl Default for SpecbindConfig {
    fn default() -> Self {
        Self {
            input: "swagger.yaml".to_string(),
            base_path: None,
            strict: true,
            security: SecurityConfig::default(),
        }
    }
}

/// Security resolution options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Token info URL for `oauth2` schemes without `x-tokenInfoUrl`.
    pub token_info_url: Option<String>,
}

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = ".specbind.yaml";

/// Load config from a YAML file. Returns `None` if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Option<SpecbindConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SpecbindConfig =
        serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(config))
}

/// Generate the default config file content.
pub fn default_config_content() -> &'static str {
    r#"# specbind configuration
input: swagger.yaml
# base_path: /api/v1     # overrides basePath from the document
strict: true             # false = skip invalid operations with a warning

security: {}
# security:
#   token_info_url: https://auth.example.com/tokeninfo   # for oauth2 schemes without x-tokenInfoUrl
"#
}
