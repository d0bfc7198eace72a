//! Configuration file handling.
//!
//! The configuration lives in `.formwiz.toml` in the working directory
//! unless another path is given on the command line:
//!
//! ```toml
//! dataReqUrl = "https://forms.example.com/schema.json"
//! submitUrlOrigin = "https://forms.example.com/submit"
//! timeoutMs = 5000
//!
//! [headers]
//! Authorization = "Bearer ..."
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use formwiz::WizardConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".formwiz.toml";

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AppConfig {
    /// Engine settings.
    #[serde(flatten)]
    pub wizard: WizardConfig,
    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Values given on the command line, taking precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_url: Option<String>,
    pub submit_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl AppConfig {
    /// Loads the configuration file.
    ///
    /// A missing default file yields the default configuration; a missing
    /// file that was named explicitly is an error.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path.is_some();
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if !explicit && !path.exists() {
            info!("No {DEFAULT_CONFIG_FILE} found, using default configuration");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.data_url {
            self.wizard.data_req_url = url;
        }
        if let Some(url) = overrides.submit_url {
            self.wizard.submit_url_origin = url;
        }
        if let Some(ms) = overrides.timeout_ms {
            self.wizard.timeout_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.toml");
        std::fs::write(
            &path,
            r#"
dataReqUrl = "http://form.test/schema"
submitUrlOrigin = "http://form.test/submit"
loadingCSSClass = "busy"
successMessage = "Thanks!"

[headers]
X-Api-Key = "secret"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.wizard.data_req_url, "http://form.test/schema");
        assert_eq!(config.wizard.loading_css_class, "busy");
        assert_eq!(config.wizard.success_message.as_deref(), Some("Thanks!"));
        assert_eq!(config.wizard.timeout_ms, 8000);
        assert_eq!(config.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
    }

    #[tokio::test]
    async fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(AppConfig::load(Some(&path)).await.is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        config.apply(Overrides {
            data_url: Some("schema.json".into()),
            timeout_ms: Some(100),
            ..Default::default()
        });
        assert_eq!(config.wizard.data_req_url, "schema.json");
        assert_eq!(config.wizard.submit_url_origin, "");
        assert_eq!(config.wizard.timeout_ms, 100);
    }
}
