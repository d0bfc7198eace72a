//! Engine configuration.
//!
//! Keys use the camelCase names of the form configuration format:
//!
//! ```toml
//! dataReqUrl = "https://forms.example.com/schema.json"
//! submitUrlOrigin = "https://forms.example.com/submit"
//! buttonText = "Next"
//! timeoutMs = 8000
//! addRequiredAttribute = true
//! ```

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{error::WizardError, submit::DEFAULT_TIMEOUT};

/// Configuration handed to the engine at start.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardConfig {
    /// Location of the schema source.
    pub data_req_url: String,
    /// Endpoint every step is posted to.
    pub submit_url_origin: String,
    /// Text of the submit button.
    pub button_text: String,
    /// Deadline for fetching the schema and for each submission, in milliseconds.
    pub timeout_ms: u64,
    /// Whether required fields also get a native required hint.
    pub add_required_attribute: bool,
    /// Class applied to the form while a submission is in flight.
    #[serde(rename = "loadingCSSClass")]
    pub loading_css_class: String,
    /// Classes applied to the rendered form.
    #[serde(rename = "formCSSClasses")]
    pub form_css_classes: String,
    /// Name of the rendered form.
    pub form_name: String,
    /// Notice shown after an accepted submission.
    pub success_message: Option<String>,
    /// Treat a failed submission as fatal instead of letting the user retry.
    pub abort_on_submit_failure: bool,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            data_req_url: String::new(),
            submit_url_origin: String::new(),
            button_text: "Submit".to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            add_required_attribute: false,
            loading_css_class: "loading".to_string(),
            form_css_classes: "form-styling".to_string(),
            form_name: "form-output".to_string(),
            success_message: None,
            abort_on_submit_failure: false,
        }
    }
}

impl WizardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks that the configuration can drive a run.
    pub fn validate(&self) -> Result<(), WizardError> {
        if self.data_req_url.trim().is_empty() {
            return Err(WizardError::Config("dataReqUrl must be set".into()));
        }
        if self.submit_url_origin.trim().is_empty() {
            return Err(WizardError::Config("submitUrlOrigin must be set".into()));
        }
        if self.timeout_ms == 0 {
            return Err(WizardError::Config("timeoutMs must be greater than 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config: WizardConfig = serde_json::from_value(json!({
            "dataReqUrl": "http://form.test/schema",
            "submitUrlOrigin": "http://form.test/submit"
        }))
        .unwrap();

        assert_eq!(config.button_text, "Submit");
        assert_eq!(config.timeout(), Duration::from_secs(8));
        assert_eq!(config.loading_css_class, "loading");
        assert!(!config.abort_on_submit_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_css_keys() {
        let config: WizardConfig = serde_json::from_value(json!({
            "loadingCSSClass": "busy",
            "formCSSClasses": "a b"
        }))
        .unwrap();
        assert_eq!(config.loading_css_class, "busy");
        assert_eq!(config.form_css_classes, "a b");
    }

    #[test]
    fn test_validate() {
        let config = WizardConfig::default();
        assert!(matches!(config.validate(), Err(WizardError::Config(_))));

        let config = WizardConfig {
            data_req_url: "http://form.test/schema".into(),
            submit_url_origin: "http://form.test/submit".into(),
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WizardError::Config(_))));
    }
}
