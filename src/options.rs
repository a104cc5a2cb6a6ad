use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::PreviewError;

pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1500;
pub const DEFAULT_FALLBACK_COMPONENT: &str = "App";
pub const DEFAULT_ROOT_ELEMENT_ID: &str = "root";

/// Runtime script locations loaded by the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CdnConfig {
    pub react: String,
    pub react_dom: String,
    pub babel: String,
    pub tailwind: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        CdnConfig {
            react: "https://unpkg.com/react@18/umd/react.development.js".to_string(),
            react_dom: "https://unpkg.com/react-dom@18/umd/react-dom.development.js".to_string(),
            babel: "https://unpkg.com/@babel/standalone/babel.min.js".to_string(),
            tailwind: "https://cdn.tailwindcss.com".to_string(),
        }
    }
}

/// Host-tunable settings for a preview run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewOptions {
    /// How long a run may stay silent before it is considered rendered.
    pub grace_period_ms: u64,
    /// Identifier rendered when no component can be detected.
    pub fallback_component: String,
    pub tailwind: bool,
    pub root_element_id: String,
    /// Treat a processed-code parse failure as a build error instead of a warning.
    pub strict_syntax_check: bool,
    /// Bind unresolved imported names to a placeholder component.
    pub stub_unknown_imports: bool,
    pub cdn: CdnConfig,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        PreviewOptions {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            fallback_component: DEFAULT_FALLBACK_COMPONENT.to_string(),
            tailwind: true,
            root_element_id: DEFAULT_ROOT_ELEMENT_ID.to_string(),
            strict_syntax_check: false,
            stub_unknown_imports: true,
            cdn: CdnConfig::default(),
        }
    }
}

impl PreviewOptions {
    pub fn from_json(json: &str) -> Result<Self, PreviewError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut options: PreviewOptions = serde_json::from_str(json)?;
        if options.fallback_component.trim().is_empty() {
            options.fallback_component = DEFAULT_FALLBACK_COMPONENT.to_string();
        }
        if options.root_element_id.trim().is_empty() {
            options.root_element_id = DEFAULT_ROOT_ELEMENT_ID.to_string();
        }
        Ok(options)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options =
            PreviewOptions::from_json(r#"{"gracePeriodMs": 200, "cdn": {"babel": "/babel.js"}}"#)
                .unwrap();
        assert_eq!(options.grace_period(), Duration::from_millis(200));
        assert_eq!(options.cdn.babel, "/babel.js");
        assert_eq!(options.cdn.react, CdnConfig::default().react);
        assert_eq!(options.fallback_component, "App");
        assert!(options.tailwind);
    }

    #[test]
    fn test_blank_fallback_is_restored() {
        let options = PreviewOptions::from_json(r#"{"fallbackComponent": "  "}"#).unwrap();
        assert_eq!(options.fallback_component, DEFAULT_FALLBACK_COMPONENT);
    }

    #[test]
    fn test_invalid_json_is_an_options_error() {
        let err = PreviewOptions::from_json("{not json").unwrap_err();
        assert!(matches!(err, PreviewError::InvalidOptions(_)));
    }

    #[test]
    fn test_empty_string_is_default() {
        assert_eq!(PreviewOptions::from_json("").unwrap(), PreviewOptions::default());
    }
}
