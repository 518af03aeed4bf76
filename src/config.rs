//! API configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration for a production deployment without cross-origin access.

use serde::Deserialize;

use crate::cors::{AllowedOrigin, CorsConfig};
use crate::diagnostic::ReportMask;
use crate::render::RenderKind;

/// Body field name the CSRF token is submitted under, unless configured.
pub const DEFAULT_CSRF_TOKEN_NAME: &str = "api-csrf-token";

/// Deployment run mode.
///
/// Ordered from strictest to most permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Live deployment
    #[default]
    Production,
    /// Test deployment
    Test,
    /// Developer machine
    Debug,
}

impl RunMode {
    /// Returns `true` for modes more permissive than production.
    pub fn is_relaxed(self) -> bool {
        self > RunMode::Production
    }
}

/// Configuration of the API layer.
///
/// # Examples
///
/// ```
/// use api_render::{ApiConfig, RenderKind, RunMode};
///
/// let config = ApiConfig::from_json_str(r#"{
///     "run_mode": "debug",
///     "default_render": "xml-render",
///     "cors": { "registered_hosts": ["api.example.com"] }
/// }"#).unwrap();
///
/// assert_eq!(config.run_mode, RunMode::Debug);
/// assert_eq!(config.default_render, Some(RenderKind::Xml));
/// assert_eq!(config.csrf_token_name, "api-csrf-token");
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Body field carrying the CSRF token
    #[serde(alias = "csrf-token-name")]
    pub csrf_token_name: String,
    /// Deployment run mode
    pub run_mode: RunMode,
    /// Renderer used when the action has no preference
    pub default_render: Option<RenderKind>,
    /// Severity codes that are reported
    pub report_mask: ReportMask,
    /// Escape non-ASCII characters in JSON output
    pub escape_unicode: bool,
    /// Cross-origin settings
    pub cors: CorsConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            csrf_token_name: DEFAULT_CSRF_TOKEN_NAME.to_string(),
            run_mode: RunMode::default(),
            default_render: None,
            report_mask: ReportMask::ALL,
            escape_unicode: true,
            cors: CorsConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the document is malformed or a field has
    /// the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Sets the CSRF token field name.
    pub fn with_csrf_token_name(mut self, name: impl Into<String>) -> Self {
        self.csrf_token_name = name.into();
        self
    }

    /// Sets the run mode.
    pub fn with_run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    /// Sets the default renderer.
    pub fn with_default_render(mut self, render: RenderKind) -> Self {
        self.default_render = Some(render);
        self
    }

    /// Sets the report mask.
    pub fn with_report_mask(mut self, mask: ReportMask) -> Self {
        self.report_mask = mask;
        self
    }

    /// Turns `\uXXXX` escaping of JSON output on or off.
    pub fn with_escape_unicode(mut self, escape: bool) -> Self {
        self.escape_unicode = escape;
        self
    }

    /// Accepts cross-origin requests to a server host.
    pub fn with_registered_host(mut self, host: impl Into<String>) -> Self {
        self.cors.registered_hosts.push(host.into());
        self
    }

    /// Allows a specific origin.
    pub fn with_allowed_origin(mut self, origin: impl Into<String>, credentials: bool) -> Self {
        self.cors.allowed_origins.push(AllowedOrigin {
            origin: origin.into(),
            credentials,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = ApiConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.run_mode, RunMode::Production);
        assert!(config.escape_unicode);
        assert_eq!(config.report_mask, ReportMask::ALL);
    }

    #[test]
    fn full_document() {
        let config = ApiConfig::from_json_str(
            r#"{
                "csrf-token-name": "tok",
                "run_mode": "test",
                "default_render": "html-part-render",
                "report_mask": 2,
                "escape_unicode": false,
                "cors": {
                    "registered_hosts": ["api.example.com"],
                    "allowed_origins": [{"origin": "https://app.example.com", "credentials": true}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.csrf_token_name, "tok");
        assert_eq!(config.run_mode, RunMode::Test);
        assert_eq!(config.default_render, Some(RenderKind::Html));
        assert_eq!(config.report_mask, ReportMask(2));
        assert!(!config.escape_unicode);
        assert_eq!(config.cors.allowed_origins[0].origin, "https://app.example.com");
        assert!(config.cors.allowed_origins[0].credentials);
    }

    #[test]
    fn unknown_render_name_is_rejected() {
        assert!(ApiConfig::from_json_str(r#"{"default_render": "pdf-render"}"#).is_err());
    }

    #[test]
    fn run_modes_are_ordered() {
        assert!(!RunMode::Production.is_relaxed());
        assert!(RunMode::Test.is_relaxed());
        assert!(RunMode::Debug > RunMode::Test);
    }

    #[test]
    fn builder_setters() {
        let config = ApiConfig::default()
            .with_run_mode(RunMode::Debug)
            .with_default_render(RenderKind::Xml)
            .with_registered_host("api.example.com")
            .with_allowed_origin("https://app.example.com", false);
        assert_eq!(config.cors.registered_hosts, vec!["api.example.com"]);
        assert_eq!(config.cors.allowed_origins.len(), 1);
        assert_eq!(config.default_render, Some(RenderKind::Xml));
    }
}
