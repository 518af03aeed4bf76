//! Origin resolution and cross-origin registry.

use std::collections::HashMap;
use std::collections::HashSet;

use http::header::{ORIGIN, REFERER};
use serde::Deserialize;

use crate::request::ApiRequest;

/// Origin a request was sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    /// The origin as sent, e.g. `https://app.example.com:8443`
    pub origin: String,
    /// Its host part, lowercase, without port
    pub host: String,
}

/// Permission for one specific origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginGrant {
    /// The client must send credentials
    pub requires_credentials: bool,
}

/// Resolves request origins and answers cross-origin policy questions.
pub trait OriginResolver: Send + Sync {
    /// The origin of the request, if it can be determined.
    fn origin_of(&self, request: &ApiRequest) -> Option<RequestOrigin>;

    /// The host serving the request, lowercase and without port.
    fn host_of(&self, request: &ApiRequest) -> String;

    /// Whether cross-origin requests are accepted for this server host.
    fn is_registered(&self, host: &str) -> bool;

    /// Whether the request's specific origin is allowed.
    fn allowed_origin(&self, request: &ApiRequest) -> Option<OriginGrant>;
}

/// An origin allowed to call the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllowedOrigin {
    /// Origin URL or bare host
    pub origin: String,
    /// Whether the client must send credentials
    #[serde(default)]
    pub credentials: bool,
}

/// Cross-origin section of the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Server hosts that accept cross-origin requests
    pub registered_hosts: Vec<String>,
    /// Origins that get their own `Access-Control-Allow-Origin`
    pub allowed_origins: Vec<AllowedOrigin>,
}

/// Configuration-driven [`OriginResolver`].
///
/// The origin comes from the `Origin` header, falling back to `Referer`.
/// Hosts are compared lowercase and without port.
#[derive(Debug, Clone, Default)]
pub struct CorsRegistry {
    registered: HashSet<String>,
    allowed: HashMap<String, bool>,
}

impl CorsRegistry {
    /// Creates an empty registry: no cross-origin access at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration.
    pub fn from_config(config: &CorsConfig) -> Self {
        let mut registry = Self::new();
        for host in &config.registered_hosts {
            registry.register_host(host);
        }
        for allowed in &config.allowed_origins {
            registry.allow_origin(&allowed.origin, allowed.credentials);
        }
        registry
    }

    /// Accepts cross-origin requests to a server host.
    pub fn register_host(&mut self, host: &str) {
        self.registered.insert(normalize_host(host));
    }

    /// Allows a specific origin.
    pub fn allow_origin(&mut self, origin: &str, requires_credentials: bool) {
        let host = host_of_url(origin).unwrap_or_else(|| normalize_host(origin));
        self.allowed.insert(host, requires_credentials);
    }
}

impl OriginResolver for CorsRegistry {
    fn origin_of(&self, request: &ApiRequest) -> Option<RequestOrigin> {
        let origin = request
            .header(ORIGIN.as_str())
            .filter(|o| !o.is_empty() && *o != "null")
            .map(str::to_string)
            .or_else(|| request.header(REFERER.as_str()).and_then(origin_of_url))?;
        let host = host_of_url(&origin)?;
        Some(RequestOrigin { origin, host })
    }

    fn host_of(&self, request: &ApiRequest) -> String {
        request.host().map(normalize_host).unwrap_or_default()
    }

    fn is_registered(&self, host: &str) -> bool {
        self.registered.contains(&normalize_host(host))
    }

    fn allowed_origin(&self, request: &ApiRequest) -> Option<OriginGrant> {
        let origin = self.origin_of(request)?;
        self.allowed
            .get(&origin.host)
            .map(|&requires_credentials| OriginGrant {
                requires_credentials,
            })
    }
}

/// `scheme://authority` of a URL, dropping path, query and fragment.
fn origin_of_url(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if scheme.is_empty() || authority.is_empty() {
        return None;
    }
    Some(format!("{}://{}", scheme, authority))
}

/// Lowercase host of a URL, without user info or port.
fn host_of_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();
    let host = normalize_host(authority);
    (!host.is_empty()).then_some(host)
}

/// Lowercases a host and strips its port. IPv6 brackets are kept.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split(':').next().unwrap_or_default()
    };
    without_port.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request(headers: &[(&str, &str)]) -> ApiRequest {
        let mut req = ApiRequest::new("req-cors", Method::GET);
        for (name, value) in headers {
            req.add_header(name, value);
        }
        req
    }

    #[test]
    fn origin_header_wins_over_referer() {
        let registry = CorsRegistry::new();
        let req = request(&[
            ("Origin", "https://App.Example.com:8443"),
            ("Referer", "https://other.example/page"),
        ]);
        let origin = registry.origin_of(&req).unwrap();
        assert_eq!(origin.origin, "https://App.Example.com:8443");
        assert_eq!(origin.host, "app.example.com");
    }

    #[test]
    fn referer_is_the_fallback() {
        let registry = CorsRegistry::new();
        let req = request(&[("Referer", "https://site.example/path?q=1")]);
        let origin = registry.origin_of(&req).unwrap();
        assert_eq!(origin.origin, "https://site.example");
        assert_eq!(origin.host, "site.example");
    }

    #[test]
    fn no_origin_information() {
        let registry = CorsRegistry::new();
        assert!(registry.origin_of(&request(&[])).is_none());
        assert!(registry
            .origin_of(&request(&[("Origin", "null")]))
            .is_none());
    }

    #[test]
    fn server_host_drops_port() {
        let registry = CorsRegistry::new();
        assert_eq!(
            registry.host_of(&request(&[("Host", "API.example.com:8080")])),
            "api.example.com"
        );
        assert_eq!(registry.host_of(&request(&[("Host", "[::1]:80")])), "[::1]");
    }

    #[test]
    fn registry_from_config() {
        let config = CorsConfig {
            registered_hosts: vec!["api.example.com".to_string()],
            allowed_origins: vec![AllowedOrigin {
                origin: "https://app.example.com".to_string(),
                credentials: true,
            }],
        };
        let registry = CorsRegistry::from_config(&config);

        assert!(registry.is_registered("API.example.com:443"));
        assert!(!registry.is_registered("evil.example"));

        let allowed = request(&[("Origin", "https://app.example.com")]);
        assert_eq!(
            registry.allowed_origin(&allowed),
            Some(OriginGrant {
                requires_credentials: true
            })
        );
        let other = request(&[("Origin", "https://other.example.com")]);
        assert_eq!(registry.allowed_origin(&other), None);
    }
}
