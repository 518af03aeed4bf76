use std::collections::HashMap;

use http::header::{HeaderName, HeaderValue, HOST};
use http::{HeaderMap, Method};

/// An inbound API request, reduced to what admission and rendering read.
///
/// Framework integrations build this from their own request type: method,
/// headers, and the decoded form body (where the CSRF token is submitted).
///
/// # Examples
///
/// ```
/// use api_render::ApiRequest;
/// use http::Method;
///
/// let request = ApiRequest::new("req-42", Method::POST)
///     .with_header("Host", "api.example.com")
///     .with_body_field("api-csrf-token", "abc");
///
/// assert_eq!(request.request_id(), "req-42");
/// assert_eq!(request.host(), Some("api.example.com"));
/// assert_eq!(request.body_field("api-csrf-token"), Some("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    request_id: String,
    method: Method,
    headers: HeaderMap,
    body_fields: HashMap<String, String>,
}

impl ApiRequest {
    /// Creates a request with no headers and an empty body.
    pub fn new(request_id: impl Into<String>, method: Method) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            headers: HeaderMap::new(),
            body_fields: HashMap::new(),
        }
    }

    /// Adds a header, builder style.
    ///
    /// Invalid names or values are dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Adds a decoded body field, builder style.
    pub fn with_body_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_body_field(name, value);
        self
    }

    /// Adds a header. Returns `false` if the name or value is invalid.
    pub fn add_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
                true
            }
            _ => false,
        }
    }

    /// Adds a decoded body field.
    pub fn add_body_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.body_fields.insert(name.into(), value.into());
    }

    /// Request identifier used in logs.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// All headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Host` header as sent, port included.
    pub fn host(&self) -> Option<&str> {
        self.header(HOST.as_str())
    }

    /// A decoded body field.
    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.body_fields.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = ApiRequest::new("r", Method::GET).with_header("Origin", "https://a.example");
        assert_eq!(request.header("origin"), Some("https://a.example"));
        assert_eq!(request.header("ORIGIN"), Some("https://a.example"));
    }

    #[test]
    fn invalid_headers_are_dropped() {
        let mut request = ApiRequest::new("r", Method::GET);
        assert!(!request.add_header("bad name", "x"));
        assert!(request.headers().is_empty());
    }

    #[test]
    fn extension_methods_are_kept_verbatim() {
        let method = Method::from_bytes(b"options").unwrap();
        let request = ApiRequest::new("r", method);
        assert_eq!(request.method().as_str(), "options");
    }

    #[test]
    fn missing_body_field() {
        let request = ApiRequest::new("r", Method::POST);
        assert_eq!(request.body_field("token"), None);
    }
}
