use http::header::{
    HeaderName, HeaderValue, CONTENT_LENGTH, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use http::{HeaderMap, Method, StatusCode};

use crate::request::ApiRequest;

/// How far a response has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// Nothing sent yet
    #[default]
    Pending,
    /// Status line and headers sent, no body
    HeadersSent,
    /// Headers and body sent
    Sent,
}

/// The outbound response of one request cycle.
///
/// A single response is shared by the gate and the renderers: CORS headers
/// negotiated during admission stay on it, and the renderer writes the
/// payload into it once.
#[derive(Debug, Clone, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    send_state: SendState,
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty response with the given status.
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Overrides the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response headers, mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing every existing value of that name.
    ///
    /// Returns `false` and leaves the headers untouched if the name or the
    /// value is not valid in HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            return false;
        };
        self.headers.insert(name, value);
        true
    }

    /// Body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// How far this response has been sent.
    pub fn send_state(&self) -> SendState {
        self.send_state
    }

    /// Adjusts the response to the request before sending.
    ///
    /// Informational and empty statuses lose their body; `HEAD` requests
    /// keep the length but drop the body.
    pub fn prepare(&mut self, request: &ApiRequest) {
        if self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED
        {
            self.body.clear();
            self.headers.remove(CONTENT_LENGTH);
            return;
        }

        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        if request.method() == Method::HEAD {
            self.body.clear();
        }
    }

    /// Checks the request's validators against this response.
    ///
    /// Only `GET` and `HEAD` can be answered as not modified. A matching
    /// `If-None-Match` wins over `If-Modified-Since`. When the response is
    /// not modified it is turned into an empty `304`.
    pub fn is_not_modified(&mut self, request: &ApiRequest) -> bool {
        let method = request.method();
        if method != Method::GET && method != Method::HEAD {
            return false;
        }

        let mut not_modified = false;
        let etag = self.header(ETAG.as_str()).map(str::to_string);
        let last_modified = self.header(LAST_MODIFIED.as_str()).map(str::to_string);

        if let Some(candidates) = request.header(IF_NONE_MATCH.as_str()) {
            if let Some(etag) = etag {
                let etag = etag.trim_start_matches("W/");
                not_modified = candidates.split(',').map(str::trim).any(|c| {
                    c == "*" || c.trim_start_matches("W/") == etag
                });
            }
        } else if let Some(since) = request.header(IF_MODIFIED_SINCE.as_str()) {
            not_modified = last_modified.as_deref() == Some(since);
        }

        if not_modified {
            self.status = StatusCode::NOT_MODIFIED;
            self.body.clear();
        }
        not_modified
    }

    /// Sends the status line and headers only.
    pub fn send_headers(&mut self) {
        if self.send_state == SendState::Pending {
            tracing::debug!(status = self.status.as_u16(), "headers sent");
            self.send_state = SendState::HeadersSent;
        }
    }

    /// Sends headers and body.
    pub fn send(&mut self) {
        self.send_headers();
        if self.send_state == SendState::HeadersSent {
            tracing::debug!(bytes = self.body.len(), "body sent");
            self.send_state = SendState::Sent;
        }
    }
}
