use std::fmt;

use http::StatusCode;

use crate::diagnostic::Failure;
use crate::response::Response;

/// Errors that end the handling of a request without a rendered model.
#[derive(Debug)]
pub enum Error {
    /// The admission gate refused the request
    Denied(Denial),
    /// An action failure or error the action's hooks chose not to handle
    Unhandled(Failure),
    /// The model could not be encoded
    Encoding(serde_json::Error),
}

impl Error {
    /// The HTTP status the outer framework should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Denied(d) => d.status(),
            Error::Unhandled(_) | Error::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Denied(d) => write!(f, "Request denied: {}", d),
            Error::Unhandled(failure) => write!(f, "Unhandled action failure: {}", failure),
            Error::Encoding(e) => write!(f, "Encoding failed: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Denied(d) => Some(d),
            Error::Unhandled(failure) => Some(failure),
            Error::Encoding(e) => Some(e),
        }
    }
}

impl From<Denial> for Error {
    fn from(d: Denial) -> Self {
        Error::Denied(d)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e)
    }
}

/// An admission denial with details about which check failed.
///
/// Denials are terminal for the request. They never reach a result model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// The check that failed
    pub kind: DenialKind,
    /// Human-readable message explaining the denial
    pub message: String,
}

impl Denial {
    /// Creates a new denial.
    pub fn new(kind: DenialKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The HTTP status code carried by this denial.
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Builds the plain status response sent for this denial.
    ///
    /// The response carries no model body.
    pub fn into_response(self) -> Response {
        Response::with_status(self.status())
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Denial {}

/// The kind of admission denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// Anonymous request while anonymous access is forbidden
    DeniedRequest,
    /// Cross-origin request the action does not accept
    DeniedCrossOriginRequest,
    /// Missing or invalid CSRF token
    CsrfMismatch,
    /// No CSRF token manager is configured
    SecurityMisconfigured,
}

impl DenialKind {
    /// The HTTP status code for this kind of denial.
    pub fn status(self) -> StatusCode {
        match self {
            DenialKind::DeniedRequest
            | DenialKind::DeniedCrossOriginRequest
            | DenialKind::CsrfMismatch
            | DenialKind::SecurityMisconfigured => StatusCode::FORBIDDEN,
        }
    }
}

impl fmt::Display for DenialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialKind::DeniedRequest => write!(f, "DeniedRequest"),
            DenialKind::DeniedCrossOriginRequest => write!(f, "DeniedCrossOriginRequest"),
            DenialKind::CsrfMismatch => write!(f, "CSRFMismatch"),
            DenialKind::SecurityMisconfigured => write!(f, "SecurityMisconfigured"),
        }
    }
}
