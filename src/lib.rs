//! Request admission and model rendering for API-style HTTP actions.
//!
//! An API action fills a result model; a renderer turns the model into a
//! JSON, XML or HTML fragment payload. Before the action runs, the request
//! passes an admission gate that checks, in order:
//!
//! 1. anonymous access
//! 2. cross-origin access, negotiating the CORS response headers
//! 3. preflight (`OPTIONS` is answered right away)
//! 4. the CSRF token
//!
//! Denials are plain `403` responses. Diagnostics raised while the model is
//! produced are recorded on the model and rendered as structured errors.
//!
//! # Core Types
//!
//! - [`ApiAction`]: the action body plus its admission policy hooks
//! - [`Gate`]: type-state admission; only `Gate<Admitted>` can dispatch
//! - [`ApiModel`] and [`LazyModel`]: eager and pull-based result models
//! - [`JsonRender`], [`XmlRender`], [`HtmlRender`]: the format renderers
//! - [`DiagnosticTrap`]: scoped recording of classified diagnostics
//!
//! # Examples
//!
//! ```
//! use api_render::{ApiModel, JsonRender, OutputRender, ResponseSlot, ResultModel};
//!
//! let mut model = ApiModel::new();
//! model.set("name", "Alice");
//!
//! let mut slot = ResponseSlot::default();
//! JsonRender::new().render(&mut model, &mut slot).unwrap();
//!
//! let response = slot.into_response();
//! assert_eq!(response.header("Content-Type"), Some("application/json"));
//! assert!(model.errors().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod config;
mod cors;
mod csrf;
mod diagnostic;
mod environment;
mod error;
mod gate;
mod logging;
pub mod model;
pub mod render;
mod request;
mod response;
mod secret;
pub mod state;
mod trap;

pub use action::{
    ActionContext, ActionFailure, ApiAction, Recovery, DEFAULT_ACCEPTED_METHODS,
};
pub use config::{ApiConfig, RunMode, DEFAULT_CSRF_TOKEN_NAME};
pub use cors::{AllowedOrigin, CorsConfig, CorsRegistry, OriginGrant, OriginResolver, RequestOrigin};
pub use csrf::{issue_api_csrf_token, CsrfToken, CsrfTokenManager};
pub use diagnostic::{
    classify, Diagnostic, ErrorKind, Failure, Location, Raised, ReportMask, SeverityCode,
    SourceError,
};
pub use environment::ApiEnvironment;
pub use error::{Denial, DenialKind, Error};
pub use gate::{
    handle_request, handle_request_with, AdmissionContext, Gate, Outcome, PreflightCheck,
};
pub use logging::RequestLog;
pub use model::{ApiModel, HtmlModelAdapter, LazyModel, ModelValue, Produced, ResultModel};
pub use render::{
    HtmlRender, JsonRender, OutputRender, RenderKind, ResponseSlot, XmlElement, XmlNode,
    XmlRender,
};
pub use request::ApiRequest;
pub use response::{Response, SendState};
pub use secret::Secret;
pub use trap::{Aborted, DiagnosticTrap, ErrorSink};
