//! The admission gate.
//!
//! A request passes four checks before its action runs. Each check is a
//! consuming transition to the next type-state, so skipping one does not
//! compile:
//!
//! ```text
//! Gate<Received> --identify--> Gate<Identified> --negotiate--> Gate<Negotiated>
//!     --preflight--> Gate<Cleared> --verify_csrf--> Gate<Admitted> --dispatch--> Response
//! ```
//!
//! `preflight` is the only early exit that is not a denial: an `OPTIONS`
//! request is answered right there and the action never runs.

use std::fmt;
use std::marker::PhantomData;

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};

use crate::action::{ActionContext, ActionFailure, ApiAction, Recovery};
use crate::cors::RequestOrigin;
use crate::csrf::CsrfToken;
use crate::diagnostic::Raised;
use crate::environment::ApiEnvironment;
use crate::error::{Denial, DenialKind, Error};
use crate::logging::RequestLog;
use crate::model::ResultModel;
use crate::render::ResponseSlot;
use crate::request::ApiRequest;
use crate::response::Response;
use crate::state::{Admitted, Cleared, Identified, Negotiated, Received};
use crate::trap::DiagnosticTrap;

/// Origin facts resolved once when the request is received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionContext {
    origin: Option<RequestOrigin>,
    server_host: String,
}

impl AdmissionContext {
    fn resolve(env: &ApiEnvironment, request: &ApiRequest) -> Self {
        Self {
            origin: env.origins().origin_of(request),
            server_host: env.origins().host_of(request),
        }
    }

    /// Origin of the request, if known.
    pub fn origin(&self) -> Option<&RequestOrigin> {
        self.origin.as_ref()
    }

    /// Host serving the request.
    pub fn server_host(&self) -> &str {
        &self.server_host
    }

    /// Whether the origin host differs from the server host.
    ///
    /// A request without origin counts as cross-origin.
    pub fn is_cross_origin(&self) -> bool {
        self.origin
            .as_ref()
            .map_or(true, |origin| origin.host != self.server_host)
    }
}

/// Result of the preflight check.
pub enum PreflightCheck<'a, A: ApiAction + ?Sized> {
    /// The request was a preflight and its response has been sent.
    Answered(Response),
    /// Not a preflight; admission continues.
    Continue(Gate<'a, A, Cleared>),
}

/// Terminal result of a request that was not denied.
#[derive(Debug)]
pub enum Outcome {
    /// Preflight answered; no action ran.
    Preflight(Response),
    /// Action ran and its model was rendered.
    Rendered(Response),
}

impl Outcome {
    /// The response, whichever way it was produced.
    pub fn response(&self) -> &Response {
        match self {
            Outcome::Preflight(response) | Outcome::Rendered(response) => response,
        }
    }

    /// Consumes the outcome into its response.
    pub fn into_response(self) -> Response {
        match self {
            Outcome::Preflight(response) | Outcome::Rendered(response) => response,
        }
    }
}

/// A request on its way through admission.
///
/// The response travels with the gate, so CORS headers negotiated early
/// end up on the rendered response.
pub struct Gate<'a, A: ApiAction + ?Sized, S> {
    env: &'a ApiEnvironment,
    action: &'a A,
    request: &'a ApiRequest,
    admission: AdmissionContext,
    response: Response,
    _state: PhantomData<S>,
}

impl<A: ApiAction + ?Sized, S> fmt::Debug for Gate<'_, A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("state", &std::any::type_name::<S>())
            .field("request_id", &self.request.request_id())
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

impl<A: ApiAction + ?Sized> fmt::Debug for PreflightCheck<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreflightCheck::Answered(response) => f.debug_tuple("Answered").field(response).finish(),
            PreflightCheck::Continue(gate) => f.debug_tuple("Continue").field(gate).finish(),
        }
    }
}

impl<'a, A: ApiAction + ?Sized, S> Gate<'a, A, S> {
    /// Origin facts of the request.
    pub fn admission(&self) -> &AdmissionContext {
        &self.admission
    }

    /// The request being admitted.
    pub fn request(&self) -> &'a ApiRequest {
        self.request
    }

    /// The response built so far.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Request-scoped logger.
    pub fn log(&self) -> RequestLog<'a> {
        RequestLog::new(self.request.request_id())
    }

    fn advance<T>(self) -> Gate<'a, A, T> {
        Gate {
            env: self.env,
            action: self.action,
            request: self.request,
            admission: self.admission,
            response: self.response,
            _state: PhantomData,
        }
    }

    fn deny(&self, kind: DenialKind, message: &str) -> Denial {
        self.log()
            .warn(format_args!("request denied ({}): {}", kind, message));
        Denial::new(kind, message)
    }
}

impl<'a, A: ApiAction + ?Sized> Gate<'a, A, Received> {
    /// Receives a request, resolving its origin facts.
    pub fn new(env: &'a ApiEnvironment, action: &'a A, request: &'a ApiRequest) -> Self {
        Self {
            env,
            action,
            request,
            admission: AdmissionContext::resolve(env, request),
            response: Response::new(),
            _state: PhantomData,
        }
    }

    /// Uses an already attached response instead of a fresh one.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = response;
        self
    }

    /// Anonymous check.
    ///
    /// # Errors
    ///
    /// [`DenialKind::DeniedRequest`] if the request has no origin and the
    /// action refuses anonymous requests.
    pub fn identify(self) -> Result<Gate<'a, A, Identified>, Denial> {
        if self.admission.origin.is_none()
            && !self.action.accepts_anonymous_request(self.env, self.request)
        {
            return Err(self.deny(
                DenialKind::DeniedRequest,
                "Anonymous requests are not allowed for the required action",
            ));
        }
        Ok(self.advance())
    }
}

impl<'a, A: ApiAction + ?Sized> Gate<'a, A, Identified> {
    /// Cross-origin check and CORS header negotiation.
    ///
    /// Same-origin requests pass untouched.
    ///
    /// # Errors
    ///
    /// [`DenialKind::DeniedCrossOriginRequest`] if the request is
    /// cross-origin and the action does not accept that.
    pub fn negotiate(mut self) -> Result<Gate<'a, A, Negotiated>, Denial> {
        if self.admission.is_cross_origin() {
            if !self.action.accepts_cross_origin_request(self.env, self.request) {
                return Err(self.deny(
                    DenialKind::DeniedCrossOriginRequest,
                    "Cross origin requests are not permitted for this action",
                ));
            }
            self.negotiate_headers();
        }
        Ok(self.advance())
    }

    fn negotiate_headers(&mut self) {
        let grant = self.action.accept_origin(self.env, self.request);
        let allow_origin = match (&grant, &self.admission.origin) {
            (Some(_), Some(origin)) => origin.origin.as_str(),
            _ => "*",
        };
        self.response
            .set_header(ACCESS_CONTROL_ALLOW_ORIGIN.as_str(), allow_origin);

        if grant.map_or(false, |g| g.requires_credentials) {
            self.response
                .set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS.as_str(), "true");
        }
        if let Some(methods) = joined_upper(self.action.accepted_http_methods(self.request)) {
            self.response
                .set_header(ACCESS_CONTROL_ALLOW_METHODS.as_str(), &methods);
        }
        if let Some(headers) = joined_upper(self.action.accepted_http_headers(self.request)) {
            self.response
                .set_header(ACCESS_CONTROL_ALLOW_HEADERS.as_str(), &headers);
        }

        self.log().debug(format_args!(
            "cross-origin request from {:?} to {} allowed as {}",
            self.admission.origin.as_ref().map(|o| o.origin.as_str()),
            self.admission.server_host,
            allow_origin
        ));
    }
}

impl<'a, A: ApiAction + ?Sized> Gate<'a, A, Negotiated> {
    /// Preflight short-circuit.
    ///
    /// A preflight request gets its response finalized and sent here,
    /// honoring conditional request headers.
    pub fn preflight(mut self) -> PreflightCheck<'a, A> {
        if !self.action.is_preflight_request(self.request) {
            return PreflightCheck::Continue(self.advance());
        }

        self.log().debug(format_args!("answering preflight request"));
        self.action.tear_down(self.request);
        self.response.prepare(self.request);
        if self.response.is_not_modified(self.request) {
            self.response.send_headers();
        } else {
            self.response.send();
        }
        PreflightCheck::Answered(self.response)
    }
}

impl<'a, A: ApiAction + ?Sized> Gate<'a, A, Cleared> {
    /// CSRF check.
    ///
    /// The token is read from the body field named by the configuration. A
    /// missing token is a mismatch.
    ///
    /// # Errors
    ///
    /// - [`DenialKind::SecurityMisconfigured`] if a check is required but no
    ///   token manager is installed.
    /// - [`DenialKind::CsrfMismatch`] if the token is missing or invalid.
    pub fn verify_csrf(self) -> Result<Gate<'a, A, Admitted>, Denial> {
        if self.action.enable_csrf_check(self.request) {
            let Some(manager) = self.env.csrf_manager() else {
                return Err(self.deny(
                    DenialKind::SecurityMisconfigured,
                    "No CSRF management defined, can not validate request",
                ));
            };

            let name = &self.env.config().csrf_token_name;
            let valid = match self.request.body_field(name) {
                Some(value) => {
                    let token = CsrfToken::new(name.as_str(), value);
                    self.log().debug(format_args!("checking {:?}", token));
                    manager.is_token_valid(&token)
                }
                None => false,
            };
            if !valid {
                return Err(self.deny(DenialKind::CsrfMismatch, "Request is invalid"));
            }
        }
        Ok(self.advance())
    }
}

impl<'a, A: ApiAction + ?Sized> Gate<'a, A, Admitted> {
    /// Runs the action and renders its model.
    ///
    /// Diagnostics raised by the action are trapped into the model for the
    /// duration of the action. A failure returned by the action goes
    /// through [`ApiAction::handle_failure`].
    ///
    /// # Errors
    ///
    /// - [`Error::Unhandled`] if the recovery hook declines a failure.
    /// - [`Error::Encoding`] if the payload cannot be encoded.
    pub fn dispatch(self) -> Result<Response, Error> {
        let log = self.log();
        let config = self.env.config();
        let render = self
            .action
            .default_render()
            .or(config.default_render)
            .unwrap_or_default();
        let mut model = self.action.make_model(self.request);
        model.set_report_mask(config.report_mask);
        let mut response = self.response;

        log.info(format_args!("dispatching action, render {}", render));
        let action = self.action;
        let on_error =
            |raised: &Raised, model: &mut dyn ResultModel| action.handle_error(raised, model);
        let result = {
            let trap = DiagnosticTrap::install(model.as_mut(), config.report_mask, "dispatch");
            let mut ctx = ActionContext::new(self.request, trap, &on_error, &mut response, log);
            action.perform(&mut ctx)
        };

        match result {
            Ok(()) => {}
            Err(ActionFailure::Aborted(aborted)) => {
                log.debug(format_args!("action aborted: {}", aborted));
            }
            Err(ActionFailure::Cancelled) => {
                log.debug(format_args!("action cancelled"));
            }
            Err(ActionFailure::Unhandled(failure)) => {
                log.error(format_args!("unhandled action error: {}", failure));
                return Err(Error::Unhandled(failure));
            }
            Err(ActionFailure::Failed(failure)) => {
                match self.action.handle_failure(failure, model.as_mut()) {
                    Recovery::Handled => log.debug(format_args!("action failure handled")),
                    Recovery::Unhandled(failure) => {
                        log.error(format_args!("unhandled action failure: {}", failure));
                        return Err(Error::Unhandled(failure));
                    }
                }
            }
        }

        let mut slot = ResponseSlot::new(Some(response));
        render.renderer(config).render(model.as_mut(), &mut slot)?;
        let response = slot.into_response();
        log.debug(format_args!(
            "rendered {} bytes with {} errors",
            response.body().len(),
            model.errors().len()
        ));
        Ok(response)
    }
}

/// Runs a request through admission and, if admitted, the action.
///
/// # Errors
///
/// - [`Error::Denied`] if an admission check fails.
/// - Any error from [`Gate::dispatch`].
///
/// # Examples
///
/// ```
/// use api_render::{handle_request, ActionContext, ActionFailure, ApiAction, ApiConfig,
///     ApiEnvironment, ApiRequest, Outcome, RunMode};
/// use http::Method;
///
/// struct Hello;
///
/// impl ApiAction for Hello {
///     fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionFailure> {
///         ctx.set("hello", "world");
///         Ok(())
///     }
/// }
///
/// let env = ApiEnvironment::new(ApiConfig::default()
///     .with_run_mode(RunMode::Debug)
///     .with_registered_host("api.example.com"));
/// let request = ApiRequest::new("req-1", Method::GET).with_header("Host", "api.example.com");
///
/// let outcome = handle_request(&env, &Hello, &request).unwrap();
/// assert!(matches!(outcome, Outcome::Rendered(_)));
/// assert_eq!(outcome.response().header("Access-Control-Allow-Origin"), Some("*"));
/// ```
pub fn handle_request<A: ApiAction + ?Sized>(
    env: &ApiEnvironment,
    action: &A,
    request: &ApiRequest,
) -> Result<Outcome, Error> {
    handle_request_with(env, action, request, Response::new())
}

/// Like [`handle_request`], but admission headers and the rendered payload
/// go onto an already attached response.
///
/// # Errors
///
/// Same as [`handle_request`].
pub fn handle_request_with<A: ApiAction + ?Sized>(
    env: &ApiEnvironment,
    action: &A,
    request: &ApiRequest,
    response: Response,
) -> Result<Outcome, Error> {
    let gate = Gate::new(env, action, request)
        .with_response(response)
        .identify()?
        .negotiate()?;
    match gate.preflight() {
        PreflightCheck::Answered(response) => Ok(Outcome::Preflight(response)),
        PreflightCheck::Continue(gate) => Ok(Outcome::Rendered(gate.verify_csrf()?.dispatch()?)),
    }
}

fn joined_upper(tokens: Option<Vec<String>>) -> Option<String> {
    let tokens = tokens.filter(|t| !t.is_empty())?;
    Some(
        tokens
            .iter()
            .map(|t| t.to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, RunMode};
    use crate::cors::OriginGrant;
    use crate::response::SendState;
    use http::{Method, StatusCode};

    struct Echo;

    impl ApiAction for Echo {
        fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionFailure> {
            ctx.set("ok", true);
            Ok(())
        }
    }

    struct Restricted;

    impl ApiAction for Restricted {
        fn accepted_http_methods(&self, _request: &ApiRequest) -> Option<Vec<String>> {
            Some(vec!["get".to_string(), "put".to_string()])
        }

        fn accepted_http_headers(&self, _request: &ApiRequest) -> Option<Vec<String>> {
            Some(vec!["x-api-key".to_string(), "content-type".to_string()])
        }

        fn accept_origin(&self, _env: &ApiEnvironment, _request: &ApiRequest) -> Option<OriginGrant> {
            Some(OriginGrant {
                requires_credentials: true,
            })
        }

        fn perform(&self, _ctx: &mut ActionContext<'_>) -> Result<(), ActionFailure> {
            Ok(())
        }
    }

    fn env() -> ApiEnvironment {
        ApiEnvironment::new(ApiConfig::default().with_registered_host("api.example.com"))
    }

    fn same_origin(method: Method) -> ApiRequest {
        ApiRequest::new("req-gate", method)
            .with_header("Host", "api.example.com")
            .with_header("Origin", "https://api.example.com")
    }

    #[test]
    fn admission_context_detects_cross_origin() {
        let env = env();
        let same = same_origin(Method::GET);
        let gate = Gate::new(&env, &Echo, &same);
        assert!(!gate.admission().is_cross_origin());
        assert_eq!(gate.admission().server_host(), "api.example.com");

        let cross = ApiRequest::new("r", Method::GET)
            .with_header("Host", "api.example.com")
            .with_header("Origin", "https://app.example.com");
        assert!(Gate::new(&env, &Echo, &cross).admission().is_cross_origin());

        let anonymous = ApiRequest::new("r", Method::GET).with_header("Host", "api.example.com");
        assert!(Gate::new(&env, &Echo, &anonymous).admission().is_cross_origin());
    }

    #[test]
    fn anonymous_request_denied_in_production() {
        let env = env();
        let request = ApiRequest::new("r", Method::GET).with_header("Host", "api.example.com");
        let denial = Gate::new(&env, &Echo, &request).identify().unwrap_err();
        assert_eq!(denial.kind, DenialKind::DeniedRequest);
        assert_eq!(denial.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn anonymous_request_allowed_in_test_mode() {
        let env = ApiEnvironment::new(ApiConfig::default().with_run_mode(RunMode::Test));
        let request = ApiRequest::new("r", Method::GET);
        assert!(Gate::new(&env, &Echo, &request).identify().is_ok());
    }

    #[test]
    fn same_origin_sets_no_cors_headers() {
        let env = env();
        let request = same_origin(Method::GET);
        let gate = Gate::new(&env, &Echo, &request)
            .identify()
            .unwrap()
            .negotiate()
            .unwrap();
        assert!(gate.response().headers().is_empty());
    }

    #[test]
    fn cross_origin_to_unregistered_host_is_denied() {
        let env = env();
        let request = ApiRequest::new("r", Method::GET)
            .with_header("Host", "other.example.com")
            .with_header("Origin", "https://app.example.com");
        let denial = Gate::new(&env, &Echo, &request)
            .identify()
            .unwrap()
            .negotiate()
            .unwrap_err();
        assert_eq!(denial.kind, DenialKind::DeniedCrossOriginRequest);
    }

    #[test]
    fn cross_origin_gets_wildcard_and_default_methods() {
        let env = env();
        let request = ApiRequest::new("r", Method::GET)
            .with_header("Host", "api.example.com")
            .with_header("Origin", "https://app.example.com");
        let gate = Gate::new(&env, &Echo, &request)
            .identify()
            .unwrap()
            .negotiate()
            .unwrap();
        let response = gate.response();
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(
            response.header("Access-Control-Allow-Methods"),
            Some("GET,POST,OPTIONS")
        );
        assert_eq!(response.header("Access-Control-Allow-Headers"), None);
        assert_eq!(response.header("Access-Control-Allow-Credentials"), None);
    }

    #[test]
    fn accepted_origin_is_echoed_with_credentials() {
        let env = env();
        let request = ApiRequest::new("r", Method::GET)
            .with_header("Host", "api.example.com")
            .with_header("Origin", "https://app.example.com");
        let gate = Gate::new(&env, &Restricted, &request)
            .identify()
            .unwrap()
            .negotiate()
            .unwrap();
        let response = gate.response();
        assert_eq!(
            response.header("Access-Control-Allow-Origin"),
            Some("https://app.example.com")
        );
        assert_eq!(response.header("Access-Control-Allow-Credentials"), Some("true"));
        assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET,PUT"));
        assert_eq!(
            response.header("Access-Control-Allow-Headers"),
            Some("X-API-KEY,CONTENT-TYPE")
        );
    }

    #[test]
    fn preflight_is_answered_and_sent() {
        let env = env();
        let request = same_origin(Method::OPTIONS);
        let gate = Gate::new(&env, &Echo, &request)
            .identify()
            .unwrap()
            .negotiate()
            .unwrap();
        match gate.preflight() {
            PreflightCheck::Answered(response) => {
                assert_eq!(response.send_state(), SendState::Sent);
                assert_eq!(response.header("Content-Length"), Some("0"));
            }
            PreflightCheck::Continue(_) => panic!("OPTIONS must be answered"),
        }
    }

    #[test]
    fn csrf_without_manager_is_misconfiguration() {
        let env = env();
        let request = same_origin(Method::POST);
        let denial = handle_request(&env, &Echo, &request).unwrap_err();
        match denial {
            Error::Denied(denial) => assert_eq!(denial.kind, DenialKind::SecurityMisconfigured),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn joined_upper_skips_empty_lists() {
        assert_eq!(joined_upper(None), None);
        assert_eq!(joined_upper(Some(Vec::new())), None);
        assert_eq!(
            joined_upper(Some(vec!["a".into(), "b".into()])),
            Some("A,B".to_string())
        );
    }
}
