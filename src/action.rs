//! API actions: the per-action admission policy plus the action body.

use std::fmt;

use http::StatusCode;

use crate::diagnostic::{Diagnostic, Failure, Raised};
use crate::environment::ApiEnvironment;
use crate::cors::OriginGrant;
use crate::logging::RequestLog;
use crate::model::{ApiModel, ModelValue, ResultModel};
use crate::render::RenderKind;
use crate::request::ApiRequest;
use crate::response::Response;
use crate::trap::{Aborted, DiagnosticTrap, Escalation};

/// Methods announced in `Access-Control-Allow-Methods` unless an action
/// says otherwise.
pub const DEFAULT_ACCEPTED_METHODS: [&str; 3] = ["GET", "POST", "OPTIONS"];

/// Why an action stopped before finishing.
#[derive(Debug)]
pub enum ActionFailure {
    /// A diagnostic above `Warning` was raised. It is already recorded.
    Aborted(Aborted),
    /// The action gave up silently. Nothing is recorded.
    Cancelled,
    /// The action failed; the recovery hook decides what happens.
    Failed(Failure),
    /// A diagnostic above `Warning` that [`ApiAction::handle_error`]
    /// declined. It skips the recovery hook and surfaces as
    /// [`Error::Unhandled`](crate::Error::Unhandled).
    Unhandled(Failure),
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionFailure::Aborted(aborted) => write!(f, "{}", aborted),
            ActionFailure::Cancelled => f.write_str("action cancelled"),
            ActionFailure::Failed(failure) => write!(f, "action failed: {}", failure),
            ActionFailure::Unhandled(failure) => write!(f, "unhandled error: {}", failure),
        }
    }
}

impl std::error::Error for ActionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActionFailure::Aborted(aborted) => Some(aborted),
            ActionFailure::Cancelled => None,
            ActionFailure::Failed(failure) | ActionFailure::Unhandled(failure) => Some(failure),
        }
    }
}

impl From<Aborted> for ActionFailure {
    fn from(aborted: Aborted) -> Self {
        ActionFailure::Aborted(aborted)
    }
}

impl From<Failure> for ActionFailure {
    fn from(failure: Failure) -> Self {
        ActionFailure::Failed(failure)
    }
}

/// Verdict of [`ApiAction::handle_failure`].
#[derive(Debug)]
pub enum Recovery {
    /// The failure was dealt with; the model is rendered as usual.
    Handled,
    /// The failure propagates as [`Error::Unhandled`](crate::Error::Unhandled).
    Unhandled(Failure),
}

/// An API endpoint.
///
/// Only [`perform`](Self::perform) is required. Every other method is a
/// policy hook with the default behavior of a typical JSON endpoint:
/// anonymous requests only outside production, cross-origin requests only
/// to registered hosts, and a CSRF token on everything except `GET`.
///
/// # Examples
///
/// ```
/// use api_render::{ActionContext, ActionFailure, ApiAction};
///
/// struct Ping;
///
/// impl ApiAction for Ping {
///     fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionFailure> {
///         ctx.set("pong", true);
///         Ok(())
///     }
/// }
/// ```
pub trait ApiAction {
    /// Whether a request without any origin information may pass.
    fn accepts_anonymous_request(&self, env: &ApiEnvironment, _request: &ApiRequest) -> bool {
        env.config().run_mode.is_relaxed()
    }

    /// Whether cross-origin requests are accepted at all.
    fn accepts_cross_origin_request(&self, env: &ApiEnvironment, request: &ApiRequest) -> bool {
        let host = env.origins().host_of(request);
        env.origins().is_registered(&host)
    }

    /// Whether this request's origin is echoed back instead of `*`.
    fn accept_origin(&self, env: &ApiEnvironment, request: &ApiRequest) -> Option<OriginGrant> {
        env.origins().allowed_origin(request)
    }

    /// Methods announced to cross-origin clients. `None` allows all.
    fn accepted_http_methods(&self, _request: &ApiRequest) -> Option<Vec<String>> {
        Some(DEFAULT_ACCEPTED_METHODS.iter().map(|m| m.to_string()).collect())
    }

    /// Headers announced to cross-origin clients. `None` allows all.
    fn accepted_http_headers(&self, _request: &ApiRequest) -> Option<Vec<String>> {
        None
    }

    /// Whether the request is a CORS preflight.
    fn is_preflight_request(&self, request: &ApiRequest) -> bool {
        request.method().as_str().eq_ignore_ascii_case("OPTIONS")
    }

    /// Whether a CSRF token is required.
    fn enable_csrf_check(&self, request: &ApiRequest) -> bool {
        !request
            .method()
            .as_str()
            .to_ascii_uppercase()
            .contains("GET")
    }

    /// Preferred renderer. Falls back to the configured default.
    fn default_render(&self) -> Option<RenderKind> {
        None
    }

    /// Creates the result model the action fills.
    fn make_model(&self, _request: &ApiRequest) -> Box<dyn ResultModel> {
        Box::new(ApiModel::new())
    }

    /// Handles a diagnostic raised while the action runs.
    ///
    /// Records it on the model and returns `true` by default. Returning
    /// `false` drops kinds up to `Warning` and lets anything above escape
    /// as [`Error::Unhandled`](crate::Error::Unhandled).
    fn handle_error(&self, raised: &Raised, model: &mut dyn ResultModel) -> bool {
        model.add_error(Diagnostic::from_raised(raised.clone()));
        true
    }

    /// Recovery hook for failures returned by [`perform`](Self::perform).
    ///
    /// Records the failure as an `Exception` error by default.
    fn handle_failure(&self, failure: Failure, model: &mut dyn ResultModel) -> Recovery {
        model.add_error(Diagnostic::from_failure(failure));
        Recovery::Handled
    }

    /// Called right before a preflight response is sent.
    fn tear_down(&self, _request: &ApiRequest) {}

    /// Runs the action.
    ///
    /// # Errors
    ///
    /// See [`ActionFailure`] for what each variant leads to.
    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<(), ActionFailure>;
}

/// The action's [`ApiAction::handle_error`], detached from its type.
pub(crate) type ErrorHook<'a> = dyn Fn(&Raised, &mut dyn ResultModel) -> bool + 'a;

/// What an action sees while it runs.
///
/// Diagnostics raised through [`raise`](Self::raise) go through the
/// dispatch trap installed over the model and on to the action's
/// [`handle_error`](ApiAction::handle_error).
pub struct ActionContext<'a> {
    request: &'a ApiRequest,
    trap: DiagnosticTrap<'a, dyn ResultModel>,
    on_error: &'a ErrorHook<'a>,
    response: &'a mut Response,
    log: RequestLog<'a>,
}

impl<'a> ActionContext<'a> {
    pub(crate) fn new(
        request: &'a ApiRequest,
        trap: DiagnosticTrap<'a, dyn ResultModel>,
        on_error: &'a ErrorHook<'a>,
        response: &'a mut Response,
        log: RequestLog<'a>,
    ) -> Self {
        Self {
            request,
            trap,
            on_error,
            response,
            log,
        }
    }

    /// The admitted request.
    pub fn request(&self) -> &ApiRequest {
        self.request
    }

    /// The result model.
    pub fn model(&mut self) -> &mut dyn ResultModel {
        self.trap.sink_mut()
    }

    /// Sets a model value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ModelValue>) {
        self.model().insert(key.into(), value.into());
    }

    /// Raises a diagnostic.
    ///
    /// # Errors
    ///
    /// For kinds above `Warning`, returns [`ActionFailure::Aborted`] once
    /// the error hook took the diagnostic, or [`ActionFailure::Unhandled`]
    /// if it declined. Pass either on with `?`.
    pub fn raise(&mut self, raised: Raised) -> Result<(), ActionFailure> {
        let on_error = self.on_error;
        self.trap
            .raise_with(raised, |raised, model| on_error(raised, model))
            .map_err(|escalation| match escalation {
                Escalation::Aborted(aborted) => ActionFailure::Aborted(aborted),
                Escalation::Declined(raised) => {
                    ActionFailure::Unhandled(Failure::from_raised(raised))
                }
            })
    }

    /// The outbound response, for headers the payload does not carry.
    pub fn response(&mut self) -> &mut Response {
        self.response
    }

    /// Overrides the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    /// Request-scoped logger.
    pub fn log(&self) -> RequestLog<'a> {
        self.log
    }
}
