//! Diagnostic classification.
//!
//! Engine-level severity codes are folded into a closed, ordered taxonomy
//! (`Notice < Deprecated < Warning < Fatal`). Caught action failures are
//! always classified as [`ErrorKind::Exception`], whatever their code.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

/// A raw diagnostic severity code as raised by application code.
///
/// Codes are single bits so they can be combined into a [`ReportMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeverityCode(pub u32);

impl SeverityCode {
    /// Fatal run-time error.
    pub const ERROR: Self = Self(1);
    /// Run-time warning.
    pub const WARNING: Self = Self(2);
    /// Parse error.
    pub const PARSE: Self = Self(4);
    /// Run-time notice.
    pub const NOTICE: Self = Self(8);
    /// Fatal error during startup.
    pub const CORE_ERROR: Self = Self(16);
    /// Warning during startup.
    pub const CORE_WARNING: Self = Self(32);
    /// Fatal compile-time error.
    pub const COMPILE_ERROR: Self = Self(64);
    /// Compile-time warning.
    pub const COMPILE_WARNING: Self = Self(128);
    /// User-raised error.
    pub const USER_ERROR: Self = Self(256);
    /// User-raised warning.
    pub const USER_WARNING: Self = Self(512);
    /// User-raised notice.
    pub const USER_NOTICE: Self = Self(1024);
    /// Suggestion about forward compatibility.
    pub const STRICT: Self = Self(2048);
    /// Catchable fatal error.
    pub const RECOVERABLE_ERROR: Self = Self(4096);
    /// Deprecation notice.
    pub const DEPRECATED: Self = Self(8192);
    /// User-raised deprecation notice.
    pub const USER_DEPRECATED: Self = Self(16384);

    /// Returns the numeric value of the code.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SeverityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of severity codes that are reported.
///
/// A diagnostic whose code is outside the mask is ignored entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ReportMask(pub u32);

impl ReportMask {
    /// Reports every severity.
    pub const ALL: Self = Self(32767);

    /// Returns `true` if diagnostics with `code` should be handled.
    pub fn reports(self, code: SeverityCode) -> bool {
        self.0 & code.0 != 0
    }

    /// Returns a mask that no longer reports `code`.
    pub fn without(self, code: SeverityCode) -> Self {
        Self(self.0 & !code.0)
    }
}

impl Default for ReportMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// The five typed error kinds.
///
/// The derived ordering is the severity ordering; `Exception` sorts above
/// `Fatal` so it also counts as "above warning" for abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Informational diagnostic.
    Notice,
    /// Use of a deprecated feature.
    Deprecated,
    /// Recoverable problem.
    Warning,
    /// Unrecoverable problem in the producing operation.
    Fatal,
    /// A caught action-level failure.
    Exception,
}

impl ErrorKind {
    /// Level token used by the JSON renderer.
    ///
    /// `Fatal` maps to `"error"`, every other kind to its lowercase name.
    pub fn level(self) -> &'static str {
        match self {
            ErrorKind::Exception => "exception",
            ErrorKind::Fatal => "error",
            ErrorKind::Warning => "warning",
            ErrorKind::Deprecated => "deprecated",
            ErrorKind::Notice => "notice",
        }
    }

    /// Element name used by the XML renderer.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::Exception => "EXCEPTION",
            ErrorKind::Fatal => "FATAL",
            ErrorKind::Warning => "WARNING",
            ErrorKind::Deprecated => "DEPRECATED",
            ErrorKind::Notice => "NOTICE",
        }
    }

    /// Returns `true` if a diagnostic of this kind aborts the operation
    /// that raised it.
    pub fn aborts(self) -> bool {
        self > ErrorKind::Warning
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Notice => "Notice",
            ErrorKind::Deprecated => "Deprecated",
            ErrorKind::Warning => "Warning",
            ErrorKind::Fatal => "Fatal",
            ErrorKind::Exception => "Exception",
        };
        f.write_str(name)
    }
}

/// Maps a raw severity code onto the ordered taxonomy.
///
/// Never returns [`ErrorKind::Exception`]; that kind is reserved for
/// caught failures.
///
/// # Examples
///
/// ```
/// use api_render::{classify, ErrorKind, SeverityCode};
///
/// assert_eq!(classify(SeverityCode::USER_NOTICE), ErrorKind::Notice);
/// assert_eq!(classify(SeverityCode::USER_WARNING), ErrorKind::Warning);
/// assert_eq!(classify(SeverityCode::USER_ERROR), ErrorKind::Fatal);
/// ```
pub fn classify(code: SeverityCode) -> ErrorKind {
    match code {
        SeverityCode::NOTICE | SeverityCode::USER_NOTICE | SeverityCode::STRICT => {
            ErrorKind::Notice
        }
        SeverityCode::DEPRECATED | SeverityCode::USER_DEPRECATED => ErrorKind::Deprecated,
        SeverityCode::WARNING
        | SeverityCode::CORE_WARNING
        | SeverityCode::COMPILE_WARNING
        | SeverityCode::USER_WARNING => ErrorKind::Warning,
        _ => ErrorKind::Fatal,
    }
}

/// Source position a diagnostic was raised from. Both parts are opaque.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Source file.
    pub file: String,
    /// Line within `file`.
    pub line: u32,
}

impl Location {
    /// Creates a location from its parts.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Captures the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self::new(loc.file(), loc.line())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A diagnostic raised by application code but not yet classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raised {
    /// Raw severity code.
    pub code: SeverityCode,
    /// Human-readable message.
    pub message: String,
    /// Where it was raised.
    pub location: Location,
}

impl Raised {
    /// Raises a diagnostic with an explicit code at the caller's location.
    #[track_caller]
    pub fn new(code: SeverityCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// Raises a user notice.
    #[track_caller]
    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(SeverityCode::USER_NOTICE, message)
    }

    /// Raises a user deprecation.
    #[track_caller]
    pub fn deprecated(message: impl Into<String>) -> Self {
        Self::new(SeverityCode::USER_DEPRECATED, message)
    }

    /// Raises a user warning.
    #[track_caller]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(SeverityCode::USER_WARNING, message)
    }

    /// Raises a user error (classified as fatal).
    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(SeverityCode::USER_ERROR, message)
    }

    /// Overrides the captured location.
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Classifies the diagnostic.
    pub fn kind(&self) -> ErrorKind {
        classify(self.code)
    }
}

/// Shared, type-erased source error carried by exception diagnostics.
pub type SourceError = Arc<dyn StdError + Send + Sync + 'static>;

/// A caught action-level failure.
///
/// This is what a running action or producer hands back instead of a
/// plain value when it cannot go on. It is always recorded as an
/// [`ErrorKind::Exception`] diagnostic.
#[derive(Debug, Clone)]
pub struct Failure {
    message: String,
    code: i64,
    location: Location,
    source: Option<SourceError>,
}

impl Failure {
    /// Creates a failure at the caller's location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 0,
            location: Location::caller(),
            source: None,
        }
    }

    /// Wraps an underlying error, using its `Display` output as message.
    #[track_caller]
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            code: 0,
            location: Location::caller(),
            source: Some(Arc::new(error)),
        }
    }

    /// Turns a diagnostic nobody handled into a failure, keeping its code
    /// and location.
    pub fn from_raised(raised: Raised) -> Self {
        Self {
            message: raised.message,
            code: i64::from(raised.code.value()),
            location: raised.location,
            source: None,
        }
    }

    /// Sets the numeric failure code.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Overrides the captured location.
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Failure code.
    pub fn code(&self) -> i64 {
        self.code
    }

    /// Where the failure happened.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The wrapped error, if any.
    pub fn source_error(&self) -> Option<&SourceError> {
        self.source.as_ref()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}) at {}", self.message, self.code, self.location)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A classified, immutable diagnostic error recorded on a result model.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    kind: ErrorKind,
    code: i64,
    message: String,
    location: Location,
    source: Option<SourceError>,
}

impl Diagnostic {
    /// Classifies a raised diagnostic. The kind is fixed from here on.
    pub fn from_raised(raised: Raised) -> Self {
        Self {
            kind: classify(raised.code),
            code: i64::from(raised.code.value()),
            message: raised.message,
            location: raised.location,
            source: None,
        }
    }

    /// Records a caught failure as an `Exception` diagnostic.
    pub fn from_failure(failure: Failure) -> Self {
        Self {
            kind: ErrorKind::Exception,
            code: failure.code,
            message: failure.message,
            location: failure.location,
            source: failure.source,
        }
    }

    /// The error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The numeric code.
    pub fn code(&self) -> i64 {
        self.code
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source file the diagnostic was raised from.
    pub fn file(&self) -> &str {
        &self.location.file
    }

    /// Source line the diagnostic was raised from.
    pub fn line(&self) -> u32 {
        self.location.line
    }

    /// The wrapped failure source (exception kind only).
    pub fn source_error(&self) -> Option<&SourceError> {
        self.source.as_ref()
    }
}

impl From<Raised> for Diagnostic {
    fn from(raised: Raised) -> Self {
        Diagnostic::from_raised(raised)
    }
}

impl From<Failure> for Diagnostic {
    fn from(failure: Failure) -> Self {
        Diagnostic::from_failure(failure)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} at {}",
            self.kind, self.code, self.message, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_every_code_class() {
        assert_eq!(classify(SeverityCode::NOTICE), ErrorKind::Notice);
        assert_eq!(classify(SeverityCode::STRICT), ErrorKind::Notice);
        assert_eq!(classify(SeverityCode::DEPRECATED), ErrorKind::Deprecated);
        assert_eq!(classify(SeverityCode::USER_DEPRECATED), ErrorKind::Deprecated);
        assert_eq!(classify(SeverityCode::WARNING), ErrorKind::Warning);
        assert_eq!(classify(SeverityCode::COMPILE_WARNING), ErrorKind::Warning);
        assert_eq!(classify(SeverityCode::ERROR), ErrorKind::Fatal);
        assert_eq!(classify(SeverityCode::RECOVERABLE_ERROR), ErrorKind::Fatal);
        assert_eq!(classify(SeverityCode(0)), ErrorKind::Fatal);
    }

    #[test]
    fn kinds_are_ordered_by_severity() {
        assert!(ErrorKind::Notice < ErrorKind::Deprecated);
        assert!(ErrorKind::Deprecated < ErrorKind::Warning);
        assert!(ErrorKind::Warning < ErrorKind::Fatal);
        assert!(!ErrorKind::Warning.aborts());
        assert!(ErrorKind::Fatal.aborts());
        assert!(ErrorKind::Exception.aborts());
    }

    #[test]
    fn level_tokens_match_wire_format() {
        assert_eq!(ErrorKind::Fatal.level(), "error");
        assert_eq!(ErrorKind::Exception.level(), "exception");
        assert_eq!(ErrorKind::Notice.level(), "notice");
        assert_eq!(ErrorKind::Deprecated.tag(), "DEPRECATED");
    }

    #[test]
    fn raised_captures_caller_location() {
        let raised = Raised::warning("careful");
        assert!(raised.location.file.ends_with("diagnostic.rs"));
        assert!(raised.location.line > 0);
        assert_eq!(raised.kind(), ErrorKind::Warning);
    }

    #[test]
    fn failure_becomes_exception_and_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let failure = Failure::from_error(io).with_code(7);
        let diag = Diagnostic::from(failure);

        assert_eq!(diag.kind(), ErrorKind::Exception);
        assert_eq!(diag.code(), 7);
        assert_eq!(diag.message(), "disk gone");
        assert!(diag.source_error().is_some());
    }

    #[test]
    fn report_mask_filters_codes() {
        let mask = ReportMask::ALL.without(SeverityCode::USER_NOTICE);
        assert!(!mask.reports(SeverityCode::USER_NOTICE));
        assert!(mask.reports(SeverityCode::USER_WARNING));
    }
}
