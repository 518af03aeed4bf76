//! Scoped diagnostic trap.
//!
//! A [`DiagnosticTrap`] mutably borrows the error list it records into for
//! exactly as long as the protected operation runs. There is no global
//! handler: the borrow is the installation, and dropping the trap is the
//! release, on every exit path.

use std::fmt;

use crate::diagnostic::{Diagnostic, ErrorKind, Failure, Raised, ReportMask};

/// Anything that accepts recorded diagnostics.
pub trait ErrorSink {
    /// Appends a diagnostic.
    fn record(&mut self, diagnostic: Diagnostic);
}

impl ErrorSink for Vec<Diagnostic> {
    fn record(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Returned by [`DiagnosticTrap::raise`] when a diagnostic above
/// `Warning` aborts the protected operation.
///
/// The diagnostic has already been recorded when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aborted {
    /// Kind of the aborting diagnostic.
    pub kind: ErrorKind,
    /// Its message.
    pub message: String,
}

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted by {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Aborted {}

/// How [`DiagnosticTrap::raise_with`] stopped the protected operation.
#[derive(Debug)]
pub(crate) enum Escalation {
    /// The handler took the diagnostic and it is above `Warning`.
    Aborted(Aborted),
    /// The handler declined a diagnostic above `Warning`.
    Declined(Raised),
}

/// Records classified diagnostics into a borrowed sink.
pub struct DiagnosticTrap<'a, S: ErrorSink + ?Sized> {
    sink: &'a mut S,
    mask: ReportMask,
    scope: &'static str,
    recorded: usize,
}

impl<'a, S: ErrorSink + ?Sized> DiagnosticTrap<'a, S> {
    /// Installs a trap over `sink` for the named scope.
    pub fn install(sink: &'a mut S, mask: ReportMask, scope: &'static str) -> Self {
        tracing::trace!(scope, "diagnostic trap installed");
        Self {
            sink,
            mask,
            scope,
            recorded: 0,
        }
    }

    /// Handles a raised diagnostic.
    ///
    /// Codes outside the report mask are ignored. Everything else is
    /// classified and recorded; kinds above `Warning` then abort.
    ///
    /// # Errors
    ///
    /// Returns [`Aborted`] if the diagnostic is classified above `Warning`.
    pub fn raise(&mut self, raised: Raised) -> Result<(), Aborted> {
        if !self.mask.reports(raised.code) {
            return Ok(());
        }

        let diagnostic = Diagnostic::from_raised(raised);
        let kind = diagnostic.kind();
        let aborted = kind.aborts().then(|| Aborted {
            kind,
            message: diagnostic.message().to_string(),
        });

        tracing::debug!(
            scope = self.scope,
            kind = %kind,
            code = diagnostic.code(),
            "recorded diagnostic: {}",
            diagnostic.message()
        );
        self.sink.record(diagnostic);
        self.recorded += 1;

        match aborted {
            Some(a) => Err(a),
            None => Ok(()),
        }
    }

    /// Hands a raised diagnostic to `handle` instead of recording it.
    ///
    /// Codes outside the report mask never reach the handler. A handler
    /// that returns `true` has taken care of the diagnostic. One that
    /// returns `false` lets kinds up to `Warning` drop silently and
    /// escalates anything above.
    pub(crate) fn raise_with<F>(&mut self, raised: Raised, handle: F) -> Result<(), Escalation>
    where
        F: FnOnce(&Raised, &mut S) -> bool,
    {
        if !self.mask.reports(raised.code) {
            return Ok(());
        }

        let kind = raised.kind();
        if handle(&raised, &mut *self.sink) {
            tracing::debug!(
                scope = self.scope,
                kind = %kind,
                code = raised.code.value(),
                "handled diagnostic: {}",
                raised.message
            );
            self.recorded += 1;
            if kind.aborts() {
                return Err(Escalation::Aborted(Aborted {
                    kind,
                    message: raised.message,
                }));
            }
            return Ok(());
        }

        tracing::debug!(scope = self.scope, kind = %kind, "declined diagnostic: {}", raised.message);
        if kind.aborts() {
            Err(Escalation::Declined(raised))
        } else {
            Ok(())
        }
    }

    /// Absorbs a caught failure as an `Exception` diagnostic.
    pub fn absorb(&mut self, failure: Failure) {
        tracing::debug!(scope = self.scope, "absorbed failure: {}", failure);
        self.sink.record(Diagnostic::from_failure(failure));
        self.recorded += 1;
    }

    /// Number of diagnostics recorded through this trap.
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// The protected sink.
    pub fn sink(&self) -> &S {
        self.sink
    }

    /// The protected sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        self.sink
    }
}

impl<S: ErrorSink + ?Sized> Drop for DiagnosticTrap<'_, S> {
    fn drop(&mut self) {
        tracing::trace!(
            scope = self.scope,
            recorded = self.recorded,
            "diagnostic trap released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::SeverityCode;

    #[test]
    fn warnings_are_recorded_and_continue() {
        let mut errors = Vec::new();
        {
            let mut trap = DiagnosticTrap::install(&mut errors, ReportMask::ALL, "test");
            assert!(trap.raise(Raised::notice("n")).is_ok());
            assert!(trap.raise(Raised::warning("w")).is_ok());
            assert_eq!(trap.recorded(), 2);
        }
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].kind(), ErrorKind::Warning);
    }

    #[test]
    fn fatal_is_recorded_then_aborts() {
        let mut errors = Vec::new();
        let result = {
            let mut trap = DiagnosticTrap::install(&mut errors, ReportMask::ALL, "test");
            trap.raise(Raised::error("boom"))
        };

        let aborted = result.expect_err("fatal must abort");
        assert_eq!(aborted.kind, ErrorKind::Fatal);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "boom");
    }

    #[test]
    fn masked_codes_are_ignored() {
        let mut errors = Vec::new();
        let mask = ReportMask::ALL.without(SeverityCode::USER_ERROR);
        {
            let mut trap = DiagnosticTrap::install(&mut errors, mask, "test");
            assert!(trap.raise(Raised::error("hidden")).is_ok());
        }
        assert!(errors.is_empty());
    }

    #[test]
    fn absorbed_failures_become_exceptions() {
        let mut errors = Vec::new();
        {
            let mut trap = DiagnosticTrap::install(&mut errors, ReportMask::ALL, "test");
            trap.absorb(Failure::new("caught").with_code(3));
        }
        assert_eq!(errors[0].kind(), ErrorKind::Exception);
        assert_eq!(errors[0].code(), 3);
    }

    #[test]
    fn declined_fatal_escalates_without_recording() {
        let mut errors: Vec<Diagnostic> = Vec::new();
        let result = {
            let mut trap = DiagnosticTrap::install(&mut errors, ReportMask::ALL, "test");
            assert!(trap.raise_with(Raised::warning("quiet"), |_, _| false).is_ok());
            trap.raise_with(Raised::error("loud"), |_, _| false)
        };

        match result {
            Err(Escalation::Declined(raised)) => assert_eq!(raised.message, "loud"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(errors.is_empty());
    }

    #[test]
    fn handled_fatal_still_aborts() {
        let mut errors: Vec<Diagnostic> = Vec::new();
        let result = {
            let mut trap = DiagnosticTrap::install(&mut errors, ReportMask::ALL, "test");
            trap.raise_with(Raised::error("kept"), |raised, sink| {
                sink.record(Diagnostic::from_raised(raised.clone()));
                true
            })
        };

        assert!(matches!(result, Err(Escalation::Aborted(ref a)) if a.kind == ErrorKind::Fatal));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn masked_codes_never_reach_the_handler() {
        let mut errors: Vec<Diagnostic> = Vec::new();
        let mask = ReportMask::ALL.without(SeverityCode::USER_ERROR);
        let mut trap = DiagnosticTrap::install(&mut errors, mask, "test");
        let result = trap.raise_with(Raised::error("hidden"), |_, _| panic!("handler called"));
        assert!(result.is_ok());
    }
}
