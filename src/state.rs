//! Type-state markers for the admission gate.
//!
//! Each marker is a zero-sized type naming how far a request has come
//! through admission. Markers can only be created inside the crate, so a
//! `Gate<Admitted>` is proof that every check ran.

/// Request received, nothing checked yet.
#[derive(Debug, Clone, Copy)]
pub struct Received {
    _private: (),
}

/// Anonymous check passed.
#[derive(Debug, Clone, Copy)]
pub struct Identified {
    _private: (),
}

/// Cross-origin check passed and CORS headers negotiated.
#[derive(Debug, Clone, Copy)]
pub struct Negotiated {
    _private: (),
}

/// Not a preflight request; the action may run once CSRF passes.
#[derive(Debug, Clone, Copy)]
pub struct Cleared {
    _private: (),
}

/// Every admission check passed.
#[derive(Debug, Clone, Copy)]
pub struct Admitted {
    _private: (),
}
