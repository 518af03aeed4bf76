use std::fmt;

/// A value that must never reach logs or rendered output.
///
/// Used for CSRF token values: the token travels through denials, debug
/// output and `tracing` events, and each of those only ever sees
/// `[REDACTED]`. The value itself is reachable through
/// [`expose_secret`](Self::expose_secret) alone.
///
/// # Examples
///
/// ```
/// use api_render::Secret;
///
/// let token = Secret::new("b5e0c1".to_string());
///
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert_eq!(token.to_string(), "[REDACTED]");
/// assert_eq!(token.expose_secret(), "b5e0c1");
/// ```
// No Clone, Copy, Default, Deref or AsRef: every read goes through expose_secret().
pub struct Secret<T> {
    inner: T,
}

impl<T> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Reads the wrapped value.
    ///
    /// Do not log or render what this returns.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_value_is_redacted_in_debug() {
        let token = Secret::new("3f9a-csrf".to_string());
        let output = format!("{:?}", token);

        assert_eq!(output, "[REDACTED]");
        assert!(!output.contains("3f9a"));
        assert!(!output.contains("String"));
    }

    #[test]
    fn token_value_is_redacted_in_display() {
        let token = Secret::new("3f9a-csrf");
        assert_eq!(format!("value={}", token), "value=[REDACTED]");
    }

    #[test]
    fn redaction_holds_inside_containers() {
        let tokens = vec![Secret::new("a"), Secret::new("b")];
        assert_eq!(format!("{:?}", tokens), "[[REDACTED], [REDACTED]]");
    }

    #[test]
    fn explicit_access() {
        let token = Secret::new(String::from("abc"));
        assert_eq!(token.expose_secret().len(), 3);
    }
}
