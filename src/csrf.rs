//! CSRF tokens.

use std::fmt;

use crate::environment::ApiEnvironment;
use crate::secret::Secret;

/// A named CSRF token.
///
/// The value is wrapped in [`Secret`], so logging a token or a
/// [`Denial`](crate::Denial) built from one never leaks it.
pub struct CsrfToken {
    id: String,
    value: Secret<String>,
}

impl CsrfToken {
    /// Creates a token.
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: Secret::new(value.into()),
        }
    }

    /// Token name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token value.
    pub fn value(&self) -> &Secret<String> {
        &self.value
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfToken")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

/// Session-bound CSRF token store.
pub trait CsrfTokenManager: Send + Sync {
    /// Returns the session's token for `name`, creating it if needed.
    fn get_token(&self, name: &str) -> CsrfToken;

    /// Checks a submitted token against the session's token of the same name.
    fn is_token_valid(&self, token: &CsrfToken) -> bool;
}

/// Fetches the API CSRF token so a page can embed it for later API calls.
///
/// Uses `name`, or the configured token name when `None`. Returns `None`
/// when no token manager is configured.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use api_render::{issue_api_csrf_token, ApiConfig, ApiEnvironment, CsrfToken, CsrfTokenManager};
///
/// struct Fixed;
///
/// impl CsrfTokenManager for Fixed {
///     fn get_token(&self, name: &str) -> CsrfToken {
///         CsrfToken::new(name, "fixed")
///     }
///     fn is_token_valid(&self, token: &CsrfToken) -> bool {
///         token.value().expose_secret() == "fixed"
///     }
/// }
///
/// let env = ApiEnvironment::new(ApiConfig::default()).with_csrf_manager(Arc::new(Fixed));
/// let token = issue_api_csrf_token(&env, None).unwrap();
/// assert_eq!(token.id(), "api-csrf-token");
///
/// let bare = ApiEnvironment::new(ApiConfig::default());
/// assert!(issue_api_csrf_token(&bare, None).is_none());
/// ```
pub fn issue_api_csrf_token(env: &ApiEnvironment, name: Option<&str>) -> Option<CsrfToken> {
    let name = name.unwrap_or(&env.config().csrf_token_name);
    let manager = env.csrf_manager()?;
    let token = manager.get_token(name);
    tracing::debug!(token = ?token, "issued api csrf token");
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use std::sync::Arc;

    struct Session;

    impl CsrfTokenManager for Session {
        fn get_token(&self, name: &str) -> CsrfToken {
            CsrfToken::new(name, format!("{}-value", name))
        }

        fn is_token_valid(&self, token: &CsrfToken) -> bool {
            token.value().expose_secret() == &format!("{}-value", token.id())
        }
    }

    #[test]
    fn debug_redacts_value() {
        let token = CsrfToken::new("api-csrf-token", "s3cr3t");
        let output = format!("{:?}", token);
        assert!(output.contains("api-csrf-token"));
        assert!(!output.contains("s3cr3t"));
    }

    #[test]
    fn explicit_name_wins() {
        let env = ApiEnvironment::new(ApiConfig::default()).with_csrf_manager(Arc::new(Session));
        let token = issue_api_csrf_token(&env, Some("page-token")).unwrap();
        assert_eq!(token.id(), "page-token");
        assert!(env.csrf_manager().unwrap().is_token_valid(&token));
    }

    #[test]
    fn configured_name_is_the_default() {
        let config = ApiConfig::default().with_csrf_token_name("xsrf");
        let env = ApiEnvironment::new(config).with_csrf_manager(Arc::new(Session));
        assert_eq!(issue_api_csrf_token(&env, None).unwrap().id(), "xsrf");
    }

    #[test]
    fn no_manager_no_token() {
        let env = ApiEnvironment::new(ApiConfig::default());
        assert!(issue_api_csrf_token(&env, Some("x")).is_none());
    }
}
