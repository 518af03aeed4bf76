use std::fmt;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::cors::{CorsRegistry, OriginResolver};
use crate::csrf::CsrfTokenManager;

/// Shared collaborators of the API layer.
///
/// Built once at startup and shared by every request. The origin resolver
/// defaults to a [`CorsRegistry`] built from the configuration; the CSRF
/// token manager has no default, and checking a token without one is a
/// misconfiguration.
#[derive(Clone)]
pub struct ApiEnvironment {
    config: ApiConfig,
    origins: Arc<dyn OriginResolver>,
    csrf: Option<Arc<dyn CsrfTokenManager>>,
}

impl ApiEnvironment {
    /// Creates an environment from configuration.
    pub fn new(config: ApiConfig) -> Self {
        let origins = Arc::new(CorsRegistry::from_config(&config.cors));
        Self {
            config,
            origins,
            csrf: None,
        }
    }

    /// Replaces the origin resolver.
    pub fn with_origin_resolver(mut self, resolver: Arc<dyn OriginResolver>) -> Self {
        self.origins = resolver;
        self
    }

    /// Installs the CSRF token manager.
    pub fn with_csrf_manager(mut self, manager: Arc<dyn CsrfTokenManager>) -> Self {
        self.csrf = Some(manager);
        self
    }

    /// Configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Origin resolver.
    pub fn origins(&self) -> &dyn OriginResolver {
        self.origins.as_ref()
    }

    /// CSRF token manager, if one is installed.
    pub fn csrf_manager(&self) -> Option<&dyn CsrfTokenManager> {
        self.csrf.as_deref()
    }
}

impl fmt::Debug for ApiEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiEnvironment")
            .field("config", &self.config)
            .field("csrf_manager", &self.csrf.is_some())
            .finish_non_exhaustive()
    }
}
