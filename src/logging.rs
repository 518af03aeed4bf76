use std::fmt;

/// Request-scoped logger.
///
/// Every event carries the request id. Obtained from the gate, so it
/// cannot outlive the request it describes.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Request id attached to every event.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs at info level.
    ///
    /// ```no_run
    /// # fn example(log: api_render::RequestLog<'_>) {
    /// log.info(format_args!("dispatching to {}", "render"));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs at warn level.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs at error level.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs at debug level.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
