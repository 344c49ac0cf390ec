use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default per-request timeout; a step's `timeout` field overrides it.
    pub request_timeout: Option<Duration>,
    /// Upper bound on the items a single loop may expand to.
    pub max_loop_items: usize,
    /// Fallback for `assert_http_status_code` when neither the plugin, step nor sequence sets `failfast`.
    pub default_failfast: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            max_loop_items: 100_000,
            default_failfast: true,
        }
    }
}
