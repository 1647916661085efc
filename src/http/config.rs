use std::time::Duration;

/// Timeout applied to regular calls against Entra ID and Resource Manager.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Connection timeout applied to regular calls.
pub const DEFAULT_CONN_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout used when probing whether the instance metadata service answers at all.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_CONN_TIMEOUT)
    }
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration) -> Self {
        Self {
            timeout,
            conn_timeout,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Short-lived configuration for managed identity availability probes.
    pub fn probe() -> Self {
        Self::new(PROBE_TIMEOUT, PROBE_TIMEOUT)
    }
}
