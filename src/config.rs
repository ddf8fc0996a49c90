use std::time::Duration;

/// Per-adapter configuration. Every coordinated activity type gets its own.
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[non_exhaustive]
pub struct CoordinatorConfig {
    /// How often a liveness heartbeat is sent to the service while a session is running. The
    /// first heartbeat goes out one interval after the session starts.
    pub heartbeat_interval: Duration,
    /// The minimum time between two calls to the handler's `tick`. When `tick` returns quickly
    /// it is called at most once per this interval. The rate can be slower if `tick` itself takes
    /// longer than the interval.
    pub tick_min_interval: Duration,
    /// How many heartbeat calls may fail in a row (for reasons other than the task being gone)
    /// before the task is considered lost and the session is canceled. `None`, the default,
    /// keeps heartbeating through any number of transient failures and leaves the decision that
    /// a task went stale entirely to the service.
    #[builder(default)]
    pub max_consecutive_heartbeat_failures: Option<u32>,
    /// Upper bound on the ticking phase of a session. The clock starts once `start` returned and
    /// the "started" signal was delivered, together with heartbeating. Once elapsed the session
    /// is canceled through the same path as a service-requested cancellation. `None`, the
    /// default, means no deadline.
    #[builder(default)]
    pub max_session_lifetime: Option<Duration>,
}

impl CoordinatorConfig {
    /// Shorthand for a config with only the two required intervals set
    pub fn new(
        heartbeat_interval: Duration,
        tick_min_interval: Duration,
    ) -> Result<Self, CoordinatorConfigBuilderError> {
        CoordinatorConfigBuilder::default()
            .heartbeat_interval(heartbeat_interval)
            .tick_min_interval(tick_min_interval)
            .build()
    }
}

impl CoordinatorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval == Some(Duration::ZERO) {
            return Err("`heartbeat_interval` must be greater than zero".to_owned());
        }
        if self.tick_min_interval == Some(Duration::ZERO) {
            return Err("`tick_min_interval` must be greater than zero".to_owned());
        }
        if let Some(Some(0)) = self.max_consecutive_heartbeat_failures {
            return Err("`max_consecutive_heartbeat_failures` must be at least 1".to_owned());
        }
        if let Some(Some(Duration::ZERO)) = self.max_session_lifetime {
            return Err("`max_session_lifetime` must be greater than zero".to_owned());
        }
        Ok(())
    }
}
