use std::time::Duration;

use crate::graph::{PhysicsConfig, Viewport};
use crate::poll::GraphRefreshPolicy;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub base_url: String,
    pub population: String,
    pub poll_interval: Duration,
    /// How long polling continues after the backend reports the run finished.
    pub drain_grace: Duration,
    pub graph_refresh: GraphRefreshPolicy,
    pub frame_period: Duration,
    pub viewport: Viewport,
    pub physics: PhysicsConfig,
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
    /// Upper bound on events requested per poll (`None` drains everything).
    pub max_batch: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5002".to_string(),
            population: "Synthetic".to_string(),
            poll_interval: Duration::from_secs(1),
            drain_grace: Duration::from_secs(5),
            graph_refresh: GraphRefreshPolicy::default(),
            frame_period: Duration::from_millis(16),
            viewport: Viewport::default(),
            physics: PhysicsConfig::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(10)),
            max_batch: None,
        }
    }
}
