pub mod http;
pub mod scripted;

use crate::error::Result;
use crate::model::agent::{AgentDetail, AgentSummary};
use crate::model::event::Event;
use crate::model::leaderboard::LeaderboardEntry;
use crate::model::network::GraphSnapshot;
use crate::model::run::{RunConfig, StartResponse};
use crate::model::status::RunStatus;

/// The simulation backend as seen from the monitor.
///
/// `poll_events` returns only events not previously delivered to this client,
/// in log order. Leaderboard and network calls return full snapshots.
#[async_trait::async_trait]
pub trait SimulationBackend: Send + Sync {
    async fn list_agents(&self, population: &str) -> Result<Vec<AgentSummary>>;
    async fn agent_detail(&self, agent_id: &str) -> Result<AgentDetail>;
    async fn start_run(&self, config: &RunConfig) -> Result<StartResponse>;
    async fn stop_run(&self) -> Result<()>;
    async fn poll_events(&self, max: Option<usize>) -> Result<Vec<Event>>;
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>>;
    async fn network(&self) -> Result<GraphSnapshot>;
    async fn status(&self) -> Result<RunStatus>;
}
