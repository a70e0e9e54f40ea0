use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::client::SimulationBackend;
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::model::agent::{AgentDetail, AgentSummary};
use crate::model::event::Event;
use crate::model::leaderboard::LeaderboardEntry;
use crate::model::network::GraphSnapshot;
use crate::model::run::{RunConfig, StartResponse};
use crate::model::status::RunStatus;

/// JSON-over-HTTP client for the simulation backend.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct AgentsResponse {
    agents: Vec<AgentSummary>,
}

#[derive(Deserialize)]
struct EventsResponse {
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct LeaderboardResponse {
    leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Deserialize)]
struct NetworkResponse {
    #[serde(default)]
    network: GraphSnapshot,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, Duration::from_secs(10), Some(Duration::from_secs(10)))
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::with_timeouts(
            config.base_url.clone(),
            config.connect_timeout,
            config.request_timeout,
        )
    }

    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Self {
        let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to build HTTP client with timeouts, using default");
            reqwest::Client::default()
        });
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }
}

/// Map a non-success response to `Error::Backend`, preferring the backend's
/// `{error}` message over the raw body.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(backend_error(status, response).await);
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn backend_error(status: StatusCode, response: Response) -> Error {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    if status == StatusCode::NOT_FOUND {
        Error::NotFound(message)
    } else {
        Error::Backend {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait::async_trait]
impl SimulationBackend for HttpBackend {
    async fn list_agents(&self, population: &str) -> Result<Vec<AgentSummary>> {
        let response = self
            .client
            .get(self.url("/api/agents"))
            .query(&[("population", population)])
            .send()
            .await?;
        let body: AgentsResponse = decode(response).await?;
        Ok(body.agents)
    }

    async fn agent_detail(&self, agent_id: &str) -> Result<AgentDetail> {
        self.get_json(&format!("/api/agent/{agent_id}")).await
    }

    async fn start_run(&self, config: &RunConfig) -> Result<StartResponse> {
        let response = self
            .client
            .post(self.url("/api/simulation/start"))
            .json(config)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(match backend_error(status, response).await {
                Error::Backend { message, .. } => Error::Rejected(message),
                other => other,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn stop_run(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/simulation/stop"))
            .send()
            .await?;
        let _: serde_json::Value = decode(response).await?;
        Ok(())
    }

    async fn poll_events(&self, max: Option<usize>) -> Result<Vec<Event>> {
        let mut request = self.client.get(self.url("/api/events"));
        if let Some(count) = max {
            request = request.query(&[("count", count)]);
        }
        let body: EventsResponse = decode(request.send().await?).await?;
        Ok(body.events)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let body: LeaderboardResponse = self.get_json("/api/leaderboard").await?;
        Ok(body.leaderboard)
    }

    async fn network(&self) -> Result<GraphSnapshot> {
        let body: NetworkResponse = self.get_json("/api/network").await?;
        Ok(body.network)
    }

    async fn status(&self) -> Result<RunStatus> {
        self.get_json("/api/simulation/status").await
    }
}
