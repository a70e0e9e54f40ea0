use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

use tradewatch_core::error::Error as CoreError;
use tradewatch_core::model::agent::{AgentDetail, AgentSummary};
use tradewatch_core::model::event::Event;
use tradewatch_core::model::leaderboard::LeaderboardEntry;
use tradewatch_core::model::network::GraphSnapshot;
use tradewatch_core::model::run::{RunConfig, StartResponse};
use tradewatch_core::model::status::RunStatus;

use crate::roster::DEFAULT_POPULATION;
use crate::simulation::StubSimulation;

type AppState = Arc<StubSimulation>;

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

pub struct AppError(CoreError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self.0 {
            CoreError::Validation(m) | CoreError::Rejected(m) => (StatusCode::BAD_REQUEST, m.clone()),
            CoreError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            other => {
                tracing::error!("internal error: {other}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({"error": msg}))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError(e)
    }
}

// ---------------------------------------------------------------------------
// Query / body helper structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AgentsParams {
    pub population: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub count: Option<usize>,
}

/// Start body. Everything except the agent list falls back to the defaults
/// the real backend applies.
#[derive(Debug, Deserialize)]
pub struct StartBody {
    #[serde(default)]
    pub agents: Vec<String>,
    pub num_steps: Option<u32>,
    pub max_turns: Option<u32>,
    pub self_reflection_prob: Option<f64>,
    pub interaction_prob: Option<f64>,
    pub context: Option<String>,
}

impl From<StartBody> for RunConfig {
    fn from(body: StartBody) -> Self {
        RunConfig {
            agents: body.agents,
            num_steps: body.num_steps.unwrap_or(20),
            max_turns: body.max_turns.unwrap_or(6),
            self_reflection_prob: body.self_reflection_prob.unwrap_or(0.3),
            interaction_prob: body.interaction_prob.unwrap_or(0.7),
            context: body.context.unwrap_or_else(|| "Marketplace".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub network: GraphSnapshot,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/agents?population=...
pub async fn agents_handler(
    State(sim): State<AppState>,
    Query(params): Query<AgentsParams>,
) -> Result<Json<AgentsResponse>, AppError> {
    let population = params.population.as_deref().unwrap_or(DEFAULT_POPULATION);
    let agents = sim.agents(population)?;
    Ok(Json(AgentsResponse { agents }))
}

/// GET /api/agent/{id}
pub async fn agent_detail_handler(
    State(sim): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentDetail>, AppError> {
    Ok(Json(sim.agent(&id)?))
}

/// POST /api/simulation/start
pub async fn start_handler(
    State(sim): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<StartResponse>, AppError> {
    Ok(Json(sim.start(body.into())?))
}

/// POST /api/simulation/stop
pub async fn stop_handler(State(sim): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    sim.stop()?;
    Ok(Json(json!({"status": "stopping"})))
}

/// GET /api/simulation/status
pub async fn status_handler(State(sim): State<AppState>) -> Json<RunStatus> {
    Json(sim.status())
}

/// GET /api/events?count=N -- drains the queue, oldest first.
pub async fn events_handler(
    State(sim): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Json<EventsResponse> {
    let events = sim.drain_events(params.count);
    Json(EventsResponse {
        count: events.len(),
        events,
    })
}

/// GET /api/leaderboard
pub async fn leaderboard_handler(State(sim): State<AppState>) -> Json<LeaderboardResponse> {
    Json(LeaderboardResponse {
        leaderboard: sim.leaderboard(),
    })
}

/// GET /api/network
pub async fn network_handler(State(sim): State<AppState>) -> Json<NetworkResponse> {
    Json(NetworkResponse {
        network: sim.network(),
    })
}
