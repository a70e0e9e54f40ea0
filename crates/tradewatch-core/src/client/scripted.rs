//! In-memory backend driven by a script of event batches.
//!
//! Mirrors the observable behavior of the real backend closely enough for the
//! loop and session tests: queued batches are drained one per poll, trades
//! update the cumulative leaderboard when queued, and the run reports
//! `running == false` once a configured number of status calls has elapsed.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::client::SimulationBackend;
use crate::error::{Error, Result};
use crate::model::agent::{AgentDetail, AgentSummary};
use crate::model::event::{Event, EventKind};
use crate::model::leaderboard::LeaderboardEntry;
use crate::model::network::GraphSnapshot;
use crate::model::run::{RunConfig, StartResponse};
use crate::model::status::RunStatus;

#[derive(Default)]
pub struct ScriptedBackend {
    state: Mutex<ScriptState>,
    events_calls: AtomicUsize,
    leaderboard_calls: AtomicUsize,
    network_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

#[derive(Default)]
struct ScriptState {
    agents: Vec<AgentSummary>,
    batches: VecDeque<Vec<Event>>,
    stats: Vec<LeaderboardEntry>,
    network: GraphSnapshot,
    started: Vec<RunConfig>,
    reject_start: Option<String>,
    running: bool,
    finish_after_status_calls: Option<usize>,
    failing_event_polls: usize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(self, agents: Vec<AgentSummary>) -> Self {
        self.lock().agents = agents;
        self
    }

    /// Queue one batch to be returned by a future `poll_events` call.
    pub fn push_batch(&self, batch: Vec<Event>) {
        let mut state = self.lock();
        for event in &batch {
            if let EventKind::Trade(trade) = &event.kind {
                let value = trade.total_value();
                record_trade(&mut state.stats, trade.seller(), trade.buyer(), value);
            }
        }
        state.batches.push_back(batch);
    }

    pub fn set_network(&self, network: GraphSnapshot) {
        self.lock().network = network;
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    /// Report `running == false` from the `(n + 1)`-th status call onwards.
    pub fn finish_after_status_calls(&self, n: usize) {
        let mut state = self.lock();
        state.running = true;
        state.finish_after_status_calls = Some(n);
    }

    pub fn reject_start(&self, message: impl Into<String>) {
        self.lock().reject_start = Some(message.into());
    }

    /// Make the next `n` event polls fail with a transport error.
    pub fn fail_event_polls(&self, n: usize) {
        self.lock().failing_event_polls = n;
    }

    pub fn started_runs(&self) -> Vec<RunConfig> {
        self.lock().started.clone()
    }

    pub fn pending_batches(&self) -> usize {
        self.lock().batches.len()
    }

    pub fn events_calls(&self) -> usize {
        self.events_calls.load(Ordering::SeqCst)
    }

    pub fn leaderboard_calls(&self) -> usize {
        self.leaderboard_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn record_trade(stats: &mut Vec<LeaderboardEntry>, seller: &str, buyer: &str, value: f64) {
    for (agent, is_seller) in [(seller, true), (buyer, false)] {
        let position = match stats.iter().position(|e| e.agent == agent) {
            Some(position) => position,
            None => {
                stats.push(LeaderboardEntry {
                    agent: agent.to_string(),
                    sales: 0.0,
                    purchases: 0.0,
                    net_value: 0.0,
                    trade_count: 0,
                });
                stats.len() - 1
            }
        };
        let entry = &mut stats[position];
        if is_seller {
            entry.sales += value;
            entry.net_value += value;
        } else {
            entry.purchases += value;
            entry.net_value -= value;
        }
        entry.trade_count += 1;
    }
}

#[async_trait::async_trait]
impl SimulationBackend for ScriptedBackend {
    async fn list_agents(&self, _population: &str) -> Result<Vec<AgentSummary>> {
        Ok(self.lock().agents.clone())
    }

    async fn agent_detail(&self, agent_id: &str) -> Result<AgentDetail> {
        let state = self.lock();
        let agent = state
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
        Ok(AgentDetail {
            id: agent.id.clone(),
            name: agent.name.clone(),
            age: agent.age,
            occupation: agent.occupation.clone(),
            address: agent.address.clone(),
            education: String::new(),
            personality: agent.personality,
            self_description: agent.self_description.clone(),
            inventory: Vec::new(),
            recent_memories: Vec::new(),
        })
    }

    async fn start_run(&self, config: &RunConfig) -> Result<StartResponse> {
        let mut state = self.lock();
        if let Some(message) = state.reject_start.clone() {
            return Err(Error::Rejected(message));
        }
        if state.running {
            return Err(Error::Rejected("Simulation already running".to_string()));
        }
        state.running = true;
        state.started.push(config.clone());
        Ok(StartResponse {
            status: "started".to_string(),
            agents: config.agents.clone(),
            config: None,
        })
    }

    async fn stop_run(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.running {
            return Err(Error::Rejected("No simulation running".to_string()));
        }
        state.running = false;
        Ok(())
    }

    async fn poll_events(&self, max: Option<usize>) -> Result<Vec<Event>> {
        self.events_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.failing_event_polls > 0 {
            state.failing_event_polls -= 1;
            return Err(Error::Transport("scripted event poll failure".to_string()));
        }
        let Some(mut batch) = state.batches.pop_front() else {
            return Ok(Vec::new());
        };
        if let Some(max) = max
            && batch.len() > max
        {
            let rest = batch.split_off(max);
            state.batches.push_front(rest);
        }
        Ok(batch)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.leaderboard_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.lock().stats.clone();
        entries.sort_by(|a, b| b.net_value.total_cmp(&a.net_value));
        Ok(entries)
    }

    async fn network(&self) -> Result<GraphSnapshot> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().network.clone())
    }

    async fn status(&self) -> Result<RunStatus> {
        let calls = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.lock();
        if let Some(limit) = state.finish_after_status_calls
            && calls > limit
        {
            state.running = false;
        }
        let agents = state
            .started
            .last()
            .map(|c| c.agents.clone())
            .unwrap_or_default();
        Ok(RunStatus {
            running: state.running,
            agents,
            config: None,
        })
    }
}

/// Index a leaderboard snapshot by agent for quick lookups in tests and views.
pub fn by_agent(entries: &[LeaderboardEntry]) -> HashMap<&str, &LeaderboardEntry> {
    entries.iter().map(|e| (e.agent.as_str(), e)).collect()
}
