//! Seeded Markov-chain trading simulation.
//!
//! Agents are the states of the chain. Staying on the same agent produces a
//! reflection, moving to another agent produces a conversation that may close
//! a trade. Events land in a bounded queue that `/api/events` drains.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use tradewatch_core::error::{Error, Result};
use tradewatch_core::model::agent::{AgentDetail, AgentSummary, InventoryItem};
use tradewatch_core::model::event::{
    Event, EventKind, Reflection, Trade, TradeDetails, TradeItem, TradeParties, Utterance,
};
use tradewatch_core::model::leaderboard::LeaderboardEntry;
use tradewatch_core::model::network::{GraphSnapshot, SnapshotEdge, SnapshotNode};
use tradewatch_core::model::run::{RunConfig, StartResponse};
use tradewatch_core::model::status::RunStatus;

use crate::roster::{self, Persona};

pub const EVENT_QUEUE_CAPACITY: usize = 2000;
/// A `network_update` event is emitted every this many steps.
pub const NETWORK_UPDATE_EVERY: u32 = 5;
const TRADE_PROBABILITY: f64 = 0.35;
const EARLY_END_PROBABILITY: f64 = 0.15;

pub struct StubSimulation {
    personas: Vec<Persona>,
    step_period: Option<Duration>,
    state: Mutex<SimState>,
}

struct SimState {
    rng: StdRng,
    running: bool,
    run: Option<ActiveRun>,
    /// Last submitted configuration, still reported after the run ends.
    last_config: Option<RunConfig>,
    events: VecDeque<Event>,
    stats: HashMap<String, LeaderboardEntry>,
}

struct ActiveRun {
    config: RunConfig,
    /// Indices into `personas`, in submission order.
    members: Vec<usize>,
    matrix: Vec<Vec<f64>>,
    inventories: Vec<Vec<InventoryItem>>,
    current: usize,
    step: u32,
    last_conversation: Option<(usize, usize)>,
}

/// Row-stochastic transition matrix: `self_reflection` on the diagonal and
/// `interaction` spread evenly over the other agents, then normalized.
pub fn transition_matrix(size: usize, self_reflection: f64, interaction: f64) -> Vec<Vec<f64>> {
    let mut matrix = vec![vec![0.0; size]; size];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = if i == j {
                self_reflection
            } else if size > 1 {
                interaction / (size - 1) as f64
            } else {
                0.0
            };
        }
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.iter_mut().for_each(|cell| *cell /= sum);
        } else {
            row[i] = 1.0;
        }
    }
    matrix
}

/// Run parameters as echoed back by start and status, without the agent list.
fn config_summary(config: &RunConfig) -> serde_json::Value {
    json!({
        "num_steps": config.num_steps,
        "context": config.context,
        "self_reflection_prob": config.self_reflection_prob,
        "interaction_prob": config.interaction_prob,
        "max_turns": config.max_turns,
    })
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

impl StubSimulation {
    pub fn new(seed: u64) -> Self {
        Self {
            personas: roster::synthetic(),
            step_period: None,
            state: Mutex::new(SimState {
                rng: StdRng::seed_from_u64(seed),
                running: false,
                run: None,
                last_config: None,
                events: VecDeque::new(),
                stats: HashMap::new(),
            }),
        }
    }

    /// Advance automatically every `period` once a run starts. Without it the
    /// run only moves when [`StubSimulation::advance`] is called.
    pub fn with_step_period(mut self, period: Duration) -> Self {
        self.step_period = Some(period);
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn agents(&self, population: &str) -> Result<Vec<AgentSummary>> {
        let personas = roster::population(population)
            .ok_or_else(|| Error::NotFound("Population not found".to_string()))?;
        Ok(personas.iter().map(Persona::summary).collect())
    }

    pub fn agent(&self, id: &str) -> Result<AgentDetail> {
        self.personas
            .iter()
            .find(|p| p.id() == id)
            .map(|p| p.detail.clone())
            .ok_or_else(|| Error::NotFound(format!("Agent {id} not found")))
    }

    pub fn start(self: &Arc<Self>, config: RunConfig) -> Result<StartResponse> {
        let mut state = self.lock();
        if state.running {
            return Err(Error::Rejected("Simulation already running".to_string()));
        }
        if config.agents.len() < 2 {
            return Err(Error::Validation("Need at least 2 agents".to_string()));
        }
        let members = config
            .agents
            .iter()
            .map(|id| {
                self.personas
                    .iter()
                    .position(|p| p.id() == id)
                    .ok_or_else(|| Error::Validation(format!("unknown agent: {id}")))
            })
            .collect::<Result<Vec<usize>>>()?;

        let current = state.rng.gen_range(0..members.len());
        let run = ActiveRun {
            matrix: transition_matrix(members.len(), config.self_reflection_prob, config.interaction_prob),
            inventories: members.iter().map(|&m| self.personas[m].detail.inventory.clone()).collect(),
            members,
            current,
            step: 0,
            last_conversation: None,
            config: config.clone(),
        };
        state.events.clear();
        state.stats.clear();
        state.run = Some(run);
        state.last_config = Some(config.clone());
        state.running = true;
        drop(state);

        tracing::info!(agents = ?config.agents, steps = config.num_steps, "stub run started");
        if let Some(period) = self.step_period {
            tokio::spawn(Arc::clone(self).drive(period));
        }

        Ok(StartResponse {
            status: "started".to_string(),
            agents: config.agents.clone(),
            config: Some(config_summary(&config)),
        })
    }

    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.running {
            return Err(Error::Rejected("No simulation running".to_string()));
        }
        state.running = false;
        tracing::info!("stub run stopped on request");
        Ok(())
    }

    pub fn status(&self) -> RunStatus {
        let state = self.lock();
        let config = state.last_config.as_ref();
        RunStatus {
            running: state.running,
            agents: config.map(|c| c.agents.clone()).unwrap_or_default(),
            config: config.map(config_summary),
        }
    }

    /// Remove and return up to `count` queued events, oldest first.
    pub fn drain_events(&self, count: Option<usize>) -> Vec<Event> {
        let mut state = self.lock();
        let take = count.unwrap_or(usize::MAX).min(state.events.len());
        state.events.drain(..take).collect()
    }

    pub fn queued_events(&self) -> usize {
        self.lock().events.len()
    }

    /// Agents that have traded, by net value descending.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self.lock().stats.values().cloned().collect();
        entries.sort_by(|a, b| b.net_value.total_cmp(&a.net_value).then_with(|| a.agent.cmp(&b.agent)));
        entries
    }

    /// Every run member as a node, every non-zero off-diagonal transition as
    /// a directed edge. Empty until a run has been started.
    pub fn network(&self) -> GraphSnapshot {
        let state = self.lock();
        match &state.run {
            Some(run) => self.snapshot(run, &state.stats),
            None => GraphSnapshot::default(),
        }
    }

    fn snapshot(&self, run: &ActiveRun, stats: &HashMap<String, LeaderboardEntry>) -> GraphSnapshot {
        let names: Vec<&str> = run.members.iter().map(|&m| self.personas[m].name()).collect();
        let nodes = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut node = SnapshotNode::new(*name);
                node.index = Some(i);
                if let Some(entry) = stats.get(*name) {
                    node.sales = entry.sales;
                    node.purchases = entry.purchases;
                    node.net_value = entry.net_value;
                    node.trade_count = entry.trade_count;
                }
                node
            })
            .collect();
        let mut edges = Vec::new();
        for (i, row) in run.matrix.iter().enumerate() {
            for (j, &weight) in row.iter().enumerate() {
                if i != j && weight > 0.0 {
                    edges.push(SnapshotEdge {
                        source: names[i].to_string(),
                        target: names[j].to_string(),
                        weight,
                    });
                }
            }
        }
        GraphSnapshot { nodes, edges }
    }

    /// Run one Markov step. Returns `false` once the run is over.
    pub fn advance(&self) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.running {
            return false;
        }
        let Some(run) = state.run.as_mut() else {
            state.running = false;
            return false;
        };
        if run.step >= run.config.num_steps {
            state.running = false;
            return false;
        }

        run.step += 1;
        let step = run.step;
        let current = run.current;
        let next = sample(&mut state.rng, &run.matrix[current]);
        let mut emitted = Vec::new();
        if next == current {
            emitted.push(self.reflect(&mut state.rng, run, step));
        } else {
            self.converse(&mut state.rng, run, &mut state.stats, current, next, step, &mut emitted);
        }
        run.current = next;

        if step % NETWORK_UPDATE_EVERY == 0 {
            let network = self.snapshot(run, &state.stats);
            let mut leaderboard: Vec<&LeaderboardEntry> = state.stats.values().collect();
            leaderboard.sort_by(|a, b| b.net_value.total_cmp(&a.net_value));
            emitted.push(Event {
                timestamp: now_seconds(),
                kind: EventKind::Other {
                    kind: "network_update".to_string(),
                    data: json!({
                        "markov_step": step,
                        "network": network,
                        "leaderboard": leaderboard,
                    }),
                },
            });
        }

        let finished = step >= run.config.num_steps;
        for event in emitted {
            if state.events.len() == EVENT_QUEUE_CAPACITY {
                state.events.pop_front();
            }
            state.events.push_back(event);
        }
        if finished {
            state.running = false;
            tracing::info!(steps = step, "stub run completed");
        }
        !finished
    }

    /// Step the run every `period` until it ends or is stopped.
    pub async fn drive(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            if !self.advance() {
                break;
            }
        }
        tracing::debug!("stub driver finished");
    }

    fn reflect(&self, rng: &mut StdRng, run: &ActiveRun, step: u32) -> Event {
        let persona = &self.personas[run.members[run.current]];
        let context = &run.config.context;
        let anchor = match run.last_conversation {
            Some((a, b)) if a == run.current || b == run.current => format!("recent conversation about {context}"),
            _ => format!("recent interactions and experiences in {context}"),
        };
        let count = rng.gen_range(1..=persona.musings.len());
        let thoughts = persona
            .musings
            .choose_multiple(rng, count)
            .map(|s| s.to_string())
            .collect();
        Event::reflection(
            now_seconds(),
            Reflection {
                markov_step: step,
                agent: persona.name().to_string(),
                anchor,
                thoughts,
                context: Some(context.clone()),
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn converse(
        &self,
        rng: &mut StdRng,
        run: &mut ActiveRun,
        stats: &mut HashMap<String, LeaderboardEntry>,
        from: usize,
        to: usize,
        step: u32,
        out: &mut Vec<Event>,
    ) {
        let first = &self.personas[run.members[from]];
        let second = &self.personas[run.members[to]];
        let participants = vec![first.name().to_string(), second.name().to_string()];
        let conversation_id = format!("markov_step_{step}_{}_{}", first.id(), second.id());
        let context = run.config.context.clone();
        let max_turns = run.config.max_turns.max(1);

        let mut speaker = from;
        let mut listener = to;
        for turn in 0..max_turns {
            let persona = &self.personas[run.members[speaker]];
            let lines = if turn == 0 { persona.openers } else { persona.replies };
            let text = lines.choose(rng).copied().unwrap_or("...").to_string();
            let ended = turn + 1 == max_turns || (turn >= 2 && rng.gen_bool(EARLY_END_PROBABILITY));
            out.push(Event::utterance(
                now_seconds(),
                Utterance {
                    markov_step: step,
                    conversation_turn: turn,
                    conversation_id: Some(conversation_id.clone()),
                    agent: persona.name().to_string(),
                    text,
                    participants: Some(participants.clone()),
                    context: Some(context.clone()),
                    ended: Some(ended),
                },
            ));
            if ended {
                break;
            }
            if turn >= 1
                && rng.gen_bool(TRADE_PROBABILITY)
                && let Some(trade) = self.close_trade(rng, run, listener, speaker)
            {
                record_trade(stats, &trade);
                out.push(Event::trade(
                    now_seconds(),
                    Trade {
                        markov_step: step,
                        conversation_turn: turn,
                        conversation_id: Some(conversation_id.clone()),
                        trade_details: trade,
                        participants: Some(participants.clone()),
                        context: Some(context.clone()),
                    },
                ));
            }
            std::mem::swap(&mut speaker, &mut listener);
        }
        run.last_conversation = Some((from, to));
    }

    /// Move one unit of a random in-stock item from `seller` to `buyer`.
    fn close_trade(&self, rng: &mut StdRng, run: &mut ActiveRun, seller: usize, buyer: usize) -> Option<TradeDetails> {
        let in_stock: Vec<usize> = run.inventories[seller]
            .iter()
            .enumerate()
            .filter(|(_, item)| item.quantity > 0)
            .map(|(i, _)| i)
            .collect();
        let &pick = in_stock.choose(rng)?;
        let item = &mut run.inventories[seller][pick];
        item.quantity -= 1;
        let sold = item.clone();

        match run.inventories[buyer].iter_mut().find(|i| i.name == sold.name) {
            Some(existing) => existing.quantity += 1,
            None => run.inventories[buyer].push(InventoryItem { quantity: 1, ..sold.clone() }),
        }

        Some(TradeDetails {
            participants: TradeParties {
                seller: self.personas[run.members[seller]].name().to_string(),
                buyer: self.personas[run.members[buyer]].name().to_string(),
            },
            items: vec![TradeItem {
                name: sold.name,
                quantity: 1,
                value: sold.base_value,
            }],
        })
    }
}

fn sample(rng: &mut StdRng, row: &[f64]) -> usize {
    let roll: f64 = rng.r#gen();
    let mut acc = 0.0;
    for (i, p) in row.iter().enumerate() {
        acc += p;
        if roll < acc {
            return i;
        }
    }
    row.len() - 1
}

fn record_trade(stats: &mut HashMap<String, LeaderboardEntry>, trade: &TradeDetails) {
    let value: f64 = trade.items.iter().map(|i| i.value * f64::from(i.quantity)).sum();
    for (agent, sold) in [(&trade.participants.seller, true), (&trade.participants.buyer, false)] {
        let entry = stats.entry(agent.clone()).or_insert_with(|| LeaderboardEntry {
            agent: agent.clone(),
            sales: 0.0,
            purchases: 0.0,
            net_value: 0.0,
            trade_count: 0,
        });
        if sold {
            entry.sales += value;
            entry.net_value += value;
        } else {
            entry.purchases += value;
            entry.net_value -= value;
        }
        entry.trade_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(agents: &[&str], steps: u32) -> RunConfig {
        RunConfig {
            agents: agents.iter().map(|a| a.to_string()).collect(),
            num_steps: steps,
            max_turns: 4,
            self_reflection_prob: 0.3,
            interaction_prob: 0.7,
            context: "Marketplace".to_string(),
        }
    }

    fn run_to_end(sim: &StubSimulation) -> Vec<Event> {
        while sim.advance() {}
        sim.drain_events(None)
    }

    #[test]
    fn test_transition_matrix_rows_are_normalized() {
        let matrix = transition_matrix(3, 0.3, 0.7);
        for row in &matrix {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        assert!((matrix[0][0] - 0.3).abs() < 1e-9);
        assert!((matrix[0][1] - 0.35).abs() < 1e-9);

        let stuck = transition_matrix(2, 0.0, 0.0);
        assert_eq!(stuck[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_start_validation() {
        let sim = Arc::new(StubSimulation::new(1));
        assert!(matches!(sim.start(config(&["mei_chen"], 3)), Err(Error::Validation(_))));
        assert!(matches!(sim.start(config(&["mei_chen", "nobody"], 3)), Err(Error::Validation(_))));

        let started = sim.start(config(&["mei_chen", "carlos_mendez"], 3)).unwrap();
        assert_eq!(started.status, "started");
        assert!(sim.status().running);
        assert!(matches!(sim.start(config(&["mei_chen", "carlos_mendez"], 3)), Err(Error::Rejected(_))));
    }

    #[test]
    fn test_run_emits_one_event_group_per_step_and_finishes() {
        let sim = Arc::new(StubSimulation::new(7));
        sim.start(config(&["mei_chen", "carlos_mendez", "pema_sherpa"], 10)).unwrap();
        let events = run_to_end(&sim);

        assert!(!sim.status().running);
        assert!(!sim.advance());
        let steps: Vec<u32> = events.iter().filter_map(Event::markov_step).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(steps.last().copied(), Some(10));

        let updates = events
            .iter()
            .filter(|e| matches!(&e.kind, EventKind::Other { kind, .. } if kind == "network_update"))
            .count();
        assert_eq!(updates, 2);
    }

    #[test]
    fn test_trades_drive_leaderboard_and_network() {
        let sim = Arc::new(StubSimulation::new(42));
        sim.start(config(&["mei_chen", "carlos_mendez"], 40)).unwrap();
        let events = run_to_end(&sim);

        let traded: f64 = events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::Trade(t) => Some(t.total_value()),
                _ => None,
            })
            .sum();
        let board = sim.leaderboard();
        let sales: f64 = board.iter().map(|e| e.sales).sum();
        let purchases: f64 = board.iter().map(|e| e.purchases).sum();
        assert!((sales - traded).abs() < 1e-6);
        assert!((purchases - traded).abs() < 1e-6);
        assert!(board.windows(2).all(|w| w[0].net_value >= w[1].net_value));

        let network = sim.network();
        assert_eq!(network.nodes.len(), 2);
        assert_eq!(network.edges.len(), 2);
        assert!(network.edges.iter().all(|e| e.weight > 0.0 && e.weight <= 1.0));
    }

    #[test]
    fn test_same_seed_same_script() {
        let script = |seed| {
            let sim = Arc::new(StubSimulation::new(seed));
            sim.start(config(&["mei_chen", "bianca_silva", "rowan_greenwood"], 15)).unwrap();
            run_to_end(&sim)
                .into_iter()
                .map(|e| (e.event_type(), e.markov_step()))
                .collect::<Vec<_>>()
        };
        assert_eq!(script(9), script(9));
    }

    #[test]
    fn test_drain_respects_count_and_stop() {
        let sim = Arc::new(StubSimulation::new(3));
        sim.start(config(&["mei_chen", "carlos_mendez"], 50)).unwrap();
        for _ in 0..5 {
            sim.advance();
        }
        let queued = sim.queued_events();
        assert!(queued >= 5);
        assert_eq!(sim.drain_events(Some(2)).len(), 2);
        assert_eq!(sim.queued_events(), queued - 2);

        sim.stop().unwrap();
        assert!(!sim.advance());
        assert!(matches!(sim.stop(), Err(Error::Rejected(_))));
    }
}
