//! The fixed-cadence reconciliation loop.
//!
//! Each cycle polls events, leaderboard and status in that order, and the
//! graph topology when the refresh policy says so. Cycles never overlap: the
//! next one starts only after the previous one returned. A failed request is
//! logged and skipped for that cycle; nothing it would have produced is
//! applied.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::SimulationBackend;
use crate::config::MonitorConfig;
use crate::feed::{EventCounts, FeedEntry, Reconciler};
use crate::graph::GraphHandle;
use crate::leaderboard::LeaderboardView;
use crate::status::{LoopDirective, StatusReport, StatusReporter};

/// When the loop pulls a fresh topology snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "n", rename_all = "snake_case")]
pub enum GraphRefreshPolicy {
    /// On cycle 0 and every `n`-th cycle after it.
    EveryNthCycle(u64),
    /// Whenever the number of events received so far is a multiple of `n`.
    /// Unprojected types such as `network_update` count too. Stalls while
    /// the count sits on a non-multiple; kept for parity with older clients.
    EventTotalMultiple(u64),
}

impl Default for GraphRefreshPolicy {
    fn default() -> Self {
        GraphRefreshPolicy::EveryNthCycle(10)
    }
}

impl GraphRefreshPolicy {
    /// `received_events` is the raw count of events received, skipped ones
    /// included.
    pub fn should_refresh(&self, cycle: u64, received_events: u64) -> bool {
        match *self {
            GraphRefreshPolicy::EveryNthCycle(n) => cycle % n.max(1) == 0,
            GraphRefreshPolicy::EventTotalMultiple(n) => received_events % n.max(1) == 0,
        }
    }
}

/// Rendering surface for the live view. Implementations only draw; all state
/// lives in the loop.
pub trait LiveView: Send {
    /// Entries appended by the latest batch, in feed order.
    fn append_feed(&mut self, entries: &[FeedEntry]);
    fn render_leaderboard(&mut self, view: &LeaderboardView);
    fn render_status(&mut self, report: &StatusReport);
    fn on_stopped(&mut self, _summary: &PollSummary) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The run completed and the drain period elapsed.
    Drained,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub counts: EventCounts,
    pub reason: StopReason,
}

/// Which requests of one cycle failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub appended: usize,
    pub graph_refreshed: bool,
    pub failures: u32,
}

pub struct PollLoop<V> {
    backend: Arc<dyn SimulationBackend>,
    reconciler: Reconciler,
    reporter: StatusReporter,
    graph: GraphHandle,
    view: V,
    policy: GraphRefreshPolicy,
    poll_interval: Duration,
    max_batch: Option<usize>,
    cycle: u64,
}

impl<V: LiveView> PollLoop<V> {
    pub fn new(backend: Arc<dyn SimulationBackend>, graph: GraphHandle, view: V, config: &MonitorConfig) -> Self {
        Self {
            backend,
            reconciler: Reconciler::new(),
            reporter: StatusReporter::new(config.drain_grace),
            graph,
            view,
            policy: config.graph_refresh,
            poll_interval: config.poll_interval,
            max_batch: config.max_batch,
            cycle: 0,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Run one full cycle.
    pub async fn tick(&mut self) -> CycleReport {
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        match self.backend.poll_events(self.max_batch).await {
            Ok(events) => {
                let outcome = self.reconciler.apply_batch(events);
                report.appended = outcome.appended;
                if outcome.appended > 0 {
                    self.view.append_feed(self.reconciler.feed().since(outcome.first_new));
                }
            }
            Err(e) => {
                tracing::warn!(cycle = self.cycle, error = %e, "event poll failed");
                report.failures += 1;
            }
        }

        match self.backend.leaderboard().await {
            Ok(entries) => self.view.render_leaderboard(&LeaderboardView::project(entries)),
            Err(e) => {
                tracing::warn!(cycle = self.cycle, error = %e, "leaderboard poll failed");
                report.failures += 1;
            }
        }

        match self.backend.status().await {
            Ok(status) => {
                let status_report = self.reporter.observe(&status, self.reconciler.counts(), Instant::now());
                self.view.render_status(&status_report);
            }
            Err(e) => {
                tracing::warn!(cycle = self.cycle, error = %e, "status poll failed");
                report.failures += 1;
            }
        }

        if self.policy.should_refresh(self.cycle, self.reconciler.received()) {
            match self.backend.network().await {
                Ok(snapshot) => {
                    self.graph.ingest(&snapshot);
                    report.graph_refreshed = true;
                }
                Err(e) => {
                    tracing::warn!(cycle = self.cycle, error = %e, "network poll failed");
                    report.failures += 1;
                }
            }
        }

        self.cycle += 1;
        report
    }

    /// Drive cycles every `poll_interval` until the drain period after
    /// completion has elapsed or `shutdown` fires. A stopped loop cannot be
    /// restarted.
    pub async fn run(mut self, shutdown: Arc<Notify>) -> PollSummary {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.poll_interval.as_millis() as u64, "poll loop started");

        let reason = loop {
            // Shutdown wins over a ready tick, so a stop requested during
            // the previous cycle never lets another one start.
            tokio::select! {
                biased;
                _ = shutdown.notified() => break StopReason::Shutdown,
                _ = interval.tick() => {}
            }

            let cycle = self.tick().await;
            tracing::debug!(
                cycle = cycle.cycle,
                appended = cycle.appended,
                graph = cycle.graph_refreshed,
                failures = cycle.failures,
                "poll cycle finished"
            );

            match self.reporter.directive(Instant::now()) {
                LoopDirective::Stop => break StopReason::Drained,
                LoopDirective::Drain { .. } | LoopDirective::Continue => {}
            }
        };

        let summary = PollSummary {
            cycles: self.cycle,
            counts: self.reconciler.counts(),
            reason,
        };
        tracing::info!(
            cycles = summary.cycles,
            events = summary.counts.total,
            reason = ?summary.reason,
            "poll loop stopped"
        );
        self.view.on_stopped(&summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::client::scripted::ScriptedBackend;
    use crate::graph::{GraphEngine, PhysicsConfig, Viewport};
    use crate::model::event::{Event, EventKind, Utterance};
    use crate::model::network::{GraphSnapshot, SnapshotNode};
    use crate::status::RunPhase;

    #[derive(Default)]
    struct Recorded {
        feed: Vec<String>,
        leaderboards: usize,
        statuses: Vec<StatusReport>,
        stopped: Option<PollSummary>,
    }

    #[derive(Clone, Default)]
    struct RecordingView(Arc<Mutex<Recorded>>);

    impl LiveView for RecordingView {
        fn append_feed(&mut self, entries: &[FeedEntry]) {
            let mut rec = self.0.lock().unwrap();
            rec.feed.extend(entries.iter().map(|e| e.to_string()));
        }
        fn render_leaderboard(&mut self, _view: &LeaderboardView) {
            self.0.lock().unwrap().leaderboards += 1;
        }
        fn render_status(&mut self, report: &StatusReport) {
            self.0.lock().unwrap().statuses.push(*report);
        }
        fn on_stopped(&mut self, summary: &PollSummary) {
            self.0.lock().unwrap().stopped = Some(*summary);
        }
    }

    fn line(turn: u32, agent: &str) -> Event {
        Event::utterance(
            1.0,
            Utterance {
                markov_step: 1,
                conversation_turn: turn,
                conversation_id: None,
                agent: agent.to_string(),
                text: format!("turn {turn}"),
                participants: Some(vec!["A".to_string(), "B".to_string()]),
                context: None,
                ended: None,
            },
        )
    }

    fn poll_loop(backend: Arc<ScriptedBackend>, view: RecordingView) -> PollLoop<RecordingView> {
        let graph = GraphHandle::new(GraphEngine::new(Viewport::default(), PhysicsConfig::default()));
        PollLoop::new(backend, graph, view, &MonitorConfig::default())
    }

    #[tokio::test]
    async fn test_tick_appends_new_entries_only() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        backend.push_batch(vec![line(0, "A"), line(1, "B")]);
        backend.push_batch(vec![line(2, "A")]);
        let view = RecordingView::default();
        let mut poll = poll_loop(backend.clone(), view.clone());

        assert_eq!(poll.tick().await.appended, 3);
        assert_eq!(poll.tick().await.appended, 1);
        assert_eq!(poll.tick().await.appended, 0);

        let rec = view.0.lock().unwrap();
        assert_eq!(rec.feed.len(), 4);
        assert!(rec.feed[0].starts_with("💬"));
        assert!(rec.feed[3].ends_with("A: turn 2"));
        assert_eq!(rec.leaderboards, 3);
        assert_eq!(rec.statuses.last().unwrap().counts.messages, 3);
    }

    #[tokio::test]
    async fn test_failed_event_poll_is_a_no_op() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        backend.push_batch(vec![line(0, "A")]);
        backend.fail_event_polls(1);
        let view = RecordingView::default();
        let mut poll = poll_loop(backend.clone(), view.clone());

        let first = poll.tick().await;
        assert_eq!(first.failures, 1);
        assert_eq!(first.appended, 0);
        assert_eq!(poll.reconciler().counts(), EventCounts::default());
        // The rest of the cycle still ran.
        assert_eq!(view.0.lock().unwrap().leaderboards, 1);

        assert_eq!(poll.tick().await.appended, 2);
        assert_eq!(poll.reconciler().counts().total, 1);
    }

    #[tokio::test]
    async fn test_graph_refresh_every_tenth_cycle() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        backend.set_network(GraphSnapshot {
            nodes: vec![SnapshotNode::new("A"), SnapshotNode::new("B")],
            edges: vec![],
        });
        let mut poll = poll_loop(backend.clone(), RecordingView::default());

        let refreshed: Vec<u64> = {
            let mut cycles = Vec::new();
            for _ in 0..21 {
                let report = poll.tick().await;
                if report.graph_refreshed {
                    cycles.push(report.cycle);
                }
            }
            cycles
        };
        assert_eq!(refreshed, vec![0, 10, 20]);
        assert_eq!(backend.network_calls(), 3);
        assert!(poll.graph.with(|g| g.node("A").is_some()));
    }

    #[test]
    fn test_event_total_policy() {
        let policy = GraphRefreshPolicy::EventTotalMultiple(10);
        assert!(policy.should_refresh(3, 0));
        assert!(policy.should_refresh(7, 20));
        assert!(!policy.should_refresh(7, 21));
    }

    #[tokio::test]
    async fn test_event_total_policy_counts_skipped_events() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        backend.set_network(GraphSnapshot {
            nodes: vec![SnapshotNode::new("A")],
            edges: vec![],
        });
        let network_update = Event {
            timestamp: 1.0,
            kind: EventKind::Other {
                kind: "network_update".to_string(),
                data: serde_json::json!({}),
            },
        };
        backend.push_batch(vec![line(0, "A"), network_update]);
        backend.push_batch(vec![line(1, "B")]);

        let config = MonitorConfig {
            graph_refresh: GraphRefreshPolicy::EventTotalMultiple(3),
            ..MonitorConfig::default()
        };
        let graph = GraphHandle::new(GraphEngine::new(Viewport::default(), PhysicsConfig::default()));
        let mut poll = PollLoop::new(backend.clone(), graph, RecordingView::default(), &config);

        // Two events received, one of them not projected.
        assert!(!poll.tick().await.graph_refreshed);
        // Three received, while only two are counted in the totals.
        assert!(poll.tick().await.graph_refreshed);
        assert_eq!(poll.reconciler().counts().total, 2);
        assert_eq!(backend.network_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_drains_for_grace_period_then_stops() {
        let backend = Arc::new(ScriptedBackend::new());
        // Running for the first three status calls, finished from the fourth.
        backend.finish_after_status_calls(3);
        let view = RecordingView::default();
        let poll = poll_loop(backend.clone(), view.clone());

        let summary = poll.run(Arc::new(Notify::new())).await;
        assert_eq!(summary.reason, StopReason::Drained);
        // 4 cycles up to the first completed status, then 5 more at 1s each.
        assert_eq!(summary.cycles, 9);
        assert_eq!(backend.events_calls(), 9);

        let rec = view.0.lock().unwrap();
        assert_eq!(rec.statuses.len(), 9);
        assert_eq!(rec.statuses[2].phase, RunPhase::Running);
        assert!(rec.statuses[3..].iter().all(|s| s.phase == RunPhase::Completed));
        assert_eq!(rec.stopped, Some(summary));
        drop(rec);

        // No further polls are issued once stopped.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.events_calls(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_events_during_drain_are_rendered() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.finish_after_status_calls(1);
        let view = RecordingView::default();
        let poll = poll_loop(backend.clone(), view.clone());

        let task = tokio::spawn(poll.run(Arc::new(Notify::new())));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        backend.push_batch(vec![line(0, "A")]);
        let summary = task.await.unwrap();

        assert_eq!(summary.counts.messages, 1);
        assert_eq!(view.0.lock().unwrap().feed.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        let poll = poll_loop(backend.clone(), RecordingView::default());
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(poll.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        shutdown.notify_one();
        let summary = task.await.unwrap();

        assert_eq!(summary.reason, StopReason::Shutdown);
        assert_eq!(summary.cycles, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_start_runs_no_cycle() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.set_running(true);
        for _ in 0..50 {
            let poll = poll_loop(backend.clone(), RecordingView::default());
            let shutdown = Arc::new(Notify::new());
            shutdown.notify_one();

            let summary = poll.run(shutdown).await;
            assert_eq!(summary.reason, StopReason::Shutdown);
            assert_eq!(summary.cycles, 0);
        }
        assert_eq!(backend.events_calls(), 0);
        assert_eq!(backend.status_calls(), 0);
    }
}
