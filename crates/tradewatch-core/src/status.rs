//! Run-state projection and the loop termination decision.

use std::time::Duration;

use tokio::time::Instant;

use crate::feed::EventCounts;
use crate::model::status::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running,
    Completed,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Running => write!(f, "Running"),
            RunPhase::Completed => write!(f, "Completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub phase: RunPhase,
    pub counts: EventCounts,
}

impl StatusReport {
    pub fn project(status: &RunStatus, counts: EventCounts) -> Self {
        let phase = if status.running {
            RunPhase::Running
        } else {
            RunPhase::Completed
        };
        Self { phase, counts }
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | events {} | messages {} | trades {} | reflections {}",
            self.phase,
            self.counts.total,
            self.counts.messages,
            self.counts.trades,
            self.counts.reflections
        )
    }
}

/// What the poll loop should do after a status refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDirective {
    Continue,
    /// The run finished; keep polling until the deadline to drain late events.
    Drain { until: Instant },
    Stop,
}

/// Tracks the first observed completion and turns it into a bounded drain.
#[derive(Debug)]
pub struct StatusReporter {
    grace: Duration,
    drain_until: Option<Instant>,
    last: Option<StatusReport>,
}

impl StatusReporter {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            drain_until: None,
            last: None,
        }
    }

    pub fn last(&self) -> Option<&StatusReport> {
        self.last.as_ref()
    }

    /// Record a successful status poll. Once completion has been seen the
    /// deadline is fixed; later reports cannot extend or cancel it.
    pub fn observe(&mut self, status: &RunStatus, counts: EventCounts, now: Instant) -> StatusReport {
        let report = StatusReport::project(status, counts);
        if report.phase == RunPhase::Completed && self.drain_until.is_none() {
            tracing::info!(grace_secs = self.grace.as_secs_f64(), "run completed, draining remaining events");
            self.drain_until = Some(now + self.grace);
        }
        self.last = Some(report);
        report
    }

    /// Decision for the cycle that just finished at `now`.
    pub fn directive(&self, now: Instant) -> LoopDirective {
        match self.drain_until {
            None => LoopDirective::Continue,
            Some(until) if now >= until => LoopDirective::Stop,
            Some(until) => LoopDirective::Drain { until },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_projection() {
        let counts = EventCounts {
            messages: 3,
            trades: 1,
            reflections: 2,
            total: 6,
        };
        let report = StatusReport::project(&RunStatus::running(), counts);
        assert_eq!(report.phase, RunPhase::Running);
        assert_eq!(
            report.to_string(),
            "Running | events 6 | messages 3 | trades 1 | reflections 2"
        );
        let done = StatusReport::project(&RunStatus::finished(), counts);
        assert_eq!(done.phase, RunPhase::Completed);
    }

    #[test]
    fn test_directive_drains_then_stops() {
        let start = Instant::now();
        let mut reporter = StatusReporter::new(Duration::from_secs(5));
        reporter.observe(&RunStatus::running(), EventCounts::default(), start);
        assert_eq!(reporter.directive(start), LoopDirective::Continue);

        let finished_at = start + Duration::from_secs(3);
        reporter.observe(&RunStatus::finished(), EventCounts::default(), finished_at);
        let until = finished_at + Duration::from_secs(5);
        assert_eq!(reporter.directive(finished_at), LoopDirective::Drain { until });

        // A later running=true report does not revive the loop.
        reporter.observe(&RunStatus::running(), EventCounts::default(), finished_at + Duration::from_secs(1));
        assert_eq!(
            reporter.directive(finished_at + Duration::from_secs(4)),
            LoopDirective::Drain { until }
        );
        assert_eq!(reporter.directive(until), LoopDirective::Stop);
    }
}
