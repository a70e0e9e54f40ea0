//! Per-viewer application context.
//!
//! A [`Session`] owns everything the setup screen needs (catalog, selection)
//! and, once a run is launched, hands the live state to two background tasks:
//! the poll loop and the physics stepper.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::catalog::AgentCatalog;
use crate::client::SimulationBackend;
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::graph::{GraphEngine, GraphHandle};
use crate::launcher::{RunLauncher, RunParameters};
use crate::model::run::RunConfig;
use crate::poll::{LiveView, PollLoop, PollSummary};
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Setup,
    Live,
}

pub struct Session {
    backend: Arc<dyn SimulationBackend>,
    config: MonitorConfig,
    catalog: AgentCatalog,
    selection: Selection,
    mode: ViewMode,
    graph: Option<GraphHandle>,
}

impl Session {
    pub fn new(backend: Arc<dyn SimulationBackend>, config: MonitorConfig) -> Self {
        Self {
            backend,
            config,
            catalog: AgentCatalog::default(),
            selection: Selection::new(),
            mode: ViewMode::Setup,
            graph: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn SimulationBackend> {
        &self.backend
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn graph(&self) -> Option<&GraphHandle> {
        self.graph.as_ref()
    }

    /// Fetch the roster. A failure leaves the previous catalog in place.
    pub async fn load_catalog(&mut self) -> Result<&AgentCatalog> {
        self.catalog = AgentCatalog::load(self.backend.as_ref(), &self.config.population).await?;
        Ok(&self.catalog)
    }

    /// Toggle an agent from the catalog. Returns whether it is now selected.
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        if !self.catalog.contains(id) {
            return Err(Error::NotFound(format!("agent {id}")));
        }
        Ok(self.selection.toggle(id))
    }

    pub fn can_launch(&self) -> bool {
        self.mode == ViewMode::Setup && self.selection.can_launch()
    }

    /// Submit the run and switch to live mode. On failure the session stays
    /// in setup mode with the selection intact.
    pub async fn launch<V>(&mut self, params: &RunParameters, view: V) -> Result<LiveHandle>
    where
        V: LiveView + 'static,
    {
        if self.mode == ViewMode::Live {
            return Err(Error::Rejected("a run is already being monitored".to_string()));
        }
        let run = RunLauncher::launch(self.backend.as_ref(), &self.selection, params).await?;

        let graph = GraphHandle::new(GraphEngine::new(self.config.viewport, self.config.physics));
        self.graph = Some(graph.clone());
        self.mode = ViewMode::Live;

        let poll_shutdown = Arc::new(Notify::new());
        let stepper_shutdown = Arc::new(Notify::new());
        let poll_loop = PollLoop::new(self.backend.clone(), graph.clone(), view, &self.config);
        let poll = tokio::spawn(poll_loop.run(poll_shutdown.clone()));
        let stepper = tokio::spawn(
            graph
                .clone()
                .run_stepper(self.config.frame_period, stepper_shutdown.clone()),
        );

        Ok(LiveHandle {
            run,
            graph,
            poll,
            stepper,
            poll_shutdown,
            stepper_shutdown,
        })
    }

    /// Wait for `live` to stop and return to setup mode. The selection and
    /// the last graph are kept, so the same agents can be launched again.
    pub async fn complete(&mut self, live: LiveHandle) -> Result<PollSummary> {
        let summary = live.wait().await?;
        self.mode = ViewMode::Setup;
        tracing::info!(cycles = summary.cycles, events = summary.counts.total, "live run finished");
        Ok(summary)
    }
}

/// Background tasks of a launched run.
pub struct LiveHandle {
    run: RunConfig,
    graph: GraphHandle,
    poll: JoinHandle<PollSummary>,
    stepper: JoinHandle<()>,
    poll_shutdown: Arc<Notify>,
    stepper_shutdown: Arc<Notify>,
}

impl LiveHandle {
    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    pub fn is_polling(&self) -> bool {
        !self.poll.is_finished()
    }

    /// Stop polling now instead of waiting for the drain period.
    pub fn shutdown(&self) {
        self.poll_shutdown.notify_one();
    }

    /// The notifier behind [`LiveHandle::shutdown`], for signal handlers that
    /// outlive a borrow of the handle.
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        self.poll_shutdown.clone()
    }

    /// Wait for the poll loop to stop, then stop the physics stepper.
    pub async fn wait(self) -> Result<PollSummary> {
        let summary = self
            .poll
            .await
            .map_err(|e| Error::Internal(format!("poll task failed: {e}")))?;
        self.stepper_shutdown.notify_one();
        self.stepper
            .await
            .map_err(|e| Error::Internal(format!("physics task failed: {e}")))?;
        Ok(summary)
    }
}
