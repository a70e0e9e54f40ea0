use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use tradewatch_core::client::SimulationBackend;
use tradewatch_core::client::http::HttpBackend;
use tradewatch_core::config::MonitorConfig;
use tradewatch_core::feed::FeedEntry;
use tradewatch_core::graph::{PhysicsConfig, Viewport};
use tradewatch_core::launcher::RunParameters;
use tradewatch_core::leaderboard::LeaderboardView;
use tradewatch_core::poll::{GraphRefreshPolicy, LiveView, PollSummary};
use tradewatch_core::session::Session;
use tradewatch_core::status::StatusReport;

#[derive(Parser)]
#[command(name = "tradewatch", about = "Watch a running multi-agent trading simulation")]
struct Cli {
    /// Base URL of the simulation backend
    #[arg(long, default_value = "http://127.0.0.1:5002", env = "TRADEWATCH_BACKEND_URL")]
    backend_url: String,

    /// Agent population to load the catalog from
    #[arg(long, default_value = "Synthetic", env = "TRADEWATCH_POPULATION")]
    population: String,

    /// Agent ids to run (comma-separated); defaults to the whole catalog
    #[arg(long, value_delimiter = ',', env = "TRADEWATCH_AGENTS")]
    agents: Vec<String>,

    /// Number of Markov steps
    #[arg(long, default_value = "20", env = "TRADEWATCH_STEPS")]
    steps: u32,

    /// Maximum turns per conversation
    #[arg(long, default_value = "6", env = "TRADEWATCH_MAX_TURNS")]
    max_turns: u32,

    #[arg(long, default_value = "0.3", env = "TRADEWATCH_SELF_REFLECTION_PROB")]
    self_reflection_prob: f64,

    #[arg(long, default_value = "0.7", env = "TRADEWATCH_INTERACTION_PROB")]
    interaction_prob: f64,

    /// Setting the agents meet in
    #[arg(long, default_value = "Marketplace", env = "TRADEWATCH_CONTEXT")]
    context: String,

    /// Print each selected agent's profile and inventory before launching
    #[arg(long)]
    describe: bool,

    #[arg(long, default_value = "1000", env = "TRADEWATCH_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Seconds to keep polling after the run reports completion
    #[arg(long, default_value = "5", env = "TRADEWATCH_DRAIN_GRACE")]
    drain_grace_secs: u64,

    /// Refresh the graph every N poll cycles
    #[arg(long, default_value = "10", env = "TRADEWATCH_GRAPH_REFRESH_EVERY")]
    graph_refresh_every: u64,

    /// Refresh the graph whenever the event total is a multiple of N instead
    #[arg(long, env = "TRADEWATCH_GRAPH_REFRESH_EVENT_MULTIPLE")]
    graph_refresh_event_multiple: Option<u64>,

    /// Physics stepper frame period
    #[arg(long, default_value = "16", env = "TRADEWATCH_FRAME_PERIOD_MS")]
    frame_period_ms: u64,

    #[arg(long, default_value = "960", env = "TRADEWATCH_WIDTH")]
    width: f64,

    #[arg(long, default_value = "600", env = "TRADEWATCH_HEIGHT")]
    height: f64,

    /// Rest length of a relationship edge
    #[arg(long, default_value = "150", env = "TRADEWATCH_LINK_DISTANCE")]
    link_distance: f64,

    /// Node charge (negative repels)
    #[arg(long, default_value = "-500", allow_hyphen_values = true, env = "TRADEWATCH_CHARGE")]
    charge: f64,

    #[arg(long, default_value = "10", env = "TRADEWATCH_CONNECT_TIMEOUT")]
    connect_timeout_secs: u64,

    /// Per-request timeout in seconds (0 = none)
    #[arg(long, default_value = "10", env = "TRADEWATCH_REQUEST_TIMEOUT")]
    request_timeout_secs: u64,

    /// Cap on events fetched per poll
    #[arg(long, env = "TRADEWATCH_MAX_BATCH")]
    max_batch: Option<usize>,

    /// Write the final graph as SVG
    #[arg(long)]
    svg_out: Option<PathBuf>,

    /// Write the final graph frame as JSON
    #[arg(long)]
    frame_out: Option<PathBuf>,

    /// Serve the scripted stub backend on this port and monitor it
    #[cfg(feature = "stub")]
    #[arg(long, env = "TRADEWATCH_SERVE_STUB")]
    serve_stub: Option<u16>,

    /// Seed for the stub's simulation
    #[cfg(feature = "stub")]
    #[arg(long, default_value = "42", env = "TRADEWATCH_STUB_SEED")]
    stub_seed: u64,

    /// Time between stub simulation steps
    #[cfg(feature = "stub")]
    #[arg(long, default_value = "500", env = "TRADEWATCH_STUB_STEP_MS")]
    stub_step_ms: u64,
}

impl Cli {
    fn monitor_config(&self, base_url: String) -> MonitorConfig {
        let graph_refresh = match self.graph_refresh_event_multiple {
            Some(n) => GraphRefreshPolicy::EventTotalMultiple(n),
            None => GraphRefreshPolicy::EveryNthCycle(self.graph_refresh_every),
        };
        MonitorConfig {
            base_url,
            population: self.population.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            drain_grace: Duration::from_secs(self.drain_grace_secs),
            graph_refresh,
            frame_period: Duration::from_millis(self.frame_period_ms.max(1)),
            viewport: Viewport::new(self.width, self.height),
            physics: PhysicsConfig {
                link_distance: self.link_distance,
                charge: self.charge,
                ..PhysicsConfig::default()
            },
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
            max_batch: self.max_batch,
        }
    }

    fn run_parameters(&self) -> RunParameters {
        RunParameters {
            num_steps: self.steps,
            max_turns: self.max_turns,
            self_reflection_prob: self.self_reflection_prob,
            interaction_prob: self.interaction_prob,
            context: self.context.clone(),
        }
    }
}

/// Prints the live view to stdout. Leaderboard and status are only reprinted
/// when they change.
#[derive(Default)]
struct TerminalView {
    leaderboard: Option<LeaderboardView>,
    status: Option<StatusReport>,
}

impl LiveView for TerminalView {
    fn append_feed(&mut self, entries: &[FeedEntry]) {
        for entry in entries {
            println!("{entry}");
        }
    }

    fn render_leaderboard(&mut self, view: &LeaderboardView) {
        if self.leaderboard.as_ref() == Some(view) {
            return;
        }
        println!("── Leaderboard ──\n{view}");
        self.leaderboard = Some(view.clone());
    }

    fn render_status(&mut self, report: &StatusReport) {
        if self.status.as_ref() == Some(report) {
            return;
        }
        println!("── {report}");
        self.status = Some(*report);
    }

    fn on_stopped(&mut self, summary: &PollSummary) {
        println!(
            "── Monitoring stopped ({:?}) after {} polls, {} events",
            summary.reason, summary.cycles, summary.counts.total
        );
    }
}

#[cfg(feature = "stub")]
async fn serve_stub(port: u16, seed: u64, step: Duration) -> Result<String, Box<dyn std::error::Error>> {
    let sim = Arc::new(tradewatch_stub::StubSimulation::new(seed).with_step_period(step));
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Stub backend listening on {addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, tradewatch_stub::router(sim)).await {
            tracing::error!("Stub server failed: {e}");
        }
    });
    Ok(format!("http://{addr}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tradewatch=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    #[allow(unused_mut)]
    let mut base_url = cli.backend_url.clone();
    #[cfg(feature = "stub")]
    if let Some(port) = cli.serve_stub {
        base_url = serve_stub(port, cli.stub_seed, Duration::from_millis(cli.stub_step_ms.max(1))).await?;
    }

    let config = cli.monitor_config(base_url);
    tracing::info!("Monitoring backend at {}", config.base_url);
    let backend: Arc<dyn SimulationBackend> = Arc::new(HttpBackend::from_config(&config));
    let mut session = Session::new(backend.clone(), config);

    // === SETUP ===
    let catalog = session.load_catalog().await?;
    println!("Agents ({}):", catalog.len());
    for agent in catalog.agents() {
        println!("  {:<20} {} ({}, {})", agent.id, agent.name, agent.age, agent.occupation);
    }
    let ids: Vec<String> = if cli.agents.is_empty() {
        catalog.agents().iter().map(|a| a.id.clone()).collect()
    } else {
        cli.agents.clone()
    };
    for id in &ids {
        if !session.selection().is_selected(id) {
            session.toggle(id)?;
        }
    }

    if cli.describe {
        for id in session.selection().ids() {
            let detail = backend.agent_detail(&id).await?;
            println!("{} ({}): {}", detail.name, detail.education, detail.self_description);
            for item in &detail.inventory {
                println!("    {} x{} (${:.2})", item.name, item.quantity, item.base_value);
            }
        }
    }

    // === LIVE ===
    let live = session.launch(&cli.run_parameters(), TerminalView::default()).await?;
    let graph = live.graph().clone();

    let signal_backend = backend.clone();
    let signal_shutdown = live.shutdown_signal();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        tracing::info!("Received shutdown signal, stopping run");
        if let Err(e) = signal_backend.stop_run().await {
            tracing::warn!(error = %e, "stop request failed");
        }
        signal_shutdown.notify_one();
    });

    session.complete(live).await?;

    // === EXPORT ===
    let frame = graph.frame();
    if let Some(path) = &cli.svg_out {
        std::fs::write(path, frame.to_svg())?;
        tracing::info!("Graph written to {}", path.display());
    }
    if let Some(path) = &cli.frame_out {
        std::fs::write(path, serde_json::to_string_pretty(&frame)?)?;
        tracing::info!("Graph frame written to {}", path.display());
    }

    Ok(())
}
