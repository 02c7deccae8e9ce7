//! vgend - HTTP daemon for HDL generation runs

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::Level;
use vgen_llm::BackendKind;
use vgend::{DaemonConfig, Server};

#[derive(Parser)]
#[command(name = "vgend")]
#[command(about = "vgen daemon - submit, follow and steer HDL generation runs over HTTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "VGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "VGEN_LISTEN_ADDR")]
    listen: Option<SocketAddr>,

    /// Directory holding one subdirectory per run
    #[arg(long, env = "VGEN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Repair iterations before a run is declared exhausted
    #[arg(long, env = "VGEN_MAX_ITERATIONS")]
    max_iterations: Option<u32>,

    /// Subtasks generated concurrently
    #[arg(long, env = "VGEN_SUBTASK_CONCURRENCY")]
    subtask_concurrency: Option<usize>,

    /// Pause for human review of the plan
    #[arg(long, env = "VGEN_REVIEW_PLANNING")]
    review_planning: bool,

    /// Pause for human review of the testbench
    #[arg(long, env = "VGEN_REVIEW_TESTBENCH")]
    review_testbench: bool,

    /// Text generation backend: gemini, openai or ollama (falls back to VGEN_LLM_BACKEND)
    #[arg(long)]
    backend: Option<String>,

    /// Model name (falls back to VGEN_LLM_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Backend base URL (falls back to VGEN_LLM_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Have the model write verification reports from simulator output
    #[arg(long, env = "VGEN_LLM_REPORTS")]
    llm_reports: bool,

    /// Log level
    #[arg(long, env = "VGEN_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// Enable JSON logging
    #[arg(long, env = "VGEN_LOG_JSON")]
    json: bool,
}

impl Cli {
    fn apply(self, config: &mut DaemonConfig) -> Result<()> {
        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if let Some(workspace) = self.workspace {
            config.pipeline.workspace = workspace;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.pipeline.max_iterations = max_iterations;
        }
        if let Some(concurrency) = self.subtask_concurrency {
            config.pipeline.subtask_concurrency = concurrency;
        }
        config.pipeline.review_planning |= self.review_planning;
        config.pipeline.review_testbench |= self.review_testbench;
        config.sim.llm_reports |= self.llm_reports;

        if let Some(backend) = self.backend {
            config.llm.backend = backend
                .parse::<BackendKind>()
                .map_err(|e| anyhow!("invalid --backend: {e}"))?;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(endpoint) = self.endpoint {
            config.llm.endpoint = Some(endpoint);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    vgen_core::init_tracing(cli.json, cli.log_level);

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config)?;
    config.llm = config.llm.with_env();
    config.validate().context("invalid configuration")?;

    let server = Server::new(config).context("failed to start vgend")?;
    server.run().await?;
    Ok(())
}
