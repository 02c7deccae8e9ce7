//! vgen - Verilog generation pipeline CLI
//!
//! ## Commands
//!
//! - `run`: Run the pipeline locally, answering review gates from stdin
//! - `decompose`: Turn a planning document into the subtask JSON
//! - `assemble`: Merge a run's subtask fragments into `design.sv`
//! - `report`: Extract and check a verification report
//! - `simulate`: Compile and simulate a design with Icarus Verilog

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::Level;

use vgen_core::store::{DECOMPOSITION_FILE, DESIGN_FILE, REPORT_JSON_FILE, REPORT_MARKDOWN_FILE};
use vgen_core::{
    assemble, attribute_unassigned_error, decompose, extract_report, ArtifactStore, CodeFragment,
    Decomposition, Orchestrator, Pipeline, PipelineConfig, PlanningArtifact, RunDir, RunEvent,
    RunRegistry, RunRequest, RunState, RunStatus, RunType, StreamCursor, StreamItem,
    TextGenerator, VerificationReport, Verifier,
};
use vgen_llm::{BackendKind, HttpTextGenerator, LlmConfig};
use vgen_sim::{IcarusVerifier, SimConfig};

#[derive(Parser)]
#[command(name = "vgen")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verilog generation pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML with [pipeline], [llm] and [sim] tables)
    #[arg(short, long, global = true, env = "VGEN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline locally
    Run {
        /// Problem statement (default: the built-in 16-bit divider)
        #[arg(short, long, conflicts_with = "problem_file")]
        problem: Option<String>,

        /// Read the problem statement from a file
        #[arg(long)]
        problem_file: Option<PathBuf>,

        /// full, planning, subtasks, merging, testbench or iverilog
        #[arg(short = 't', long, default_value = "full")]
        run_type: RunType,

        /// Earlier run whose artifacts seed this one
        #[arg(long)]
        source_run: Option<String>,

        /// Directory holding one subdirectory per run
        #[arg(long, env = "VGEN_WORKSPACE")]
        workspace: Option<PathBuf>,

        /// Repair iterations before the run is declared exhausted
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Subtasks generated concurrently
        #[arg(long)]
        subtask_concurrency: Option<usize>,

        /// Pause for review of the plan
        #[arg(long)]
        review_planning: bool,

        /// Pause for review of the testbench
        #[arg(long)]
        review_testbench: bool,

        /// Text generation backend: gemini, openai or ollama
        #[arg(long)]
        backend: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Backend base URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Have the model write verification reports from simulator output
        #[arg(long)]
        llm_reports: bool,
    },

    /// Convert a planning document into the subtask decomposition
    Decompose {
        /// Planning markdown (high_level_planning_task.md)
        input: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge a run's subtask fragments into its design
    Assemble {
        /// Run ID
        run: String,

        /// Directory holding one subdirectory per run
        #[arg(long, env = "VGEN_WORKSPACE")]
        workspace: Option<PathBuf>,
    },

    /// Extract a verification report and check whether it is clean
    Report {
        /// Raw verifier output (e.g. iverilog_report.md)
        input: PathBuf,

        /// Testbench file name used to attribute unassigned errors
        #[arg(long, default_value = "testbench.sv")]
        testbench_name: String,
    },

    /// Compile and simulate a design against a testbench
    Simulate {
        /// Design source
        design: PathBuf,

        /// Testbench source
        testbench: PathBuf,

        /// Directory to write iverilog_report.md and iverilog_report.json into
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
}

/// Settings read from `--config`. Tables the CLI does not use (e.g.
/// `[server]`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    pipeline: PipelineConfig,
    llm: LlmConfig,
    sim: SimConfig,
}

impl CliConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = toml::from_str(&text).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vgen_core::init_tracing(cli.json, level);

    let mut config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            problem,
            problem_file,
            run_type,
            source_run,
            workspace,
            max_iterations,
            subtask_concurrency,
            review_planning,
            review_testbench,
            backend,
            model,
            endpoint,
            llm_reports,
        } => {
            if let Some(workspace) = workspace {
                config.pipeline.workspace = workspace;
            }
            if let Some(max_iterations) = max_iterations {
                config.pipeline.max_iterations = max_iterations;
            }
            if let Some(concurrency) = subtask_concurrency {
                config.pipeline.subtask_concurrency = concurrency;
            }
            config.pipeline.review_planning |= review_planning;
            config.pipeline.review_testbench |= review_testbench;
            config.sim.llm_reports |= llm_reports;
            if let Some(backend) = backend {
                config.llm.backend = backend
                    .parse::<BackendKind>()
                    .map_err(|e| anyhow::anyhow!("Invalid --backend: {e}"))?;
            }
            if let Some(model) = model {
                config.llm.model = model;
            }
            if let Some(endpoint) = endpoint {
                config.llm.endpoint = Some(endpoint);
            }
            config.llm = config.llm.with_env();

            let problem = match problem_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read problem file: {:?}", path))?,
                ),
                None => problem,
            };
            let mut request = RunRequest {
                run_type,
                source_run,
                ..RunRequest::default()
            };
            if let Some(problem) = problem.filter(|p| !p.trim().is_empty()) {
                request.problem = problem;
            }

            let orchestrator = build_orchestrator(&config)?;
            let stdin = BufReader::new(tokio::io::stdin());
            let state = cmd_run(&orchestrator, request, stdin, cli.verbose).await?;
            finish_run(&orchestrator, &state)
        }
        Commands::Decompose { input, output } => {
            cmd_decompose(&input, output.as_deref()).map(|_| ())
        }
        Commands::Assemble { run, workspace } => {
            let root = workspace.unwrap_or(config.pipeline.workspace);
            let dir = ArtifactStore::new(&root)
                .and_then(|store| store.existing_run_dir(&run))
                .with_context(|| format!("Run directory not found: {run}"))?;
            let path = cmd_assemble(&dir)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Commands::Report {
            input,
            testbench_name,
        } => {
            let report = cmd_report(&input, &testbench_name)?;
            if report.is_clean() {
                Ok(())
            } else {
                bail!("Report has open suggestions")
            }
        }
        Commands::Simulate {
            design,
            testbench,
            out_dir,
        } => {
            let verifier = build_verifier(&config)?;
            let report =
                cmd_simulate(verifier.as_ref(), &design, &testbench, out_dir.as_deref()).await?;
            if report.is_clean() {
                Ok(())
            } else {
                bail!("Simulation reported problems")
            }
        }
    }
}

fn build_generator(config: &CliConfig) -> Result<Arc<dyn TextGenerator>> {
    let generator = HttpTextGenerator::new(config.llm.clone())
        .context("Text generation backend is not configured")?;
    Ok(Arc::new(generator))
}

fn build_verifier(config: &CliConfig) -> Result<Arc<dyn Verifier>> {
    let mut verifier = IcarusVerifier::new(config.sim.clone());
    if config.sim.llm_reports {
        let mut with_env = config.clone();
        with_env.llm = with_env.llm.with_env();
        verifier = verifier.with_reviewer(build_generator(&with_env)?);
    }
    Ok(Arc::new(verifier))
}

fn build_orchestrator(config: &CliConfig) -> Result<Orchestrator> {
    config
        .pipeline
        .validate()
        .context("Invalid pipeline configuration")?;
    let pipeline = Pipeline::new(
        build_generator(config)?,
        build_verifier(config)?,
        config.pipeline.clone(),
    );
    let store = ArtifactStore::new(&config.pipeline.workspace).with_context(|| {
        format!("Failed to open workspace: {:?}", config.pipeline.workspace)
    })?;
    Ok(Orchestrator::new(pipeline, store, Arc::new(RunRegistry::new())))
}

/// Submit a run and follow its events until it finishes. Whenever the run
/// waits for review, one line of `input` is handed to it; end of input
/// counts as an empty line, which accepts.
async fn cmd_run<R>(
    orchestrator: &Orchestrator,
    request: RunRequest,
    input: R,
    show_output: bool,
) -> Result<RunState>
where
    R: AsyncBufRead + Unpin,
{
    let submitted = orchestrator.submit(request).context("Failed to start run")?;
    let run_id = submitted.run_id.clone();
    println!("Run ID: {}", run_id);

    let registry = orchestrator.registry().clone();
    let poll_interval = orchestrator.config().stream_poll_interval();
    let mut cursor = StreamCursor::new(run_id.clone());
    let mut lines = input.lines();

    while !cursor.is_finished() {
        let items = cursor.poll(&registry);
        if items.is_empty() {
            tokio::time::sleep(poll_interval).await;
            continue;
        }
        for item in items {
            match item {
                StreamItem::Event(event) => print_event(&event, show_output),
                StreamItem::WaitingForInput => {
                    println!("Waiting for input (empty line accepts):");
                    let line = lines
                        .next_line()
                        .await
                        .context("Failed to read input")?
                        .unwrap_or_default();
                    registry
                        .supply_input(&run_id, line)
                        .context("Failed to deliver input")?;
                }
                StreamItem::Terminal(status) => println!("Status: {}", status.as_str()),
                StreamItem::NotFound => bail!("Run {} disappeared", run_id),
            }
        }
    }

    if let Err(err) = submitted.handle.await {
        tracing::warn!(run_id = %run_id, error = %err, "run worker did not finish");
    }
    registry.get(&run_id).context("Failed to read final run state")
}

fn print_event(event: &RunEvent, show_output: bool) {
    println!("[{}] {}", event.stage, event.message);
    if show_output {
        if let Some(output) = &event.output {
            println!("{}", output.trim_end());
        }
    }
}

fn finish_run(orchestrator: &Orchestrator, state: &RunState) -> Result<()> {
    let dir = orchestrator.store().root().join(&state.run_id);
    println!("Iterations: {}", state.iteration_count);
    println!("Artifacts: {}", dir.display());
    match state.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Exhausted => {
            println!("Iteration budget exhausted; open suggestions may remain.");
            Ok(())
        }
        _ => bail!(
            "Run failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Decompose a planning document, writing the JSON to `output` or stdout.
fn cmd_decompose(input: &Path, output: Option<&Path>) -> Result<Decomposition> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read planning file: {:?}", input))?;
    let plan = decompose(&PlanningArtifact::new(raw)).context("Failed to decompose plan")?;
    let json = plan.to_json_pretty()?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("{} subtasks written to {}", plan.subtasks.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(plan)
}

/// Merge the fragments named by the run's decomposition into `design.sv`.
fn cmd_assemble(dir: &RunDir) -> Result<PathBuf> {
    let plan = Decomposition::from_json(&dir.read(DECOMPOSITION_FILE)?)
        .context("Failed to load decomposition")?;
    let fragments = plan
        .subtasks
        .iter()
        .map(|task| Ok(CodeFragment::new(task.id, dir.read(&task.fragment_file_name())?)))
        .collect::<Result<Vec<_>>>()?;

    let design = assemble(&fragments);
    if design.content.trim().is_empty() {
        bail!("All {} fragments are empty", fragments.len());
    }
    Ok(dir.write(DESIGN_FILE, &design.content)?)
}

/// Extract the structured report from raw verifier output and print it.
fn cmd_report(input: &Path, testbench_name: &str) -> Result<VerificationReport> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read report: {:?}", input))?;
    let mut report = extract_report(&raw).context("Failed to extract report")?;
    attribute_unassigned_error(&mut report, testbench_name);
    print_report(&report)?;
    Ok(report)
}

async fn cmd_simulate(
    verifier: &dyn Verifier,
    design: &Path,
    testbench: &Path,
    out_dir: Option<&Path>,
) -> Result<VerificationReport> {
    let raw = verifier
        .verify(design, testbench)
        .await
        .context("Verification failed to run")?;
    let mut report = extract_report(&raw).context("Failed to extract report")?;
    let testbench_name = testbench
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    attribute_unassigned_error(&mut report, &testbench_name);

    if let Some(out_dir) = out_dir {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create {:?}", out_dir))?;
        std::fs::write(out_dir.join(REPORT_MARKDOWN_FILE), &raw)?;
        std::fs::write(
            out_dir.join(REPORT_JSON_FILE),
            serde_json::to_string_pretty(&report)?,
        )?;
    }
    print_report(&report)?;
    Ok(report)
}

fn print_report(report: &VerificationReport) -> Result<()> {
    println!("Status: {:?}", report.status);
    println!("Stage: {}", report.stage.as_str());
    for (name, file) in [
        ("design", &report.files.design),
        ("testbench", &report.files.testbench),
    ] {
        if file.suggestions.is_empty() {
            println!("  ✓ {name}");
        } else {
            println!("  ✗ {name}: {}", file.suggestions);
        }
    }
    println!("Clean: {}", if report.is_clean() { "yes" } else { "no" });
    tracing::debug!(report = %serde_json::to_string(report)?, "extracted report");
    Ok(())
}
