use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use env_logger::Env;
use flow_engine::{
    validate_graph, EventError, EventSink, ExecutionMode, FlowEvent, FlowGraph, GraphExecutor,
    HighlightSimulator, HighlightStatus, RunConfig, SimulationConfig,
};

/// Run or simulate flow graphs from the command line
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a graph and print the run result as JSON
    Run {
        /// Path to the graph snapshot JSON file
        graph: PathBuf,
        /// Path to a run configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Call model providers for real
        #[arg(long)]
        live: bool,
    },
    /// Replay the graph's ordering as timed highlights
    Simulate {
        /// Path to the graph snapshot JSON file
        graph: PathBuf,
        /// Delay per step in milliseconds
        #[arg(long)]
        step_ms: Option<u64>,
    },
    /// Report structural problems in a graph
    Validate {
        /// Path to the graph snapshot JSON file
        graph: PathBuf,
    },
}

/// Forwards run progress to the log
struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        match event {
            FlowEvent::NodeStarted { node_id, .. } => log::info!("-> {}", node_id),
            FlowEvent::NodeCompleted {
                node_id,
                duration_ms,
                ..
            } => log::info!("<- {} ({}ms)", node_id, duration_ms),
            FlowEvent::NodeFailed { node_id, error, .. } => log::warn!("x {}: {}", node_id, error),
            other => log::trace!("{:?}", other),
        }
        Ok(())
    }
}

/// Prints simulator transitions to stdout
struct StepPrinter;

impl EventSink for StepPrinter {
    fn send(&self, event: FlowEvent) -> Result<(), EventError> {
        match event {
            FlowEvent::SimulationStep {
                node_id,
                index,
                total,
            } => println!("[{}/{}] begin {}", index + 1, total, node_id),
            FlowEvent::NodeHighlight {
                node_id,
                status: Some(HighlightStatus::Success),
            } => println!("      end   {}", node_id),
            _ => {}
        }
        Ok(())
    }
}

async fn load_run_config(path: Option<&Path>, live: bool) -> flow_engine::Result<RunConfig> {
    let config = match path {
        Some(path) => RunConfig::load(path).await?,
        None => RunConfig::default(),
    };
    let config = if live {
        config.with_mode(ExecutionMode::Live)
    } else {
        config
    };
    Ok(config.with_env_credentials())
}

async fn run(command: Command) -> flow_engine::Result<bool> {
    match command {
        Command::Run {
            graph,
            config,
            live,
        } => {
            let graph = FlowGraph::load(&graph).await?;
            let config = load_run_config(config.as_deref(), live).await?;
            log::info!("Running '{}' in {:?} mode", graph.name, config.mode);

            let executor = GraphExecutor::with_builtins(config)?;
            let result = executor.execute(&graph, &LogEventSink).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.is_success())
        }
        Command::Simulate { graph, step_ms } => {
            let graph = FlowGraph::load(&graph).await?;
            let mut config = SimulationConfig::default();
            if let Some(ms) = step_ms {
                config.step_delay_ms = ms;
            }

            let result = HighlightSimulator::new(config).run(&graph, &StepPrinter).await;
            println!(
                "Simulated {} nodes in {:?}",
                result.visit_order().len(),
                Duration::from_millis(result.total_duration_ms)
            );
            Ok(result.completed)
        }
        Command::Validate { graph } => {
            let graph = FlowGraph::load(&graph).await?;
            let problems = validate_graph(&graph);
            for problem in &problems {
                let level = if problem.is_warning() { "warning" } else { "error" };
                println!("{}: {}", level, problem);
            }
            if problems.is_empty() {
                println!("Graph '{}' is valid", graph.name);
            }
            Ok(problems.iter().all(|p| p.is_warning()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
