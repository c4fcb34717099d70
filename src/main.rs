use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;

use hive::audit::{RequireContent, StageValidator};
use hive::config::Config;
use hive::core::{MecePartitioner, TaskGraph};
use hive::delegation::{DelegationRouter, EchoHandler, HandlerRegistry};
use hive::orchestration::Orchestrator;
use hive::{source, Result};

/// Hive - hierarchical task delegation and audit orchestrator
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    HIVE_DEBUG=1    Enable debug logging (alternative to --debug)\n    RUST_LOG        Override the log filter")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.hive/hive.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Partition a task file into phases and print the plan as JSON
    Plan {
        /// Task list (.toml with [[task]] tables, or a .json array)
        tasks: PathBuf,
    },

    /// Run a task file through delegation and audit with echo agents
    Simulate {
        /// Task list (.toml with [[task]] tables, or a .json array)
        tasks: PathBuf,

        /// Stop scheduling new tasks after the first failure
        #[arg(long)]
        halt_on_failure: bool,

        /// Audit attempts per task
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Print the effective configuration
    Config {
        /// Write the defaults to ~/.hive/hive.toml if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    hive::log::init(cli.debug);

    match cli.command {
        Command::Plan { tasks } => run_plan(&tasks),
        Command::Simulate {
            tasks,
            halt_on_failure,
            max_attempts,
        } => run_simulate(&tasks, halt_on_failure, max_attempts),
        Command::Config { init } => run_config(init),
    }
}

fn run_plan(path: &Path) -> Result<()> {
    let config = Config::load()?;
    let graph = TaskGraph::from_tasks(source::load_tasks(path)?)?;
    let partition = MecePartitioner::new(config.partition.bottleneck()).partition_graph(&graph)?;
    let router = DelegationRouter::new();

    let routes: Vec<_> = graph
        .tasks()
        .into_iter()
        .map(|task| {
            let route = router.route(&task.agent_type);
            json!({
                "task": task.id,
                "princess": route.princess,
                "drone": route.drone,
            })
        })
        .collect();

    let output = json!({
        "phases": partition.phases,
        "bottlenecks": partition.bottlenecks,
        "routes": routes,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_simulate(path: &Path, halt_on_failure: bool, max_attempts: Option<u32>) -> Result<()> {
    let mut config = Config::load()?;
    if halt_on_failure {
        config.orchestrator.halt_on_failure = true;
    }
    if let Some(attempts) = max_attempts {
        config.orchestrator.max_retry_attempts = attempts;
    }
    config.validate()?;

    let tasks = source::load_tasks(path)?;
    let handlers = HandlerRegistry::new().with_fallback(Arc::new(EchoHandler));
    let stages: Vec<Arc<dyn StageValidator>> = vec![Arc::new(RequireContent)];
    let orchestrator = Orchestrator::from_config(&config, handlers, stages);

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(orchestrator.execute(tasks))?;

    tracing::info!("{}", result.summary());
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.all_passed() {
        eprintln!("{}", result.summary());
        std::process::exit(1);
    }
    Ok(())
}

fn run_config(init: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init && !path.exists() {
        Config::default().save_to(&path)?;
        eprintln!("Wrote {}", path.display());
    }
    let config = Config::load_from(&path)?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
