use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nodeflow_core::config::AppConfig;
use nodeflow_core::event::EventBus;
use nodeflow_core::traits::OrchestratorApi;
use nodeflow_core::types::{
    ExecutionContext, ExecutionEvent, ExecutionId, ExecutionStatus, ProgressTier, SessionId,
};
use nodeflow_exec::{ExecutionCoordinator, HttpOrchestrator, WebSocketPush};
use nodeflow_graph::{validate_workflow, DependencyAnalyzer, GraphModel, TemplateCatalog};

#[derive(Parser)]
#[command(name = "nodeflow", version, about = "Validate and run node-based workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "nodeflow.toml")]
    config: PathBuf,

    /// Session ID (auto-generated if not provided)
    #[arg(short, long)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow file without running it
    Validate {
        /// Workflow file exported by the editor
        workflow: PathBuf,
        /// Template catalog (overrides the config)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate, submit, and follow a workflow until it finishes
    Run {
        /// Workflow file exported by the editor
        workflow: PathBuf,
        /// Execution parameters (KEY=VALUE, value parsed as JSON when possible)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Show the status of an execution
    Status {
        /// Execution ID
        id: String,
    },
    /// Cancel an execution
    Cancel {
        /// Execution ID
        id: String,
    },
    /// List stored checkpoints of an execution
    Checkpoints {
        /// Execution ID
        id: String,
        /// Maximum number of checkpoints
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the available node templates
    Templates {
        /// Template catalog (overrides the config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nodeflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nodeflow", &mut std::io::stdout());
            Ok(())
        }
        Commands::Validate {
            ref workflow,
            ref catalog,
            json,
        } => {
            let config = load_optional_config(&cli.config)?;
            let catalog = load_catalog(catalog.as_deref(), config.as_ref())?;
            let valid = validate_file(workflow, &catalog, json)?;
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Templates { ref catalog } => {
            let config = load_optional_config(&cli.config)?;
            let catalog = load_catalog(catalog.as_deref(), config.as_ref())?;
            if catalog.is_empty() {
                println!("No templates available.");
            }
            for template in catalog.templates() {
                println!(
                    "{:<24} {:<12?} {}",
                    template.id, template.category, template.name
                );
            }
            Ok(())
        }
        Commands::Config => {
            let config = AppConfig::load(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Run {
            ref workflow,
            ref params,
        } => {
            let config = AppConfig::load(&cli.config)?;
            let catalog = load_catalog(None, Some(&config))?;
            let session_id = cli
                .session
                .as_deref()
                .map(SessionId::from_string)
                .unwrap_or_default();
            run_workflow(&config, &catalog, workflow, params, session_id).await
        }
        Commands::Status { ref id } => {
            let config = AppConfig::load(&cli.config)?;
            let api = HttpOrchestrator::new(&config.orchestrator)?;
            let snapshot = api.status(&ExecutionId::from(id.as_str())).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Commands::Cancel { ref id } => {
            let config = AppConfig::load(&cli.config)?;
            let api = HttpOrchestrator::new(&config.orchestrator)?;
            api.cancel(&ExecutionId::from(id.as_str())).await?;
            println!("Cancellation requested for {}", id);
            Ok(())
        }
        Commands::Checkpoints { ref id, limit } => {
            let config = AppConfig::load(&cli.config)?;
            let api = HttpOrchestrator::new(&config.orchestrator)?;
            let checkpoints = api
                .checkpoints(&ExecutionId::from(id.as_str()), limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&checkpoints)?);
            Ok(())
        }
    }
}

fn load_optional_config(path: &Path) -> anyhow::Result<Option<AppConfig>> {
    if path.exists() {
        Ok(Some(AppConfig::load(path)?))
    } else {
        Ok(None)
    }
}

fn load_catalog(
    override_path: Option<&Path>,
    config: Option<&AppConfig>,
) -> anyhow::Result<TemplateCatalog> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(|| config.and_then(|c| c.catalog_path()));
    match path {
        Some(path) => {
            let catalog = TemplateCatalog::load(&path)?;
            info!(path = %path.display(), templates = catalog.len(), "Loaded template catalog");
            Ok(catalog)
        }
        None => {
            warn!("No template catalog configured; configuration checks are skipped");
            Ok(TemplateCatalog::new())
        }
    }
}

/// Print the validation result. Returns whether the workflow can run.
fn validate_file(path: &Path, catalog: &TemplateCatalog, json: bool) -> anyhow::Result<bool> {
    let graph = GraphModel::load(path)?;
    let result = validate_workflow(&graph, catalog);
    let warnings = DependencyAnalyzer::new(&graph).analyze(&graph, catalog);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "validation": result,
                "warnings": warnings,
            }))?
        );
        return Ok(result.can_execute);
    }

    let mark = if result.structural.is_valid { "ok" } else { "FAIL" };
    println!("[{}] {}", mark, result.structural.message);
    println!("     {}", result.structural.details);

    if let Some(config) = &result.config {
        for (node_id, errors) in config.by_node() {
            for err in errors {
                println!("[FAIL] {}: {}", node_id, err.message);
            }
        }
    }
    for (node_id, node_warnings) in &warnings {
        for w in node_warnings {
            println!("[{:?}] {}: {}", w.severity, node_id, w.message);
        }
    }

    if result.can_execute {
        println!("Workflow can run.");
    } else {
        println!("Workflow cannot run.");
    }
    Ok(result.can_execute)
}

fn parse_params(params: &[String]) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for param in params {
        let (key, raw) = param
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Parameter '{}' is not KEY=VALUE", param))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}

async fn run_workflow(
    config: &AppConfig,
    catalog: &TemplateCatalog,
    path: &Path,
    params: &[String],
    session_id: SessionId,
) -> anyhow::Result<()> {
    let graph = GraphModel::load(path)?;
    let validation = validate_workflow(&graph, catalog);
    if !validation.can_execute {
        validate_file(path, catalog, false)?;
        anyhow::bail!("Workflow is not ready to run");
    }

    let mut ctx = ExecutionContext::new(session_id.clone());
    ctx.parameters = parse_params(params)?;

    let event_bus = Arc::new(EventBus::default());
    let coordinator = ExecutionCoordinator::new(
        Arc::new(HttpOrchestrator::new(&config.orchestrator)?),
        Arc::new(WebSocketPush::new(&config.orchestrator)),
        config.execution.clone(),
        event_bus.clone(),
    );

    // Spawn event printer
    let mut rx = event_bus.subscribe();
    let print_handle = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                ExecutionEvent::StatusChanged { to, .. } => {
                    eprintln!("[status: {}]", to);
                    if to.is_terminal() {
                        break;
                    }
                }
                ExecutionEvent::Progress {
                    message,
                    percentage,
                    ..
                } => {
                    let subject = match message.tier {
                        ProgressTier::Node => message.node_id.clone(),
                        ProgressTier::Tool => message.tool_name.clone(),
                        ProgressTier::Agent => message.agent_name.clone(),
                        _ => None,
                    }
                    .unwrap_or_else(|| "execution".to_string());
                    let detail = message
                        .error
                        .as_deref()
                        .or(message.message.as_deref())
                        .unwrap_or("");
                    eprintln!(
                        "[{:>5.1}%] {} {:?} {}",
                        percentage, subject, message.subtype, detail
                    );
                }
                ExecutionEvent::Snapshot { snapshot, .. } => {
                    if let Some(step) = snapshot.current_step {
                        eprintln!("[poll: {}] {}", snapshot.status, step);
                    }
                }
                ExecutionEvent::TransportDegraded { channel, error } => {
                    eprintln!("[{} unavailable: {}; polling]", channel, error);
                }
            }
        }
    });

    let execution_id = coordinator.execute(&graph, ctx).await?;
    println!("Execution: {}", execution_id);
    println!("Session: {}", session_id);

    let mut record_rx = coordinator.subscribe();
    tokio::select! {
        _ = record_rx.wait_for(|r| r.status.is_terminal()) => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nCancelling...");
            coordinator.cancel().await?;
        }
    }
    coordinator.dispose().await;
    print_handle.await.ok();

    let record = coordinator.record();
    println!(
        "Finished: {} ({:.0}%, {} messages)",
        record.status,
        record.progress_percentage,
        record.messages.len()
    );
    match record.status {
        ExecutionStatus::Failed => anyhow::bail!(
            "Execution failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "limit=100".to_string(),
            "dataset=shoes".to_string(),
            "tags=[\"a\",\"b\"]".to_string(),
        ])
        .unwrap();
        assert_eq!(params["limit"], serde_json::json!(100));
        assert_eq!(params["dataset"], serde_json::json!("shoes"));
        assert_eq!(params["tags"], serde_json::json!(["a", "b"]));
        assert!(parse_params(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }
}
