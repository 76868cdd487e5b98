use anyhow::{Context, Result};
use cellar_playback::{
    ExecutionState, PlaybackConfig, PlaybackDriver, PlaybackEvent, PlaybackMachine, project,
};
use execution_graph::records::ExecutionStepRecord;
use execution_graph::{ExecutionGraph, ExecutionRecords, GraphBuilder, StepStatus};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Loads records from the file given on the command line, or builds a small
/// in-memory simulation when no path is given.
fn load_records() -> Result<ExecutionRecords> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading simulation file {path}"))?;
            ExecutionRecords::from_json(&json).context("parsing simulation records")
        }
        None => Ok(demo_records()),
    }
}

fn demo_records() -> ExecutionRecords {
    let now = chrono::Utc::now();
    let steps = ["Lock quote", "Reserve allocation", "Transfer funds"]
        .iter()
        .enumerate()
        .map(|(i, name)| ExecutionStepRecord {
            id: Some(Uuid::new_v4().to_string()),
            order: Some(i as i64 + 1),
            name: Some(name.to_string()),
            status: Some(StepStatus::Success),
            started_at: Some(now),
            completed_at: Some(now),
            ..Default::default()
        })
        .collect();

    ExecutionRecords {
        steps: Some(steps),
        ..Default::default()
    }
}

/// Reads playback settings: an optional YAML file, then env overrides.
fn load_config() -> Result<PlaybackConfig> {
    let mut config = match std::env::var("CELLAR_CONFIG") {
        Ok(path) => PlaybackConfig::from_file(&path)?,
        Err(_) => PlaybackConfig::default(),
    };

    if let Ok(v) = std::env::var("CELLAR_AUTO_START") {
        config.auto_start = parse_flag(&v);
    }
    if let Ok(v) = std::env::var("CELLAR_REDUCED_MOTION") {
        config.prefers_reduced_motion = parse_flag(&v);
    }
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn print_steps(graph: &ExecutionGraph) {
    for node in graph.step_nodes() {
        if let Some(step) = node.as_step() {
            println!(
                "  {:<28} backend={:<12} visual={:?}",
                step.name,
                step.status.map_or("-".to_string(), |s| format!("{s:?}")),
                step.visual_status
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 1. Build Graph
    let records = load_records()?;
    let graph = GraphBuilder::default().build(&records);
    println!(
        "Graph: {} nodes, {} edges, {} playable steps",
        graph.nodes.len(),
        graph.edges.len(),
        graph.step_nodes().len()
    );
    if graph.step_nodes().is_empty() {
        println!("Nothing to play.");
        return Ok(());
    }

    // 2. Spawn Playback
    let config = load_config()?;
    let auto_start = config.auto_start;
    let machine = PlaybackMachine::new(config, &graph.nodes);
    let (handle, task) = PlaybackDriver::spawn(machine);
    let mut events = handle.subscribe();

    if !auto_start {
        handle.start_execution().await?;
    }

    // 3. Follow Events
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event subscriber lagged");
                continue;
            }
            Err(_) => break,
        };

        match &event {
            PlaybackEvent::StateChanged { to, step_index, .. } => {
                println!("State -> {:?} (step {:?})", to, step_index);
            }
            PlaybackEvent::Halted {
                index,
                failure_reason,
            } => {
                println!(
                    "Halted at step {}: {}",
                    index,
                    failure_reason.as_deref().unwrap_or("no reason given")
                );
            }
            other => tracing::debug!(event = ?other, "Playback event"),
        }

        if matches!(
            event,
            PlaybackEvent::StateChanged {
                to: ExecutionState::ExecutionFinished,
                ..
            }
        ) {
            break;
        }
    }

    // 4. Final View
    handle.shutdown().await?;
    let machine = task.await?;
    let view = project(&graph, &machine);
    println!("Final step states:");
    print_steps(&view);
    println!(
        "{}",
        serde_json::to_string_pretty(&machine.snapshot()).context("encoding snapshot")?
    );

    Ok(())
}
