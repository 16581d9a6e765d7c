#![deny(unused)]
//! BiasBouncer - manager/worker multi-agent orchestration.
//!
//! A Project Manager agent breaks a goal into sub-tasks and delegates them to
//! a team of specialist agents described in a YAML or JSON team file.
//!
//! ```text
//! biasbouncer [TEAM_FILE] [GOAL...]          run a team on a goal
//! biasbouncer design OUT_FILE [GOAL...]      chat a team into existence
//! biasbouncer edit TEAM_FILE INDEX REQUEST   rewrite one member through chat
//! ```
//!
//! Missing arguments fall back to `run.team_file` and `run.goal` from the
//! configuration (`APP__RUN__TEAM_FILE`, `APP__RUN__GOAL`).

use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bouncer_controller::{DesignReply, EditReply, SessionBuilder, TeamDesigner, TracingObserver};
use bouncer_core::config::{AppConfig, LoggingConfig};
use bouncer_core::traits::{ChatMessage, ToolRegistry};
use bouncer_core::types::{parse_team, team_to_yaml, AgentSpec};
use bouncer_model_gateway::{create_clients, export_api_keys};
use bouncer_sandbox::{DockerSandbox, ExecuteCodeTool, SandboxConfig, SandboxEngine, SandboxManager};
use bouncer_skills::{DefaultToolRegistry, ReadFileTool, SearchConfig, WebSearchTool, WriteFileTool};

fn configure_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| logging.filter.clone())
        .unwrap_or_else(|| "info,biasbouncer=debug".into());
    let registry = tracing_subscriber::registry().with(EnvFilter::try_new(filter)?);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Register the host tools, plus `execute_code` when Docker is reachable.
async fn build_registry(
    config: &AppConfig,
) -> anyhow::Result<(Arc<DefaultToolRegistry>, Option<Arc<SandboxManager>>)> {
    let registry = Arc::new(DefaultToolRegistry::new());
    let root = &config.tools.workspace_root;

    registry
        .register(Box::new(WebSearchTool::new(SearchConfig::from(&config.tools))))
        .await?;
    registry.register(Box::new(WriteFileTool::new(root))).await?;
    registry.register(Box::new(ReadFileTool::new(root))).await?;

    let sandbox = if !config.sandbox.enabled {
        tracing::info!("Sandbox disabled by configuration");
        None
    } else {
        match DockerSandbox::new() {
            Ok(engine) => {
                let engine = Arc::new(engine);
                if engine.is_available().await {
                    let manager = Arc::new(SandboxManager::new(
                        engine,
                        SandboxConfig::from(&config.sandbox),
                    ));
                    registry
                        .register(Box::new(ExecuteCodeTool::new(manager.clone())))
                        .await?;
                    tracing::info!(image = %config.sandbox.image, "Code sandbox initialized");
                    Some(manager)
                } else {
                    tracing::warn!("Docker daemon not reachable; execute_code disabled");
                    None
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Docker not available; execute_code disabled");
                None
            }
        }
    };

    tracing::info!(tools_count = registry.len(), workspace = %root, "Tool registry initialized");
    Ok((registry, sandbox))
}

/// Clarifying rounds before `design` gives up.
const DESIGN_ROUNDS: usize = 3;

/// Sent in place of an empty answer.
const CREATE_NOW: &str = "No more details. Create the team now.";

async fn read_team(path: &str) -> anyhow::Result<Vec<AgentSpec>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read team file '{}'", path))?;
    Ok(parse_team(&content)?)
}

async fn write_team(path: &str, specs: &[AgentSpec]) -> anyhow::Result<()> {
    tokio::fs::write(path, team_to_yaml(specs)?)
        .await
        .with_context(|| format!("failed to write team file '{}'", path))?;
    for spec in specs {
        tracing::info!(agent = %spec.name, role = %spec.role, file = %path, "Team member saved");
    }
    Ok(())
}

fn designer(config: &AppConfig) -> anyhow::Result<TeamDesigner> {
    let clients = create_clients(&config.model)?;
    Ok(TeamDesigner::new(
        clients.coordinator,
        config.orchestrator.model_timeout(),
    ))
}

/// `design OUT_FILE [GOAL...]`
async fn design_team(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    let (out_file, goal) = args
        .split_first()
        .context("usage: biasbouncer design OUT_FILE [GOAL...]")?;
    let goal = Some(goal.join(" "))
        .filter(|g| !g.trim().is_empty())
        .or_else(|| config.run.goal.clone())
        .context("no goal given (pass it after the output file or set APP__RUN__GOAL)")?;

    let designer = designer(config)?;
    let mut conversation = vec![ChatMessage::user(goal)];
    let mut answers = BufReader::new(tokio::io::stdin()).lines();

    for round in 1..=DESIGN_ROUNDS {
        match designer.design(&conversation).await? {
            DesignReply::Team(specs) => return write_team(out_file, &specs).await,
            DesignReply::Message(question) => {
                println!("{}", question);
                if round == DESIGN_ROUNDS {
                    break;
                }
                let answer = answers
                    .next_line()
                    .await?
                    .filter(|line| !line.trim().is_empty())
                    .unwrap_or_else(|| CREATE_NOW.to_string());
                conversation.push(ChatMessage::assistant(question));
                conversation.push(ChatMessage::user(answer));
            }
        }
    }
    anyhow::bail!("no team was designed after {} rounds", DESIGN_ROUNDS)
}

/// `edit TEAM_FILE INDEX REQUEST...`
async fn edit_member(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    let [team_file, index, request @ ..] = args else {
        anyhow::bail!("usage: biasbouncer edit TEAM_FILE INDEX REQUEST...");
    };
    let index: usize = index
        .parse()
        .with_context(|| format!("member index '{}' is not a number", index))?;
    let request = request.join(" ");
    anyhow::ensure!(!request.trim().is_empty(), "no edit request given");

    let mut specs = read_team(team_file).await?;
    let reply = designer(config)?
        .edit(&specs, index, &[ChatMessage::user(request)])
        .await?;

    match reply {
        EditReply::Patch(patch) => {
            let (index, spec) = patch.into_spec();
            if let Some(slot) = specs.get_mut(index) {
                *slot = spec;
            }
            write_team(team_file, &specs).await
        }
        EditReply::Message(text) => {
            println!("{}", text);
            Ok(())
        }
    }
}

/// `[TEAM_FILE] [GOAL...]`
async fn run_team(config: &AppConfig, args: &[String]) -> anyhow::Result<()> {
    let team_file = args
        .first()
        .cloned()
        .or_else(|| config.run.team_file.clone())
        .context("usage: biasbouncer [TEAM_FILE] [GOAL...] (or set APP__RUN__TEAM_FILE)")?;
    let goal = Some(args.iter().skip(1).cloned().collect::<Vec<_>>().join(" "))
        .filter(|g| !g.trim().is_empty())
        .or_else(|| config.run.goal.clone())
        .context("no goal given (pass it after the team file or set APP__RUN__GOAL)")?;

    let specs = read_team(&team_file).await?;
    let clients = create_clients(&config.model)?;
    let (registry, sandbox) = build_registry(config).await?;

    let session = Arc::new(
        SessionBuilder::new()
            .with_config(&config.orchestrator)
            .with_registry(registry)
            .with_coordinator_llm(clients.coordinator)
            .with_specialist_llm(clients.specialist)
            .with_selection_llm(clients.selection)
            .build()?,
    );

    session.create_team(specs).await?;
    for (entry, agent) in session.roster().iter().zip(session.agents()) {
        tracing::info!(agent = %entry.name, role = %entry.role, tools = ?agent.tool_names(), "Team member ready");
    }

    let interrupt = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling run");
            interrupt.cancel();
        }
    });

    let result = session.run(&goal, &TracingObserver).await;

    if let Some(manager) = sandbox {
        if let Err(e) = manager.teardown().await {
            tracing::warn!(error = %e, "Sandbox teardown failed");
        }
    }

    match result {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) if e.is_authentication() => {
            tracing::error!(error = %e, "Model provider rejected the credentials");
            Err(anyhow::Error::new(e).context("check OPENAI_API_KEY / ANTHROPIC_API_KEY"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    configure_tracing(&config.logging)?;
    tracing::info!("Starting BiasBouncer v{}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("design") => design_team(&config, &args[1..]).await,
        Some("edit") => edit_member(&config, &args[1..]).await,
        _ => run_team(&config, &args).await,
    }
}

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    // Provider clients read their keys from the environment. Set them while
    // the process is still single threaded.
    export_api_keys(&config.model);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(config))
}
