use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use venture_journal::config::{Config, StorageBackend};
use venture_journal::env_vars;
use venture_journal::export::{render_markdown, ExportInput};
use venture_journal::generation::{AnthropicGenerator, StepPayload};
use venture_journal::logging;
use venture_journal::progress::OverallProgress;
use venture_journal::store::{FileStorage, JournalStorage, MemoryStorage, StoreWatcher};
use venture_journal::sync::{JournalSync, SyncEvent, TokioClock};
use venture_journal::types::StepId;
use venture_journal::wizard::Wizard;

#[derive(Parser)]
#[command(name = "journal")]
#[command(about = "Guided five-step business-opportunity journal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List teams and their members
    Teams,

    /// Create a team
    CreateTeam {
        name: String,

        /// Roster member name (repeat for each member)
        #[arg(short, long = "member")]
        members: Vec<String>,
    },

    /// List a team's journals, newest first
    Journals { team_id: Uuid },

    /// Create a journal for a team
    CreateJournal { team_id: Uuid, title: String },

    /// Show per-step progress, gating and open issues
    Status { journal_id: Uuid },

    /// Save a step from a JSON file
    Import {
        journal_id: Uuid,

        /// Step number (1-5)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        step: u8,

        /// JSON file shaped like the step data
        #[arg(short, long)]
        file: PathBuf,

        /// Team member the step 1 data belongs to
        #[arg(short, long)]
        member: Option<Uuid>,
    },

    /// Draft a step with the generation provider (local dataset when unavailable)
    Fill {
        journal_id: Uuid,

        /// Step number (1-5)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        step: u8,

        /// What to ask for
        #[arg(short, long, default_value = "")]
        prompt: String,

        /// Team member the step 1 draft belongs to
        #[arg(short, long)]
        member: Option<Uuid>,
    },

    /// Render the journal as markdown
    Export {
        journal_id: Uuid,

        /// Output file (default: <export dir>/<title>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Follow a journal, printing progress whenever it changes
    Watch { journal_id: Uuid },

    /// List supported environment variables
    Env,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let long_running = matches!(cli.command, Commands::Watch { .. });
    let logging_handle = logging::init_logging(&config, long_running, cli.debug)?;

    match cli.command {
        Commands::Teams => cmd_teams(&config).await?,
        Commands::CreateTeam { name, members } => cmd_create_team(&config, &name, members).await?,
        Commands::Journals { team_id } => cmd_journals(&config, team_id).await?,
        Commands::CreateJournal { team_id, title } => {
            cmd_create_journal(&config, team_id, &title).await?;
        }
        Commands::Status { journal_id } => cmd_status(&config, journal_id).await?,
        Commands::Import {
            journal_id,
            step,
            file,
            member,
        } => cmd_import(&config, journal_id, step, &file, member).await?,
        Commands::Fill {
            journal_id,
            step,
            prompt,
            member,
        } => cmd_fill(&config, journal_id, step, &prompt, member).await?,
        Commands::Export { journal_id, output } => cmd_export(&config, journal_id, output).await?,
        Commands::Watch { journal_id } => {
            cmd_watch(&config, journal_id).await?;
            if let Some(log_path) = logging_handle.log_file_path {
                if log_path.metadata().is_ok_and(|m| m.len() > 0) {
                    eprintln!("Session log: {}", log_path.display());
                }
            }
        }
        Commands::Env => cmd_env(),
    }

    Ok(())
}

/// Storage backend selected by config, plus the file store when there is one
fn open_storage(config: &Config) -> (Arc<dyn JournalStorage>, Option<Arc<FileStorage>>) {
    match config.storage.backend {
        StorageBackend::File => {
            let file = Arc::new(FileStorage::new(config.data_path()));
            (file.clone(), Some(file))
        }
        StorageBackend::Memory => (Arc::new(MemoryStorage::new()), None),
    }
}

fn new_sync(config: &Config, storage: Arc<dyn JournalStorage>) -> JournalSync {
    JournalSync::with_clock(storage, Arc::new(TokioClock), config.debounce())
}

/// Select a journal (and its team) and load its step data
async fn open_journal(sync: &JournalSync, journal_id: Uuid) -> Result<()> {
    let journal = sync
        .storage()
        .get_journal(journal_id)
        .await?
        .ok_or_else(|| anyhow!("Journal {journal_id} not found"))?;

    sync.load_teams().await;
    let team = sync
        .snapshot()
        .await
        .teams
        .into_iter()
        .find(|t| t.id == journal.team_id);
    if let Some(team) = team {
        sync.select_team(team).await;
    }
    sync.open_journal(journal).await;
    Ok(())
}

async fn open_wizard(config: &Config, journal_id: Uuid) -> Result<Wizard> {
    let (storage, _) = open_storage(config);
    let sync = new_sync(config, storage);
    open_journal(&sync, journal_id).await?;
    Ok(Wizard::new(sync))
}

fn step_arg(step: u8) -> Result<StepId> {
    StepId::from_number(step).ok_or_else(|| anyhow!("Step must be between 1 and 5"))
}

async fn cmd_teams(config: &Config) -> Result<()> {
    let (storage, _) = open_storage(config);
    let teams = storage.list_teams().await?;

    if teams.is_empty() {
        println!("No teams yet (use 'journal create-team')");
        return Ok(());
    }

    for team in &teams {
        println!("{}  {}", team.id, team.name);
        for member in &team.members {
            println!("    {}  {}", member.id, member.name);
        }
    }
    Ok(())
}

async fn cmd_create_team(config: &Config, name: &str, members: Vec<String>) -> Result<()> {
    let (storage, _) = open_storage(config);
    let sync = new_sync(config, storage);
    let team = sync.create_team(name, members).await?;

    println!("Created team {} ({})", team.name, team.id);
    for member in &team.members {
        println!("    {}  {}", member.id, member.name);
    }
    Ok(())
}

async fn cmd_journals(config: &Config, team_id: Uuid) -> Result<()> {
    let (storage, _) = open_storage(config);
    let journals = storage.list_journals(team_id).await?;

    if journals.is_empty() {
        println!("No journals for this team");
        return Ok(());
    }

    for journal in &journals {
        println!(
            "{}  {:<11} {:>3}%  {}",
            journal.id, journal.status, journal.progress, journal.title
        );
    }
    Ok(())
}

async fn cmd_create_journal(config: &Config, team_id: Uuid, title: &str) -> Result<()> {
    let (storage, _) = open_storage(config);
    let sync = new_sync(config, storage);
    let journal = sync.create_journal(team_id, title).await?;

    println!("Created journal {} ({})", journal.title, journal.id);
    Ok(())
}

fn print_gating(overall: &OverallProgress) {
    println!("Overall progress: {}%", overall.total_progress);
    println!("{}", "─".repeat(48));
    for id in StepId::ALL {
        let step = overall.step(id);
        let icon = if step.completed {
            "✓"
        } else if step.locked {
            "🔒"
        } else {
            "▶"
        };
        println!("{icon} {:<36} {:>3}%", id.to_string(), step.progress);
    }
}

async fn cmd_status(config: &Config, journal_id: Uuid) -> Result<()> {
    let wizard = open_wizard(config, journal_id).await?;
    let overall = wizard.sync_summary().await;

    if let Some(journal) = wizard.sync().current_journal().await {
        println!("{} [{}]", journal.title, journal.status);
    }
    print_gating(&overall);

    for step in StepId::ALL {
        let issues = wizard.issues(step).await;
        if issues.is_empty() {
            continue;
        }
        println!();
        println!("{step}:");
        for issue in issues {
            println!("    - {issue}");
        }
    }
    Ok(())
}

async fn cmd_import(
    config: &Config,
    journal_id: Uuid,
    step: u8,
    file: &Path,
    member: Option<Uuid>,
) -> Result<()> {
    let step = step_arg(step)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not JSON", file.display()))?;
    let payload = StepPayload::parse(step, value)
        .with_context(|| format!("{} does not match {step}", file.display()))?;

    let wizard = open_wizard(config, journal_id).await?;
    if !wizard.apply_payload(payload, member).await? {
        return Err(anyhow!("Saving {step} failed; see the log for details"));
    }

    let overall = wizard.sync_summary().await;
    println!("Imported {step}");
    print_gating(&overall);
    Ok(())
}

async fn cmd_fill(
    config: &Config,
    journal_id: Uuid,
    step: u8,
    prompt: &str,
    member: Option<Uuid>,
) -> Result<()> {
    let step = step_arg(step)?;
    let generator = AnthropicGenerator::from_env(&config.generation)?;
    let wizard = open_wizard(config, journal_id).await?;

    let result = wizard.prefill(&generator, step, prompt, member).await?;
    match &result.fallback_reason {
        Some(reason) => println!("Filled {step} with the local dataset ({reason})"),
        None => println!("Filled {step} with generated content"),
    }

    print_gating(&wizard.sync_summary().await);
    Ok(())
}

async fn cmd_export(config: &Config, journal_id: Uuid, output: Option<PathBuf>) -> Result<()> {
    let wizard = open_wizard(config, journal_id).await?;
    let overall = wizard.gating().await;
    let snapshot = wizard.sync().snapshot().await;
    let journal = snapshot
        .current_journal
        .as_ref()
        .ok_or_else(|| anyhow!("Journal {journal_id} not loaded"))?;

    let document = render_markdown(&ExportInput {
        team: snapshot.journal_team(),
        journal,
        data: &snapshot.data,
        overall: &overall,
    })?;

    let path = output.unwrap_or_else(|| {
        config
            .export_path()
            .join(format!("{}.md", file_stem(&journal.title, journal_id)))
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, document)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported to {}", path.display());
    Ok(())
}

/// Lowercase ASCII slug of a title, or the id when nothing is left
fn file_stem(title: &str, id: Uuid) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        id.to_string()
    } else {
        slug
    }
}

async fn cmd_watch(config: &Config, journal_id: Uuid) -> Result<()> {
    let (storage, file) = open_storage(config);
    let _watcher: Option<StoreWatcher> = match file {
        Some(file) => Some(file.watch(config.watch_poll())?),
        None => None,
    };

    let sync = new_sync(config, storage);
    let mut events = sync.events();
    open_journal(&sync, journal_id).await?;
    sync.subscribe(journal_id);

    let wizard = Wizard::new(sync.clone());
    print_gating(&wizard.sync_summary().await);
    println!("Watching for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SyncEvent::Reloaded { journal_id: id, failed }) if id == journal_id => {
                    if !failed.is_empty() {
                        let names: Vec<&str> = failed.iter().map(|t| t.as_str()).collect();
                        eprintln!("Could not load: {}", names.join(", "));
                    }
                    println!();
                    print_gating(&wizard.sync_summary().await);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    sync.unsubscribe();
    Ok(())
}

fn cmd_env() {
    for (category, vars) in env_vars::env_vars_by_category() {
        println!("{}", category.display_name());
        for var in vars {
            println!("  {}", var.name);
            println!("      {}", var.description);
            if let Some(default) = var.default {
                println!("      default: {default}");
            }
            if let Some(example) = var.example {
                println!("      example: {example}");
            }
        }
        println!();
    }
}
