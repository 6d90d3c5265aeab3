//! orbit CLI tool
//!
//! Drives a collapse/expand session against a JSON snapshot file (anonymous mode) or, with the
//! `service` feature and `--db`, an SQLite database (authenticated mode).
//!
//! ## Commands
//!
//! - `show`: print the visible graph as JSON
//! - `collapse|expand|toggle <id>`: change collapsed state
//! - `reveal <id>`: expand the ancestors hiding a node
//! - `add-child|add-root|edit|delete`: graph edits
//! - `list`, `reconcile`, `check`, `init`

use clap::{Parser, Subcommand};
use orbit_core::{
    commands::{NodeEdit, Op, OpResult},
    config::{ConfigProvider, TomlConfigProvider},
    persistence::{LocalStore, PersistenceAdapter, SessionMode},
    properties::NodeId,
    session::Session,
    OrbitError,
};
use std::{io::Write, path::PathBuf};

#[derive(Parser)]
#[command(name = "orbit")]
#[command(author, version, about = "Collapse, expand and edit a tree-shaped knowledge graph", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "orbit.toml")]
    config: PathBuf,

    /// Snapshot file, overriding the configured one
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// SQLite database; switches to an authenticated session
    #[cfg(feature = "service")]
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the effective configuration to the config file
    Init,
    /// Print the visible graph as JSON
    Show,
    /// Print every node, ordered by label
    List,
    Collapse { id: String },
    Expand { id: String },
    /// Collapse a parent or expand a collapsed one
    Toggle { id: String },
    /// Expand the collapsed ancestors hiding a node
    Reveal {
        id: String,
        /// Do not ask before expanding
        #[arg(short, long)]
        yes: bool,
    },
    AddChild {
        parent: String,
        label: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Create the node as a parent
        #[arg(long)]
        parent_node: bool,
    },
    AddRoot {
        label: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        is_parent: Option<bool>,
    },
    /// Delete a node and its subtree
    Delete { id: String },
    /// Pull collapsed flags from the remote store
    Reconcile,
    /// Run the graph store's structural self-check
    Check,
}

fn confirm(chain: &[NodeId]) -> bool {
    let names = chain
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<String>>()
        .join(", ");
    print!("Expand {names}? [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

async fn run<S: PersistenceAdapter>(
    loaded: (Session<S>, Vec<OrbitError>),
    command: Commands,
) -> Result<(), OrbitError> {
    let (mut session, diagnostics) = loaded;
    for diagnostic in diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    let op = match command {
        Commands::Init => return Ok(()),
        Commands::Reveal { id, yes } => {
            let outcome = match yes {
                true => session.reveal(&id.into(), |_| true).await?,
                false => session.reveal(&id.into(), confirm).await?,
            };
            println!("{}", OpResult::Reveal(outcome));
            return Ok(());
        }
        Commands::Show => Op::View,
        Commands::List => Op::SearchIndex,
        Commands::Collapse { id } => Op::Collapse(id.into()),
        Commands::Expand { id } => Op::Expand(id.into()),
        Commands::Toggle { id } => Op::Toggle(id.into()),
        Commands::AddChild {
            parent,
            label,
            url,
            note,
            parent_node,
        } => Op::AddChild {
            parent: parent.into(),
            label,
            url,
            note,
            is_parent: parent_node,
        },
        Commands::AddRoot { label, url, note } => Op::AddRoot { label, url, note },
        Commands::Edit {
            id,
            label,
            url,
            note,
            is_parent,
        } => Op::Edit(
            id.into(),
            NodeEdit {
                label,
                url,
                note,
                is_parent,
            },
        ),
        Commands::Delete { id } => Op::Delete(id.into()),
        Commands::Reconcile => Op::Reconcile,
        Commands::Check => Op::BuiltInTest,
    };

    match session.execute(op).await? {
        OpResult::View(view) => println!("{}", serde_json::to_string_pretty(&view)?),
        OpResult::Nodes(nodes) => {
            for node in nodes {
                println!("{}\t{}", node.id, node.label);
            }
        }
        OpResult::Diagnostics(errors) if errors.is_empty() => println!("graph is consistent"),
        OpResult::Diagnostics(errors) => {
            for error in errors {
                println!("- {error}");
            }
        }
        result => println!("{result}"),
    }
    session.save().await
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let provider = TomlConfigProvider::new(cli.config.clone());
    let mut config = provider.get_config()?;
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = snapshot;
    }
    #[cfg(feature = "service")]
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    if matches!(cli.command, Commands::Init) {
        provider.set_config(&config)?;
        println!("wrote {}", provider.path().display());
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let local = LocalStore::new(&config.snapshot_path);
        #[cfg(feature = "service")]
        if let Some(db_path) = config.database_path.clone() {
            let db = orbit_core::db::DbConnection::open(db_path).await?;
            let loaded = Session::load_with_fallback(db, &local, &config, None).await?;
            return run(loaded, cli.command).await;
        }
        let loaded = Session::load(local, SessionMode::Anonymous, &config, None).await?;
        run(loaded, cli.command).await
    })?;
    Ok(())
}
