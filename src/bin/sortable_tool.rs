use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rustsortable::storage::snapshot;
use rustsortable::{EntityManager, InMemoryStorage, Record, Value, parse_schemas};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sortable-tool")]
#[command(about = "Inspect and reorder sortable entities stored in a JSON snapshot")]
struct Cli {
    /// JSON array of entity schemas
    #[arg(long)]
    schema: PathBuf,
    /// Snapshot file; created on first write
    #[arg(long)]
    data: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the tables of every schema entity
    Init,
    Insert {
        #[arg(long)]
        entity: String,
        /// Field assignment `name=value`, repeatable
        #[arg(long = "set", value_parser = parse_assignment)]
        fields: Vec<(String, Value)>,
    },
    List {
        #[arg(long)]
        entity: String,
    },
    MoveUp {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        id: i64,
    },
    MoveDown {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        id: i64,
    },
    Swap {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        with: i64,
    },
    SetPosition {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        to: i64,
    },
    /// Renumber positions to 1..N
    Compact {
        #[arg(long)]
        entity: String,
    },
    Remove {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        id: i64,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut manager = open(&cli.schema, &cli.data)?;
    let dirty = run(&mut manager, cli.command)?;
    if dirty {
        let catalog = manager.into_store().catalog()?;
        snapshot::save(&cli.data, &catalog)
            .with_context(|| format!("Failed to write snapshot '{}'", cli.data.display()))?;
    }
    Ok(())
}

/// Logs go to stderr so `list` output stays clean. `RUST_LOG` overrides.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(schema_path: &Path, data_path: &Path) -> Result<EntityManager> {
    let json = fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read schema '{}'", schema_path.display()))?;
    let schemas = parse_schemas(&json)
        .with_context(|| format!("Invalid schema file '{}'", schema_path.display()))?;
    let catalog = snapshot::load(data_path)
        .with_context(|| format!("Failed to load snapshot '{}'", data_path.display()))?;

    let mut manager = EntityManager::new(InMemoryStorage::from_catalog(catalog));
    for schema in schemas {
        let name = schema.name.clone();
        manager
            .register(schema)
            .with_context(|| format!("Failed to register entity '{}'", name))?;
    }
    Ok(manager)
}

/// Runs one command. Returns whether the store changed.
fn run(manager: &mut EntityManager, command: Command) -> Result<bool> {
    match command {
        Command::Init => {
            println!("Initialized {} entities", manager.entity_names().len());
            Ok(true)
        }
        Command::Insert { entity, fields } => {
            let mut record = manager.create(&entity)?;
            for (name, value) in fields {
                record.set(name, value)?;
            }
            manager.save(&mut record)?;
            println!("Inserted {} #{}", entity, record.require_id()?);
            Ok(true)
        }
        Command::List { entity } => {
            let records = if manager.sortable(&entity).is_ok() {
                manager.sortable(&entity)?.ordered()?
            } else {
                manager.find_all(&entity)?
            };
            for record in &records {
                println!("{}", format_record(record));
            }
            Ok(false)
        }
        Command::MoveUp { entity, id } => {
            let mut record = load(manager, &entity, id)?;
            manager.sortable(&entity)?.move_up(&mut record)?;
            println!("{}", format_record(&record));
            Ok(true)
        }
        Command::MoveDown { entity, id } => {
            let mut record = load(manager, &entity, id)?;
            manager.sortable(&entity)?.move_down(&mut record)?;
            println!("{}", format_record(&record));
            Ok(true)
        }
        Command::Swap { entity, id, with } => {
            let mut record = load(manager, &entity, id)?;
            let mut other = load(manager, &entity, with)?;
            manager.sortable(&entity)?.swap_with(&mut record, &mut other)?;
            println!("{}", format_record(&record));
            println!("{}", format_record(&other));
            Ok(true)
        }
        Command::SetPosition { entity, id, to } => {
            let column = manager.sortable(&entity)?.engine().column().to_string();
            let mut record = load(manager, &entity, id)?;
            record.set(column, to)?;
            manager.save(&mut record)?;
            println!("{}", format_record(&record));
            Ok(true)
        }
        Command::Compact { entity } => {
            let moved = manager.sortable(&entity)?.compact()?;
            println!("Renumbered {} entities", moved);
            Ok(moved > 0)
        }
        Command::Remove { entity, id } => {
            let mut record = load(manager, &entity, id)?;
            manager.remove(&mut record)?;
            println!("Removed {} #{}", entity, id);
            Ok(true)
        }
    }
}

fn load(manager: &EntityManager, entity: &str, id: i64) -> Result<Record> {
    manager
        .find(entity, id)?
        .ok_or_else(|| anyhow!("{} #{} does not exist", entity, id))
}

fn format_record(record: &Record) -> String {
    let fields = record
        .fields()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(" ");
    match record.id() {
        Some(id) => format!("#{} {}", id, fields),
        None => format!("#- {}", fields),
    }
}

fn parse_assignment(input: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = input.split_once('=') else {
        bail!("Expected name=value, got '{}'", input);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing field name in '{}'", input);
    }
    Ok((name.to_string(), Value::parse_literal(raw.trim())))
}
