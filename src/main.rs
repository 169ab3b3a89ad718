//! `evedbtool` - EVEmu database administration.
//!
//! Installs the base dataset, runs schema migrations, seeds the market and
//! manages dungeon content.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use evedb::config::Config;
use evedb::db::DbPool;
use evedb::error::{AppError, AppResult};
use evedb::migration::Direction;
use evedb::models::{DungeonStatus, ListItem, NewDungeon};
use evedb::services::{dungeons, migrations};

#[derive(Parser)]
#[command(name = "evedbtool")]
#[command(about = "EVEmu database tool: migrations, base install, market seed and dungeons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install the base database and migrate to the most recent version
    Install {
        /// Limit the number of migrations (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        limit: usize,
        /// Don't apply migrations, just print them
        #[arg(long)]
        dry_run: bool,
    },
    /// Migrate the database to the most recent version available
    Up {
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long)]
        dry_run: bool,
    },
    /// Undo database migrations
    Down {
        /// Limit the number of migrations (0 = unlimited)
        #[arg(long, default_value_t = 1)]
        limit: usize,
        #[arg(long)]
        dry_run: bool,
    },
    /// Reapply the last migration
    Redo {
        #[arg(long)]
        dry_run: bool,
    },
    /// Show migration status
    Status,
    /// Create a new migration file
    New {
        name: String,
    },
    /// Mark migrations as applied without running them
    Skip {
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Seed the configured regions with default market data
    Seed {
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage dungeons
    Dungeon {
        #[command(subcommand)]
        command: DungeonCommand,
    },
}

#[derive(Subcommand)]
enum DungeonCommand {
    /// List all dungeons
    List,
    /// Export a dungeon to a file
    Export {
        #[arg(long)]
        dungeon: i32,
        #[arg(long, default_value = "export.json")]
        file: PathBuf,
        /// Print the JSON instead of writing the file
        #[arg(long)]
        dry_run: bool,
    },
    /// Import a dungeon from a file
    Import {
        file: PathBuf,
        /// Import even if a dungeon with the same UUID exists
        #[arg(long)]
        overwrite: bool,
    },
    /// Import every dungeon file in the dungeon directory
    Apply {
        #[arg(long)]
        overwrite: bool,
    },
    /// Create a new blank dungeon
    New {
        #[arg(long)]
        name: String,
        /// 1=Release, 2=Testing, 3=Working Copy
        #[arg(long, value_parser = parse_status)]
        status: DungeonStatus,
        #[arg(long)]
        faction: i32,
        #[arg(long)]
        archetype: i32,
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete a dungeon with all its rooms and objects
    Delete {
        #[arg(long)]
        dungeon: i32,
    },
    /// Add an empty room to a dungeon
    AddRoom {
        #[arg(long)]
        dungeon: i32,
        #[arg(long)]
        name: String,
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove a room from a dungeon (see list-rooms for room numbers)
    RemoveRoom {
        #[arg(long)]
        dungeon: i32,
        #[arg(long)]
        room: usize,
        #[arg(long)]
        dry_run: bool,
    },
    /// List the rooms of a dungeon
    ListRooms {
        #[arg(long)]
        dungeon: i32,
    },
    /// List dungeon archetypes
    ListArchetypes,
    /// List factions
    ListFactions,
}

fn parse_status(s: &str) -> Result<DungeonStatus, String> {
    let value: i32 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number (1=Release, 2=Testing, 3=Working Copy)", s))?;
    DungeonStatus::try_from(value)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging; RUST_LOG overrides the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> AppResult<()> {
    match command {
        Command::Install { limit, dry_run } => {
            let report = migrations::install(config, dry_run, limit).await?;
            if let Some(base) = &report.base {
                info!(
                    "Base install: {} applied, {} already installed, {} failed",
                    base.applied,
                    base.already_installed,
                    base.failures.len()
                );
                for failure in &base.failures {
                    error!("{}: {}", failure.file, failure.cause);
                }
            }
            print_outcome(&report.migrations, dry_run);
        }
        Command::Up { limit, dry_run } => {
            let outcome = migrations::apply_migrations(config, Direction::Up, dry_run, limit).await?;
            print_outcome(&outcome, dry_run);
        }
        Command::Down { limit, dry_run } => {
            let outcome =
                migrations::apply_migrations(config, Direction::Down, dry_run, limit).await?;
            print_outcome(&outcome, dry_run);
        }
        Command::Redo { dry_run } => {
            let outcome = migrations::redo_migration(config, dry_run).await?;
            if dry_run {
                print_lines(&outcome.describe());
            } else if let Some(planned) = outcome.planned.first() {
                println!("Reapplied migration {}", planned.id());
            }
        }
        Command::Status => {
            let report = migrations::migration_status(config).await?;
            for id in &report.missing {
                eprintln!("Could not find migration file: {}", id);
            }
            let rows = report
                .rows
                .iter()
                .map(|row| {
                    let applied = match (row.applied, row.applied_at) {
                        (true, Some(at)) => at.to_string(),
                        (true, None) => "yes".to_string(),
                        (false, _) => "no".to_string(),
                    };
                    [row.id.clone(), applied]
                })
                .collect::<Vec<_>>();
            print_table(["Migration", "Applied"], &rows);
        }
        Command::New { name } => {
            let path = migrations::new_migration(config, &name)?;
            println!("Created migration {}", path.display());
        }
        Command::Skip { limit } => {
            let outcome = migrations::skip_migrations(config, Direction::Up, limit).await?;
            println!("{}", outcome.skipped_message());
        }
        Command::Seed { dry_run } => {
            let outcome = migrations::seed_market(config, dry_run).await?;
            if dry_run {
                println!("Dry run, this is the query that will be executed:\n===\n");
                for (region, query) in &outcome.queries {
                    println!("Dry run for region {}\n---\n", region);
                    println!("{}", query);
                }
            } else if outcome.applied == 0 {
                println!("Market already seeded");
            } else {
                println!("Successfully applied {} migration!", outcome.applied);
            }
        }
        Command::Dungeon { command } => {
            let pool = DbPool::new(config).await?;
            let result = run_dungeon(command, config, &pool).await;
            pool.close().await?;
            result?;
        }
    }

    Ok(())
}

async fn run_dungeon(command: DungeonCommand, config: &Config, pool: &DbPool) -> AppResult<()> {
    match command {
        DungeonCommand::List => {
            print_items(["Dungeon ID", "Dungeon Name"], &dungeons::list_dungeons(pool).await?);
        }
        DungeonCommand::Export {
            dungeon,
            file,
            dry_run,
        } => {
            if dry_run {
                println!("{}", dungeons::export_dungeon(pool, dungeon).await?);
            } else {
                dungeons::export_dungeon_to_file(pool, dungeon, &file).await?;
            }
        }
        DungeonCommand::Import { file, overwrite } => {
            let data = tokio::fs::read(&file).await.map_err(|e| {
                AppError::FileSystem(format!("Error reading file {}: {}", file.display(), e))
            })?;
            let summary = dungeons::import_dungeon(pool, &data, overwrite).await?;
            println!(
                "Successfully imported dungeon {} as {} ({} rooms, {} objects)",
                summary.name, summary.dungeon_id, summary.rooms, summary.objects
            );
        }
        DungeonCommand::Apply { overwrite } => {
            let summary = dungeons::apply_dungeon_dir(pool, &config.dungeon_dir, overwrite).await?;
            println!(
                "Imported {} dungeons, {} failed",
                summary.imported.len(),
                summary.failures.len()
            );
        }
        DungeonCommand::New {
            name,
            status,
            faction,
            archetype,
            dry_run,
        } => {
            let new = NewDungeon {
                name,
                status,
                faction_id: faction,
                archetype_id: archetype,
            };
            let json = dungeons::new_dungeon(pool, new, dry_run).await?;
            if dry_run {
                println!("{}", json);
            } else {
                println!("Successfully created dungeon");
            }
        }
        DungeonCommand::Delete { dungeon } => {
            let deleted = dungeons::delete_dungeon(pool, dungeon).await?;
            println!(
                "Successfully deleted the dungeon ({} rooms, {} objects).",
                deleted.rooms, deleted.objects
            );
        }
        DungeonCommand::AddRoom {
            dungeon,
            name,
            dry_run,
        } => {
            let json = dungeons::add_room(pool, dungeon, &name, dry_run).await?;
            if dry_run {
                println!("Updated dungeon: ");
                println!("{}", json);
            }
        }
        DungeonCommand::RemoveRoom {
            dungeon,
            room,
            dry_run,
        } => {
            let json = dungeons::remove_room(pool, dungeon, room, dry_run).await?;
            if dry_run {
                println!("Updated dungeon: ");
                println!("{}", json);
            }
        }
        DungeonCommand::ListRooms { dungeon } => {
            let rooms = dungeons::list_rooms(pool, dungeon).await?;
            if rooms.is_empty() {
                return Err(AppError::NotFound(format!(
                    "Rooms for dungeon {} (either it does not exist or it has no rooms)",
                    dungeon
                )));
            }
            print_items(["Room ID", "Room Name"], &rooms);
        }
        DungeonCommand::ListArchetypes => {
            print_items(
                ["Archetype ID", "Archetype Name"],
                &dungeons::list_archetypes(pool).await?,
            );
        }
        DungeonCommand::ListFactions => {
            print_items(
                ["Faction ID", "Faction Name"],
                &dungeons::list_factions(pool).await?,
            );
        }
    }

    Ok(())
}

fn print_outcome(outcome: &migrations::MigrationOutcome, dry_run: bool) {
    if dry_run {
        print_lines(&outcome.describe());
    } else {
        println!("{}", outcome.applied_message());
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn print_items(headers: [&str; 2], items: &[ListItem]) {
    let rows = items
        .iter()
        .map(|item| [item.id.to_string(), item.name.clone()])
        .collect::<Vec<_>>();
    print_table(headers, &rows);
}

/// Two-column table with padded cells.
fn print_table(headers: [&str; 2], rows: &[[String; 2]]) {
    let width = |column: usize| {
        rows.iter()
            .map(|row| row[column].chars().count())
            .chain(std::iter::once(headers[column].len()))
            .max()
            .unwrap_or(0)
    };
    let (first, second) = (width(0), width(1));
    let separator = format!("+-{}-+-{}-+", "-".repeat(first), "-".repeat(second));

    println!("{}", separator);
    println!("| {:<first$} | {:<second$} |", headers[0], headers[1]);
    println!("{}", separator);
    for row in rows {
        println!("| {:<first$} | {:<second$} |", row[0], row[1]);
    }
    println!("{}", separator);
}
