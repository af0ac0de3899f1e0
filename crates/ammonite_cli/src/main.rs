//! Operator CLI for layouts and protocol runs.
//!
//! # Responsibility
//! - Expose core services for local setup (labware, decks, calibration).
//! - Dry-run protocols and run them on the simulated arm.
//!
//! Output is JSON on stdout so it can be piped into other tooling.

use ammonite_core::config::{DATABASE_URL_VAR, LEGACY_DATABASE_URL_VAR};
use ammonite_core::{
    core_version, init_logging, parse_protocol, ping, CoreConfig, DatabaseLocation,
    DeckCalibration, DeckService, DeviceLockRepository, LabwareService, NewDeck,
    ProtocolService, SimulatedArm, SqliteDeckRepository, SqliteDeviceLockRepository,
    SqliteEntityRepository, SqliteLabwareRepository,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_FILE: &str = "ammonite.db";

#[derive(Parser)]
#[command(name = "ammonite")]
#[command(about = "Pipetting arm layout store and protocol compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file; overrides AMMONITE_DATABASE_URL / DATABASE_URL.
    /// Defaults to ./ammonite.db when neither is set.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check core linkage
    Ping,

    /// Import an Opentrons labware definition
    ImportLabware {
        /// Definition JSON file
        file: PathBuf,
    },

    /// List stored labware
    Labware,

    /// Create an uncalibrated deck from a JSON description
    CreateDeck {
        /// `{"name": ..., "locations": [{"name": ..., "offset": [x, y, z], "orientation": [w, x, y, z]}]}`;
        /// `orientation` is optional
        file: PathBuf,
    },

    /// List stored decks
    Decks,

    /// Install a deck calibration
    Calibrate {
        deck: String,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true)]
        z: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "1.0")]
        qw: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0.0")]
        qx: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0.0")]
        qy: f64,
        #[arg(long, allow_hyphen_values = true, default_value = "0.0")]
        qz: f64,
    },

    /// Compile a protocol without running it
    Compile {
        /// Protocol JSON file
        file: PathBuf,
    },

    /// Run a protocol on the simulated arm under the device lock
    Run {
        /// Protocol JSON file
        file: PathBuf,

        /// Reject moves farther than this from the arm base (mm)
        #[arg(long)]
        reach: Option<f64>,
    },

    /// Show recorded protocol runs
    Activity {
        /// Show a single activity
        #[arg(long)]
        id: Option<i64>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,
    },

    /// Fail runs left RUNNING by an interrupted process and free the lock
    RecoverLock,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CoreConfig::from_env();
    config.database = database_location(cli.db, |key| std::env::var(key).ok());
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).context("failed to start logging")?;
    }

    match cli.command {
        Commands::Ping => {
            println!("ammonite_core ping={}", ping());
            println!("ammonite_core version={}", core_version());
            Ok(())
        }
        command => run_command(&config, command),
    }
}

fn run_command(config: &CoreConfig, command: Commands) -> Result<()> {
    if config.database == DatabaseLocation::Memory {
        eprintln!("warning: using an in-memory database; nothing will be kept");
    }
    let conn = config.open_db().context("failed to open database")?;
    if let Some(dir) = &config.labware_dir {
        LabwareService::new(SqliteLabwareRepository::try_new(&conn)?)
            .seed_defaults(dir)
            .with_context(|| format!("failed to seed labware from {}", dir.display()))?;
    }

    match command {
        Commands::Ping => Ok(()),
        Commands::ImportLabware { file } => {
            let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn)?);
            let labware = service
                .import_opentrons(&read_file(&file)?)
                .with_context(|| format!("failed to import {}", file.display()))?;
            print_json(&json!({"imported": labware.name, "wells": labware.wells.len()}))
        }
        Commands::Labware => {
            let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn)?);
            print_json(&service.list_labware()?)
        }
        Commands::CreateDeck { file } => {
            let deck: NewDeck = serde_json::from_str(&read_file(&file)?)
                .with_context(|| format!("invalid deck description in {}", file.display()))?;
            DeckService::new(SqliteDeckRepository::try_new(&conn)?).create_deck(&deck)?;
            print_json(&json!({"created": deck.name, "locations": deck.locations.len()}))
        }
        Commands::Decks => {
            let service = DeckService::new(SqliteDeckRepository::try_new(&conn)?);
            print_json(&service.list_decks()?)
        }
        Commands::Calibrate {
            deck,
            x,
            y,
            z,
            qw,
            qx,
            qy,
            qz,
        } => {
            let calibration = DeckCalibration::from_components(x, y, z, qw, qx, qy, qz);
            DeckService::new(SqliteDeckRepository::try_new(&conn)?)
                .calibrate(&deck, &calibration)?;
            print_json(&json!({"calibrated": deck}))
        }
        Commands::Compile { file } => {
            let commands = parse_protocol(&read_file(&file)?)?;
            let service = ProtocolService::new(
                SqliteEntityRepository::try_new(&conn)?,
                SqliteDeviceLockRepository::try_new(&conn)?,
            );
            print_json(&service.dry_run(&commands)?)
        }
        Commands::Run { file, reach } => {
            let commands = parse_protocol(&read_file(&file)?)?;
            let service = ProtocolService::new(
                SqliteEntityRepository::try_new(&conn)?,
                SqliteDeviceLockRepository::try_new(&conn)?,
            );
            let mut arm = SimulatedArm::new();
            if let Some(radius) = reach {
                arm = arm.with_reach(radius);
            }
            let report = service.run(&commands, &mut arm)?;
            info!(
                "event=cli_run module=cli status=ok activity={} instructions={}",
                report.activity,
                report.plan.len()
            );
            print_json(&report)
        }
        Commands::Activity { id, limit } => {
            let locks = SqliteDeviceLockRepository::try_new(&conn)?;
            match id {
                Some(id) => {
                    let record = locks
                        .get_activity(id)?
                        .with_context(|| format!("activity {id} not found"))?;
                    print_json(&record)
                }
                None => print_json(&locks.list_activities(limit)?),
            }
        }
        Commands::RecoverLock => {
            let locks = SqliteDeviceLockRepository::try_new(&conn)?;
            let failed = locks.recover_stale_lock()?;
            print_json(&json!({"failed_activities": failed}))
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// `--db` wins over the database URL variables; with neither, the database
/// is `ammonite.db` in the working directory. An explicit `:memory:` URL is
/// still honored.
fn database_location(
    db_flag: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> DatabaseLocation {
    if let Some(path) = db_flag {
        return DatabaseLocation::File(path);
    }
    let url_set = [DATABASE_URL_VAR, LEGACY_DATABASE_URL_VAR]
        .into_iter()
        .any(|key| lookup(key).is_some_and(|value| !value.trim().is_empty()));
    if url_set {
        CoreConfig::from_lookup(&lookup).database
    } else {
        DatabaseLocation::File(PathBuf::from(DEFAULT_DATABASE_FILE))
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
