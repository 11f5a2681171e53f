use std::path::PathBuf;

use clap::{Parser, Subcommand};
use devprov_core::DeviceState;

mod commands;

#[derive(Parser)]
#[command(
    name = "devprov",
    about = "devprov: device factory provisioning records",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to devprov.toml
    #[arg(short, long, global = true, default_value = "devprov.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a devprov.toml scaffold
    Init {
        /// SQLite database file the config points at
        #[arg(long, default_value = "devprov.db")]
        db: PathBuf,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create factory records from a JSON array file
    Create {
        #[arg(short, long)]
        file: PathBuf,
        /// Recorded as the factory admin of every created record
        #[arg(short, long)]
        actor: String,
    },
    /// List device records.
    ///
    /// Parameters use the query names, for example
    /// `--param containsLikeFields=imei --param containsLikeValues=990000`.
    List {
        #[arg(short, long = "param", value_parser = commands::parse_param)]
        params: Vec<(String, String)>,
    },
    /// List device history snapshots
    History {
        #[arg(short, long = "param", value_parser = commands::parse_param)]
        params: Vec<(String, String)>,
    },
    /// Move a device to another state
    ChangeState {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        imei: Option<String>,
        /// Target state, e.g. STOLEN
        #[arg(long)]
        state: Option<DeviceState>,
    },
    /// Replace a provisioned device's details
    Update {
        /// JSON file with the values currently on file
        #[arg(long)]
        current: PathBuf,
        /// JSON file with the replacement values
        #[arg(long)]
        replacement: PathBuf,
    },
    /// Delete provisioned devices by imei and/or serial number
    Delete {
        #[arg(long)]
        imei: Option<String>,
        #[arg(long)]
        serial: Option<String>,
    },
    /// Show one device, optionally with its history
    Show {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        imei: Option<String>,
        #[arg(long)]
        history: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,devprov=debug"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db, force } => commands::init::init(&cli.config, &db, force),
        Commands::Create { file, actor } => {
            let service = commands::open_service(&cli.config)?;
            commands::device::create(&service, &file, &actor)
        }
        Commands::List { params } => {
            let service = commands::open_service(&cli.config)?;
            commands::listing::devices(&service, params)
        }
        Commands::History { params } => {
            let service = commands::open_service(&cli.config)?;
            commands::listing::history(&service, params)
        }
        Commands::ChangeState { id, imei, state } => {
            let service = commands::open_service(&cli.config)?;
            commands::device::change_state(&service, id, imei.as_deref(), state)
        }
        Commands::Update {
            current,
            replacement,
        } => {
            let service = commands::open_service(&cli.config)?;
            commands::device::update(&service, &current, &replacement)
        }
        Commands::Delete { imei, serial } => {
            let service = commands::open_service(&cli.config)?;
            commands::device::delete(&service, imei.as_deref(), serial.as_deref())
        }
        Commands::Show { id, imei, history } => {
            let service = commands::open_service(&cli.config)?;
            commands::device::show(&service, id, imei.as_deref(), history)
        }
    }
}
