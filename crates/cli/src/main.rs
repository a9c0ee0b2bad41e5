mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pkmnhelper_core::config::Config;
use pkmnhelper_core::domain::Caught;
use pkmnhelper_core::Database;
use tracing_subscriber::EnvFilter;

/// pkmnhelper — pokedex storage and image-hash tables for the catch bot
#[derive(Parser)]
#[command(name = "pkmnhelper", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "PKMNHELPER_CONFIG", default_value = "pkmnhelper.toml")]
    config: PathBuf,

    /// Path to the database (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the image archive and rebuild both hash tables
    Populate,
    /// Show a player, registering them if needed
    Player {
        /// Discord user id
        discord_id: i64,
    },
    /// Show a player only if already registered
    CheckPlayer {
        /// Discord user id
        discord_id: i64,
    },
    /// Identify an image by the MD5 of its bytes
    Image {
        md5: String,
    },
    /// Identify an image by its perceptual hash
    Phash {
        phash: String,
    },
    /// Show a pokemon with a line of flavor text
    Pokemon {
        name: String,
    },
    /// Show or update a player's pokedex entry
    Entry {
        /// Discord user id
        discord_id: i64,
        /// Pokemon name
        name: String,
        /// Set the caught flag
        #[arg(long, value_enum)]
        caught: Option<CaughtArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CaughtArg {
    Yes,
    No,
    Unknown,
}

impl From<CaughtArg> for Caught {
    fn from(arg: CaughtArg) -> Self {
        match arg {
            CaughtArg::Yes => Caught::Yes,
            CaughtArg::No => Caught::No,
            CaughtArg::Unknown => Caught::Unknown,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    if let Some(db) = cli.db {
        config.db = db;
    }
    tracing::debug!(config = %cli.config.display(), db = %config.db.display(), "Loaded configuration");

    let open = || Database::open(&config);

    match cli.command {
        Commands::Populate => commands::populate::run(&config)?,
        Commands::Player { discord_id } => commands::player::get(&open()?, discord_id)?,
        Commands::CheckPlayer { discord_id } => commands::player::check(&open()?, discord_id)?,
        Commands::Image { md5 } => commands::lookup::image(&open()?, &md5)?,
        Commands::Phash { phash } => commands::lookup::phash(&open()?, &phash)?,
        Commands::Pokemon { name } => commands::lookup::pokemon(&open()?, &name)?,
        Commands::Entry {
            discord_id,
            name,
            caught,
        } => commands::entry::run(&open()?, discord_id, &name, caught.map(Caught::from))?,
    }

    Ok(())
}
