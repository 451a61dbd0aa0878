//! CLI frontend for the Pathweaver content loader.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pw",
    about = "Pathweaver - load, order and inspect game content packages",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log more (-v for info, -vv for debug); PW_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate every package, then print what was built
    Build {
        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Stop at the first document that fails to parse
        #[arg(long)]
        strict: bool,
    },

    /// Load and validate without printing the world
    Check {
        /// Content directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Show the order packages are applied in
    Order {
        /// Content directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// List placeholders still standing in for missing content
    Skeletons {
        /// Content directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Find an entity by categorical filter instead of by ID
    Find {
        /// Entity kind: location, npc or route
        kind: String,

        /// Only consider entities inside this venue
        #[arg(long)]
        venue: Option<String>,

        /// Location type (locations)
        #[arg(long = "type")]
        location_type: Vec<String>,

        /// Required location property
        #[arg(long)]
        property: Vec<String>,

        /// Profession (characters)
        #[arg(long)]
        profession: Vec<String>,

        /// Personality (characters)
        #[arg(long)]
        personality: Vec<String>,

        /// Tie-break: first, closest, highest_bond, least_recent
        #[arg(long, default_value = "first")]
        strategy: String,

        /// Content directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Export the loaded world as JSON
    Export {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Content directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("PW_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Build { dir, strict } => commands::build::run(&dir, strict),
        Commands::Check { dir } => commands::check::run(&dir),
        Commands::Order { dir } => commands::order::run(&dir),
        Commands::Skeletons { dir } => commands::skeletons::run(&dir),
        Commands::Find {
            kind,
            venue,
            location_type,
            property,
            profession,
            personality,
            strategy,
            dir,
        } => commands::find::run(
            &dir,
            &kind,
            &commands::find::FindArgs {
                venue,
                location_types: location_type,
                properties: property,
                professions: profession,
                personalities: personality,
                strategy,
            },
        ),
        Commands::Export { output, dir } => commands::export::run(&dir, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
