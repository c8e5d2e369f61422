mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldtrace", about = "Field boundary extraction from satellite imagery")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pipeline stages and their parameters
    Stages(commands::stages::StagesArgs),
    /// Locate a coordinate inside a raster
    Project(commands::project::ProjectArgs),
    /// Print the map view, bounds and selection ring as JSON
    Map(commands::map::MapArgs),
    /// Print or save the default workflow config
    Config(commands::config::ConfigArgs),
    /// Run the pipeline against a processing service
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Stages(args) => commands::stages::run(args),
        Commands::Project(args) => commands::project::run(args),
        Commands::Map(args) => commands::map::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
