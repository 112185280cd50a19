//! facetrack CLI - inspect and maintain a face gallery.

use clap::{Parser, Subcommand};

mod commands;

use commands::{EnrollArgs, MatchArgs, PruneArgs};

/// facetrack - inspect and maintain a face gallery.
///
/// Embeddings are read from JSON files holding a single array of numbers,
/// as produced by an external embedder.
#[derive(Parser)]
#[command(name = "facetrack")]
#[command(about = "Face gallery maintenance tool")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Gallery file (overrides config file)
    #[arg(short = 'g', long, global = true)]
    pub gallery: Option<String>,

    /// Embedding backend: deep_learning or classical (overrides config file)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Output as JSON (default: YAML)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List identities and their embedding counts
    List,
    /// Match an embedding against the gallery
    Match(MatchArgs),
    /// Enroll an embedding under a name
    Enroll(EnrollArgs),
    /// Keep only the most central embeddings of each identity
    Prune(PruneArgs),
    /// Fit the projection and report its shape
    Retrain,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::List => commands::list(&cli),
        Commands::Match(args) => args.run(&cli),
        Commands::Enroll(args) => args.run(&cli),
        Commands::Prune(args) => args.run(&cli),
        Commands::Retrain => commands::retrain(&cli),
    }
}
