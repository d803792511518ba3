use crate::server;
use clap::{Args, Parser, Subcommand};
use scoring::config::AppConfig;
use scoring::error::AppError;
use scoring::store::Store;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Scoring API",
    about = "Serve online scores and client interests over HTTP/JSON",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write the demo client interests into the configured store
    SeedInterests,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(short, long)]
    pub(crate) port: Option<u16>,
    /// Append logs to this file instead of stdout
    #[arg(short, long)]
    pub(crate) log: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::SeedInterests => seed_interests().await,
    }
}

async fn seed_interests() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = Store::connect(&config.store).await?;
    let total = store.seed_interests().await?;
    println!("seeded interests for {total} clients");
    Ok(())
}
