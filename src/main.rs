use std::{env, fs::File, path::Path};

use prepaid_ledger::{
    Config, InMemoryStore, LedgerService, dlq::TracingDLQ, engine::Engine, ingestion::CsvReader,
};

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = env::args().skip(1);
    let file_path = args
        .next()
        .ok_or("usage: prepaid_ledger <commands.csv> [config.toml]")?;
    let config = match args.next() {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };

    // Set up the components
    let store = InMemoryStore::new(config.lock_timeout());
    let ledger = LedgerService::new(store, &config);
    ledger.seed_merchants(&config.merchants).await?;

    let file = File::open(Path::new(&file_path))?;
    let ingestion = CsvReader::new(file)?;

    let mut engine = Engine::new(ingestion, ledger, TracingDLQ::default());
    engine.process().await?;

    tracing::info!(rejected = engine.dlq().rejected(), "replay finished");
    engine.flush(std::io::stdout().lock()).await?;

    Ok(())
}
