use std::path::PathBuf;
use std::sync::Arc;

use envconfig::Envconfig;
use tokio::signal;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use cep_lookup::config::{Config, ServiceMode};
use cep_lookup::dne::importer::Importer;
use cep_lookup::server::serve;
use cep_lookup::store::addresses::AddressStore;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
}

async fn run_import(config: Config) {
    let store = match AddressStore::open(&config.db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(%err, path = %config.db_path, "failed to open address store");
            std::process::exit(1);
        }
    };

    let mut importer = Importer::new(store)
        .with_batch_sizes(config.street_batch_size, config.batch_size);
    let dne_path = PathBuf::from(&config.dne_path);

    // The import is synchronous by design; keep it off the async workers.
    let summary = tokio::task::spawn_blocking(move || importer.populate(&dne_path))
        .await
        .expect("import task panicked");

    tracing::info!(
        unique_ceps = summary.unique_ceps,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "import finished"
    );
}

#[tokio::main]
async fn main() {
    let config = Config::init_from_env().expect("Invalid configuration:");

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(mode = config.mode.as_tag(), "starting cep-lookup");

    match config.mode {
        ServiceMode::Import => run_import(config).await,
        ServiceMode::Serve => {
            let listener = tokio::net::TcpListener::bind(config.address)
                .await
                .expect("could not bind port");
            serve(config, listener, shutdown()).await;
        }
    }
}
