//! Gateway process entry point: parses configuration, connects to the
//! shared store, and serves the HTTP ingress + admin surface.

use std::sync::Arc;

use callme_gate::config::{self, GatewayConfig};
use callme_gate::dispatcher::JobDispatcher;
use callme_gate::gateway::{self, GatewayState};
use callme_gate::registry::RouteRegistry;
use callme_gate::repository::JobRepository;
use callme_gate::store::RedisStore;
use callme_gate::strategy::RoutingStrategyFactory;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "callme-gateway", about = "HTTP gateway for the callme_gate fabric")]
struct Cli {
    #[command(flatten)]
    gateway: GatewayConfig,

    /// Routing strategy: random, round_robin, least_in_flight, weighted_latency, pinned_version.
    #[arg(long, env = "GATEWAY_STRATEGY", default_value = "random")]
    strategy: String,

    /// Version to pin to when `--strategy pinned_version` is selected.
    #[arg(long, env = "GATEWAY_PINNED_VERSION")]
    pinned_version: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    config::init_tracing();

    let cli = Cli::parse();

    let store = Arc::new(RedisStore::connect(&cli.gateway.store).await?);
    let registry = Arc::new(RouteRegistry::new(store.clone()));
    let repository = Arc::new(JobRepository::new(store.clone(), cli.gateway.job_ttl()));
    let strategy = Arc::from(RoutingStrategyFactory::build(
        &cli.strategy,
        cli.pinned_version.as_deref(),
    )?);
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        registry.clone(),
        repository.clone(),
        strategy,
    ));

    let state = GatewayState {
        registry,
        dispatcher,
        repository,
        config: Arc::new(cli.gateway.clone()),
    };

    tokio::spawn(gateway::run_reaper(state.clone()));

    let bind_addr = cli.gateway.bind_addr;
    let app = gateway::router(state);
    tracing::info!("gateway listening on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
