//! Demo worker: registers a single echo route and hands every request's
//! JSON body straight back. Mirrors the toy worker used to exercise the
//! gateway end to end (`simple_worker.py` in the original implementation).

use std::sync::Arc;

use callme_gate::config::{self, WorkerConfig};
use callme_gate::registry::RouteRegistry;
use callme_gate::repository::JobRepository;
use callme_gate::store::RedisStore;
use callme_gate::worker::{HandlerResponse, WorkerBuilder};
use clap::Parser;
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "callme-worker-echo", about = "Demo worker that echoes its request body")]
struct Cli {
    #[command(flatten)]
    worker: WorkerConfig,

    /// Worker id. Generated if omitted.
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    config::init_tracing();

    let cli = Cli::parse();
    let worker_id = cli
        .worker_id
        .unwrap_or_else(|| format!("echo-{}", &Uuid::new_v4().to_string()[..8]));
    let version = cli
        .worker
        .version
        .clone()
        .unwrap_or_else(|| format!("worker-{}", &Uuid::new_v4().to_string()[..8]));

    let store = Arc::new(RedisStore::connect(&cli.worker.store).await?);
    let registry = Arc::new(RouteRegistry::new(store.clone()));
    let repository = Arc::new(JobRepository::new(store.clone(), std::time::Duration::from_secs(60)));

    let runtime = WorkerBuilder::new(
        worker_id.clone(),
        version,
        store,
        registry,
        repository,
        cli.worker.heartbeat_interval(),
    )
    .add_handler("POST", "/api/test/echo", 5, |job| {
        let body = job.json_data.clone().unwrap_or(serde_json::Value::Null);
        Ok(HandlerResponse::json(200, body))
    })
    .build()
    .await?;

    tracing::info!("worker {worker_id} serving /api/test/echo");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    runtime.run(shutdown_rx).await?;
    Ok(())
}
