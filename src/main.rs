use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;

use braid_engine::{
    spawn_worker, LineageService, MessageService, ReplyEngine, TaskQueue, ThreadService,
    TitleGenerator,
};
use braid_gateway::HttpGateway;
use braid_server::{AppState, ServerConfig, StaticTokenResolver};
use braid_store::objects::MemoryObjectStore;
use braid_store::Database;
use braid_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "braid", about = "Chat thread backend with streaming AI replies")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 9280)]
    port: u16,

    /// Database file path. Defaults to ~/.braid/braid.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Model gateway base URL.
    #[arg(long, env = "BRAID_GATEWAY_URL", default_value = "https://gateway.braid.dev")]
    gateway_url: String,

    /// Emit JSON-formatted logs.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_telemetry(TelemetryConfig {
        json_output: args.json_logs,
        ..TelemetryConfig::default()
    });

    tracing::info!("starting braid server");

    let db_path = args.db.unwrap_or_else(|| dirs_home().join(".braid").join("braid.db"));
    let db = Database::open(&db_path).expect("failed to open database");

    let api_key = std::env::var("BRAID_GATEWAY_API_KEY")
        .ok()
        .map(SecretString::from);
    let gateway = Arc::new(
        HttpGateway::new(args.gateway_url, api_key).expect("failed to build gateway client"),
    );
    let objects = Arc::new(MemoryObjectStore::default());

    // Deferred-task pipeline: reply and title generation run decoupled from
    // the requests that enqueue them.
    let (queue, rx) = TaskQueue::new();
    let reply = Arc::new(ReplyEngine::new(gateway.clone(), objects.clone(), db.clone()));
    let titler = Arc::new(TitleGenerator::new(gateway, db.clone()));
    let _worker = spawn_worker(rx, reply, titler);

    // BRAID_TOKENS="token1:user1,token2:user2"
    let resolver = StaticTokenResolver::new(
        std::env::var("BRAID_TOKENS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|pair| {
                let (token, user) = pair.split_once(':')?;
                Some((token.to_string(), user.to_string()))
            })
            .collect::<Vec<_>>(),
    );

    let state = AppState {
        threads: Arc::new(ThreadService::new(db.clone())),
        messages: Arc::new(MessageService::new(db.clone(), queue)),
        lineage: Arc::new(LineageService::new(db)),
        objects,
        resolver: Arc::new(resolver),
    };

    let handle = braid_server::start(ServerConfig { port: args.port }, state)
        .await
        .expect("failed to start server");

    tracing::info!(port = handle.port, "braid server ready");

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");

    tracing::info!("shutting down");
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
