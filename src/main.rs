//! CLI for PopFeed
//!
//! Subcommands:
//! - `serve`: run the WebSocket server and the broadcast scheduler
//! - `client`: run a simple client (useful for smoke tests)

use std::sync::Arc;

use clap::Parser;
use popfeed::catalog::Catalog;
use popfeed::config::load_config;
use popfeed::feed::CursorService;
use popfeed::registry::SubscriptionRegistry;
use popfeed::scheduler::BroadcastScheduler;
use popfeed::transport::{FeedState, Hub, start_websocket_server};
use popfeed::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "popfeed")]
enum Command {
    /// Start the WebSocket server and the broadcast scheduler
    Serve,
    /// Run the example client (connects, lists topics, subscribes, pages, waits for pushes)
    Client {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Topic to subscribe to
        #[arg(long, default_value = "tech")]
        topic: String,
        /// Number of pushes to wait for before exiting
        #[arg(long, default_value_t = 3)]
        pushes: usize,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = Command::parse();

    match cmd {
        Command::Serve => {
            if let Err(e) = run_server().await {
                error!("Server failed: {}", e);
            }
        }
        Command::Client { url, topic, pushes } => {
            logging::init("info");
            if let Err(e) = run_client(&url, &topic, pushes).await {
                error!("Client failed: {}", e);
            }
        }
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&config.log.level);

    let catalog = Arc::new(Catalog::load_or_empty(&config.catalog.path));
    let registry = Arc::new(SubscriptionRegistry::new());
    let feed = Arc::new(CursorService::new(catalog));
    let hub = Arc::new(Hub::new());

    let scheduler = BroadcastScheduler::builder(registry.clone(), feed.clone(), hub.clone())
        .settings(config.scheduler.clone())
        .build();
    let state = FeedState {
        registry,
        feed,
        hub,
        page_size: config.feed.page_size,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    scheduler.start();

    let result: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        res = start_websocket_server(&addr, state) => {
            error!("WebSocket server exited unexpectedly.");
            res.map_err(Into::into)
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    };

    scheduler.stop().await;
    result
}

async fn run_client(url: &str, topic: &str, pushes: usize) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    let requests = [
        json!({ "type": "topics" }),
        json!({ "type": "subscribe", "topic": topic }),
        json!({ "type": "next_batch", "topic": topic }),
    ];
    for request in requests {
        ws_stream
            .send(WsMessage::Text(request.to_string().into()))
            .await?;
    }

    let mut received = 0;
    while received < pushes {
        let Some(frame) = ws_stream.next().await else {
            break;
        };
        if let WsMessage::Text(text) = frame? {
            let value: serde_json::Value = serde_json::from_str(&text)?;
            if value["type"] == "push" {
                received += 1;
            }
            println!("{value}");
        }
    }

    ws_stream.close(None).await?;
    Ok(())
}
