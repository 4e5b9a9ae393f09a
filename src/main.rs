use clap::Parser;
use pagetrack::api::build_router;
use pagetrack::config::{BusKind, Config};
use pagetrack::messaging::bus::{ChannelBus, MessageBus};
use pagetrack::messaging::dapr::DaprBus;
use pagetrack::pipeline::dispatcher::Dispatcher;
use pagetrack::pipeline::notify::{spawn_event_log, CompletionMonitor};
use pagetrack::pipeline::receiver::CompletionReceiver;
use pagetrack::pipeline::sweeper::spawn_sweeper;
use pagetrack::pipeline::worker::PageWorkerPool;
use pagetrack::splitting::registry::SplitterRegistry;
use pagetrack::tracking::tree::CompletionTree;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    config.validate()?;

    tracing::info!("Starting pagetrack on {} (bus: {:?})", config.bind, config.bus);

    // 1. Completion tracking:
    let tree = CompletionTree::new();
    let monitor = CompletionMonitor::new(tree.clone());
    let receiver = CompletionReceiver::new(monitor.clone());

    // 2. Messaging:
    let bus: Arc<dyn MessageBus> = match config.bus {
        BusKind::Local => {
            let (bus, items) = ChannelBus::new(config.queue_capacity);
            let pool = PageWorkerPool::new(items, receiver.clone(), config.worker_settings());
            pool.start();
            Arc::new(bus)
        }
        BusKind::Dapr => {
            tracing::info!(
                "Publishing to {}/{} via {}",
                config.pubsub_name,
                config.topic,
                config.dapr_url
            );
            Arc::new(DaprBus::new(&config.dapr_url, &config.pubsub_name, &config.topic))
        }
    };

    let splitters = SplitterRegistry::with_defaults();
    tracing::info!("Supported formats: {:?}", splitters.list_formats());
    let dispatcher = Dispatcher::new(monitor.clone(), splitters, bus);

    // 3. Retention sweeper:
    spawn_sweeper(tree.clone(), config.retention());

    // 4. Completion event log:
    spawn_event_log(&monitor);

    // 5. HTTP server:
    let app = build_router(dispatcher, receiver, monitor, config.max_upload_bytes);

    tracing::info!("HTTP server listening on {}", config.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
