use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use curvecast::{
    BlockTimestampCache, ConnectionManager, EventDispatcher, Monitor, RedpandaPublisher,
    RpcChainReader, Settings, TokenRegistry, WsConnector,
};

/// Which task ended the select loop.
enum Exit {
    Signal,
    Manager(Result<anyhow::Result<()>, JoinError>),
    Monitor(Result<anyhow::Result<()>, JoinError>),
}

fn flatten(result: Result<anyhow::Result<()>, JoinError>) -> anyhow::Result<()> {
    result.map_err(anyhow::Error::from).and_then(|inner| inner)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    // Bus publisher (optional: the monitor runs log-only without it)
    let publisher = settings
        .redpanda
        .as_ref()
        .and_then(RedpandaPublisher::new)
        .map(Arc::new);

    if let Some(publisher) = &publisher {
        if let Err(e) = publisher.ensure_topics().await {
            warn!("Topic bootstrap failed, continuing: {:#}", e);
        }
    }

    // Shared enrichment services
    let reader =
        Arc::new(RpcChainReader::new(&settings.node).context("Failed to create chain reader")?);
    let blocks = Arc::new(BlockTimestampCache::new(&settings.cache));
    let registry = Arc::new(TokenRegistry::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        reader,
        blocks.clone(),
        registry,
        publisher.clone(),
    ));

    // Streaming session: connect before spawning anything so a bad
    // endpoint fails fast at startup
    let connection = Arc::new(ConnectionManager::new(
        WsConnector::new(&settings.node),
        settings.connection.clone(),
    ));
    connection
        .connect()
        .await
        .context("Initial chain node connection failed")?;

    let monitor = Arc::new(
        Monitor::new(connection.clone(), dispatcher, &settings.monitor)
            .context("Invalid monitor configuration")?,
    );

    let cancellation_token = CancellationToken::new();

    let manager_token = cancellation_token.child_token();
    let manager = connection.clone();
    let mut manager_handle = tokio::spawn(async move { manager.run(manager_token).await });

    let monitor_token = cancellation_token.child_token();
    let monitor_task = monitor.clone();
    let mut monitor_handle = tokio::spawn(async move { monitor_task.run(monitor_token).await });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Monitor running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    let exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            Exit::Signal
        },
        _ = sigterm_stream.recv() => {
            info!("Received SIGTERM, exiting gracefully...");
            Exit::Signal
        },
        res = &mut manager_handle => Exit::Manager(res),
        res = &mut monitor_handle => Exit::Monitor(res),
    };

    #[cfg(not(unix))]
    let exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            Exit::Signal
        },
        res = &mut manager_handle => Exit::Manager(res),
        res = &mut monitor_handle => Exit::Monitor(res),
    };

    // Cancel all running tasks
    info!("Finishing all tasks...");
    cancellation_token.cancel();

    let result = match exit {
        Exit::Signal => {
            let _ = manager_handle.await;
            let _ = monitor_handle.await;
            Ok(())
        },
        Exit::Manager(res) => {
            let _ = monitor_handle.await;
            flatten(res).context("Connection manager failed")
        },
        Exit::Monitor(res) => {
            let _ = manager_handle.await;
            flatten(res).context("Monitor failed")
        },
    };

    // Drop cached state and drain the producer queue
    blocks.clear();
    if let Some(publisher) = &publisher {
        publisher.flush();
    }

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        },
        Err(e) => {
            error!("Fatal: {:#}", e);
            Err(e)
        },
    }
}
