//! foodgram-edge: the edge router for the Foodgram deployment.
//!
//! Serves the built frontend bundle and collected static assets from disk,
//! forwards `/api/` and `/admin/` to the application backend with rewritten
//! `Host` / `X-Real-IP` headers, and answers deep links into the SPA with
//! its entry point. The route table is loaded once at startup and is
//! immutable for the life of the process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod routing;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by the workers setting when present
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;

    logger::log_server_start(&addr, &cfg);

    let config = Arc::new(cfg);
    let connections = Arc::new(AtomicUsize::new(0));

    let shutdown = Arc::new(server::signal::ShutdownSignal::new());
    server::signal::start_signal_handler(Arc::clone(&shutdown));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        server::accept_connection(stream, peer_addr, &config, &connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notify.notified() => {
                logger::log_shutdown_started();
                break;
            }
        }
    }

    // Stop accepting; spawned connections drain on their own timeouts
    drop(listener);
    wait_for_drain(&connections).await;
    logger::log_shutdown_complete();

    Ok(())
}

/// Wait briefly for in-flight connections to finish.
///
/// Bounded at 10 seconds: per-connection timeouts already cap how long a
/// request can run, this just avoids cutting off the common fast cases.
async fn wait_for_drain(connections: &Arc<AtomicUsize>) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
    while connections.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
