//! HTTP surface for triggering collections and reading the collected history.

#[macro_use]
extern crate tracing;

mod collection;
pub mod error;
mod exports;
pub mod router;

use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
};
use tokio::net::TcpListener;
use unsplash_stats_collector::CollectionWorker;

/// Serves the API on `address` until Ctrl-C.
pub async fn serve(address: SocketAddr, worker: Arc<CollectionWorker>, database: PathBuf) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router::create_router(worker, database))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C, serving until killed: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
