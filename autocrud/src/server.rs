use axum::Router;
use tokio::net::TcpListener;

use crate::config::HttpConfig;

/// Binds `config.addr` and serves `router` until the process stops.
///
/// # Errors
///
/// Fails when the address cannot be bound or the server stops with an I/O
/// error.
pub async fn serve(config: &HttpConfig, router: Router) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await
}
