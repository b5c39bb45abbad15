use std::net::TcpListener;
use std::thread;

use axum::Router;
use camino::Utf8PathBuf;
use console::style;
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Serves `root` on an already bound listener from a dedicated thread.
pub fn start(listener: TcpListener, root: Utf8PathBuf) -> thread::JoinHandle<anyhow::Result<()>> {
    if let Ok(address) = listener.local_addr() {
        info!(url = %style(format!("http://localhost:{}/", address.port())).yellow(), "starting a HTTP server");
    }

    thread::spawn(move || {
        let result = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(serve(listener, root));

        if let Err(e) = &result {
            error!("HTTP server stopped: {e}");
        }

        result
    })
}

async fn serve(listener: TcpListener, root: Utf8PathBuf) -> anyhow::Result<()> {
    listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(listener)?;

    let router = Router::new()
        // development output root
        .fallback_service(ServeDir::new(root));

    axum::serve(listener, router).await?;

    Ok(())
}
