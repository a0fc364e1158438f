//! HTTP server module

mod routes;
mod state;

pub use state::AppState;
use routes::create_router;

use anyhow::Result;
use finchat::{Config, RetrievalChain};
use std::sync::Arc;
use tracing::info;

/// Run the HTTP server
pub async fn run_server(config: Config, token: Option<String>, port: u16) -> Result<()> {
    println!("Loading models...");
    let chain = RetrievalChain::load(&config, token.as_deref(), true).await?;
    info!(
        embedder = chain.embedder_name(),
        generator = chain.generator_name(),
        store = chain.store_name(),
        status = chain.status().as_str(),
        "chain ready"
    );

    let state = Arc::new(AppState::new(chain, config));
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            eprintln!("\n\x1b[31mError:\x1b[0m Port {} is already in use.\n", port);
            eprintln!("Try a different port with:");
            eprintln!("  \x1b[36mfinchat serve --port <PORT>\x1b[0m\n");
            eprintln!("Example:");
            eprintln!("  finchat serve --port 8006");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Server running on http://localhost:{}", port);
    println!("\nAPI Endpoints:");
    println!("  GET    /health         - Health check");
    println!("  GET    /api/status     - Session status and loaded models");
    println!("  POST   /api/login      - Validate (and optionally save) a Hugging Face token");
    println!("  POST   /api/upload     - Stage base64-encoded PDFs");
    println!("  POST   /api/process    - Build the index from the staged PDFs");
    println!("  POST   /api/ask        - Ask a question about the indexed PDFs");
    println!("  GET    /api/history    - Questions and answers so far");
    println!("  DELETE /api/session    - Clear index, history and uploads");

    axum::serve(listener, app).await?;
    Ok(())
}
