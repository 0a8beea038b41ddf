use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

mod db;
mod domain;
mod error;
mod render;
mod report;
mod rest;
mod validation;

use domain::MarkService;
use render::PdfRenderer;
use report::ScorecardReporter;
use rest::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Setting up database");
    let db = db::DbConnection::init().await?;

    let state = AppState::new(
        MarkService::new(db.clone()),
        ScorecardReporter::new(db),
        Arc::new(PdfRenderer),
    );

    // CORS setup to allow the browser frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", rest::api_routes())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = std::env::var("MARKS_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
