//! REST API implementation
//!
//! Registration, gas price and stats endpoints for the landing page.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::create_router;

use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{Error, Result};

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve until the process exits
    pub async fn serve(self, addr: &str) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state)
            .layer(TraceLayer::new_for_http())
            .layer(cors);

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(%addr, error = %e, "Failed to bind HTTP listener");
            Error::Io(e)
        })?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
