//! HTTP API server for the speaking gateway

pub mod conversation;
pub mod health;
pub mod voice;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::{SessionConfig, TurnConfig};
use crate::voice::Gateways;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub gateways: Gateways,
    pub turn: TurnConfig,
    pub session: SessionConfig,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    gateways: Gateways,
    port: u16,
    session: SessionConfig,
    turn: TurnConfig,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(gateways: Gateways, port: u16) -> Self {
        Self {
            gateways,
            port,
            session: SessionConfig::default(),
            turn: TurnConfig::default(),
        }
    }

    /// Set conversation session limits
    #[must_use]
    pub fn session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set turn processing rules
    #[must_use]
    pub fn turn_config(mut self, turn: TurnConfig) -> Self {
        self.turn = turn;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                gateways: self.gateways,
                turn: self.turn,
                session: self.session,
            }),
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/voice", voice::router(self.state.clone()))
            .nest("/ws", conversation::router(self.state.clone()))
            .merge(health::router());

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server stops with an I/O failure
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(
            addr = %local,
            session_timeout = ?self.state.session.timeout,
            "speaking gateway listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Transport(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
