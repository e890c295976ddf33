//! `CrownQuestServer` builder and server loop.
//!
//! This is the entry point for running the relay. It ties together all
//! the layers: transport → protocol → session → room, plus the HTTP side
//! that serves grids and map images.

use std::net::SocketAddr;
use std::sync::Arc;

use crownquest_protocol::JsonCodec;
use crownquest_room::{RoomConfig, RoomManager};
use crownquest_session::{SessionConfig, SessionManager};
use crownquest_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::http::router;
use crate::tools::{CommandGridGenerator, CommandMapRenderer, GridGenerator, MapRenderer};
use crate::{CrownQuestError, ServerConfig};

/// Shared server state passed to each connection handler task and to the
/// HTTP routes.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
pub(crate) struct ServerState<G, M> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) codec: JsonCodec,
    pub(crate) grid_generator: G,
    pub(crate) map_renderer: M,
    pub(crate) config: ServerConfig,
}

impl<G: GridGenerator, M: MapRenderer> ServerState<G, M> {
    pub(crate) fn new(
        config: ServerConfig,
        session_config: SessionConfig,
        room_config: RoomConfig,
        grid_generator: G,
        map_renderer: M,
    ) -> Self {
        Self {
            sessions: Mutex::new(SessionManager::new(session_config)),
            rooms: Mutex::new(RoomManager::new(room_config)),
            codec: JsonCodec,
            grid_generator,
            map_renderer,
            config,
        }
    }
}

/// Builder for configuring and starting a Crown Quest server.
///
/// # Example
///
/// ```rust,ignore
/// use crownquest::prelude::*;
///
/// let server = CrownQuestServer::builder()
///     .bind("0.0.0.0:3000")
///     .http_bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct CrownQuestServerBuilder<G = CommandGridGenerator, M = CommandMapRenderer> {
    config: ServerConfig,
    session_config: SessionConfig,
    room_config: RoomConfig,
    grid_generator: G,
    map_renderer: M,
}

impl CrownQuestServerBuilder {
    /// Creates a builder with default settings and the command-backed tools.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Creates a builder whose tools run the commands named in `config`.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            grid_generator: CommandGridGenerator::new(config.grid_command.clone()),
            map_renderer: CommandMapRenderer::new(config.map_command.clone()),
            config,
            session_config: SessionConfig::default(),
            room_config: RoomConfig::default(),
        }
    }
}

impl Default for CrownQuestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: GridGenerator, M: MapRenderer> CrownQuestServerBuilder<G, M> {
    /// Sets the WebSocket bind address.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.ws_addr = addr.to_string();
        self
    }

    /// Sets the HTTP bind address.
    pub fn http_bind(mut self, addr: &str) -> Self {
        self.config.http_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Replaces the grid generator.
    pub fn grid_generator<G2: GridGenerator>(self, grid_generator: G2) -> CrownQuestServerBuilder<G2, M> {
        CrownQuestServerBuilder {
            config: self.config,
            session_config: self.session_config,
            room_config: self.room_config,
            grid_generator,
            map_renderer: self.map_renderer,
        }
    }

    /// Replaces the map renderer.
    pub fn map_renderer<M2: MapRenderer>(self, map_renderer: M2) -> CrownQuestServerBuilder<G, M2> {
        CrownQuestServerBuilder {
            config: self.config,
            session_config: self.session_config,
            room_config: self.room_config,
            grid_generator: self.grid_generator,
            map_renderer,
        }
    }

    /// Binds both listeners.
    pub async fn build(self) -> Result<CrownQuestServer<G, M>, CrownQuestError> {
        let transport = WebSocketTransport::bind(&self.config.ws_addr).await?;
        let http = TcpListener::bind(&self.config.http_addr)
            .await
            .map_err(CrownQuestError::Http)?;
        tracing::info!(addr = %self.config.http_addr, "HTTP listening");

        let state = Arc::new(ServerState::new(
            self.config,
            self.session_config,
            self.room_config,
            self.grid_generator,
            self.map_renderer,
        ));

        Ok(CrownQuestServer { transport, http, state })
    }
}

/// A bound Crown Quest server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CrownQuestServer<G = CommandGridGenerator, M = CommandMapRenderer> {
    transport: WebSocketTransport,
    http: TcpListener,
    state: Arc<ServerState<G, M>>,
}

impl CrownQuestServer {
    /// Creates a new builder.
    pub fn builder() -> CrownQuestServerBuilder {
        CrownQuestServerBuilder::new()
    }
}

impl<G: GridGenerator, M: MapRenderer> CrownQuestServer<G, M> {
    /// Address of the WebSocket listener.
    pub fn local_addr(&self) -> Result<SocketAddr, CrownQuestError> {
        Ok(self.transport.local_addr()?)
    }

    /// Address of the HTTP listener.
    pub fn http_addr(&self) -> Result<SocketAddr, CrownQuestError> {
        self.http.local_addr().map_err(CrownQuestError::Http)
    }

    /// Serves HTTP in the background and runs the WebSocket accept loop.
    ///
    /// Spawns a handler task for each connection. Runs until the process
    /// is terminated.
    pub async fn run(mut self) -> Result<(), CrownQuestError> {
        let app = router(Arc::clone(&self.state));
        let http = self.http;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http, app).await {
                tracing::error!(error = %e, "HTTP server stopped");
            }
        });

        tracing::info!("Crown Quest server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
