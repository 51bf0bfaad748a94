//! The canvas server.

use crate::config::ServerConfig;
use crate::connection::serve_connection;
use crate::error::ServerResult;
use crate::handler::{CommandDispatcher, HandlerContext};
use place_storage::{
    FilePlacementStore, InMemoryPlacementStore, LocalDirectory, PlacementStore, UserDirectory,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// A bound canvas server.
///
/// # Example
///
/// ```no_run
/// use place_server::{PlaceServer, ServerConfig};
///
/// # async fn run() -> place_server::ServerResult<()> {
/// let config = ServerConfig::default().with_auth_secret(b"change me".to_vec());
/// let server = PlaceServer::bind(config).await?;
/// println!("listening on {}", server.local_addr()?);
/// server.run().await
/// # }
/// ```
pub struct PlaceServer {
    listener: TcpListener,
    dispatcher: CommandDispatcher,
}

impl PlaceServer {
    /// Opens the configured storage and binds the listener.
    ///
    /// Placements go to a [`FilePlacementStore`] when `data_dir` is set and
    /// stay in memory otherwise; users likewise with `users_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, storage cannot be
    /// opened, or the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let store: Arc<dyn PlacementStore> = match &config.data_dir {
            Some(dir) => Arc::new(FilePlacementStore::open(dir)?),
            None => Arc::new(InMemoryPlacementStore::new()),
        };
        let directory: Arc<dyn UserDirectory> = match &config.users_file {
            Some(path) => Arc::new(LocalDirectory::open(path)?),
            None => Arc::new(LocalDirectory::in_memory()),
        };
        Self::bind_with(config, store, directory).await
    }

    /// Binds the listener over caller-provided storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn bind_with(
        config: ServerConfig,
        store: Arc<dyn PlacementStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> ServerResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        let context = Arc::new(HandlerContext::new(config, store, directory));
        Ok(Self {
            listener,
            dispatcher: CommandDispatcher::new(context),
        })
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared server state.
    pub fn context(&self) -> &Arc<HandlerContext> {
        self.dispatcher.context()
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    ///
    /// See [`PlaceServer::run_until`].
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Connections already open keep running on their own tasks.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and the
    /// loop continues.
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.listener.local_addr()?;
        let config = &self.dispatcher.context().config;
        info!(
            %addr,
            width = config.canvas.width,
            height = config.canvas.height,
            cooldown = config.cooldown_secs,
            "canvas server listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let dispatcher = self.dispatcher.clone();
                        tokio::spawn(async move {
                            // Failures are logged by the connection itself
                            let _ = serve_connection(stream, peer, dispatcher).await;
                        });
                    }
                    Err(err) => error!(error = %err, "accept failed"),
                },
                () = &mut shutdown => {
                    info!("canvas server shutting down");
                    break;
                }
            }
        }
        Ok(())
    }
}
