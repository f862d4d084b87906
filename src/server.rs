//! TCP listener of the controlled station.
//!
//! Every accepted connection gets its own [`Session`]; sessions share the
//! point registry and the station clock through the [`AsduHandler`] and
//! nothing else, so a failing connection never disturbs the others.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::StationClock;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::handler::AsduHandler;
use crate::points::PointRegistry;
use crate::session::Session;

/// IEC 104 controlled station server.
///
/// # Example
///
/// ```rust,ignore
/// let registry = PointRegistry::new(default_catalog())?;
/// let server = Iec104Server::bind(ServerConfig::default(), registry).await?;
///
/// let shutdown = CancellationToken::new();
/// server.run(shutdown.clone()).await?;
/// ```
pub struct Iec104Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    handler: Arc<AsduHandler>,
}

impl Iec104Server {
    /// Validate `config` and bind the listener.
    pub async fn bind(config: ServerConfig, registry: PointRegistry) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_address).await?;

        let handler = Arc::new(AsduHandler::new(
            Arc::new(registry),
            Arc::new(StationClock::new()),
            &config,
        ));

        info!(
            address = %listener.local_addr()?,
            common_address = config.common_address,
            points = handler.registry().len(),
            "IEC 104 server listening"
        );

        Ok(Self {
            listener,
            config: Arc::new(config),
            handler,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared application handler.
    pub fn handler(&self) -> &Arc<AsduHandler> {
        &self.handler
    }

    /// Accept connections until `shutdown` is cancelled, then close every
    /// session and wait for them.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "Connection accepted");
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
                        }
                        match Session::new(
                            stream,
                            peer.to_string(),
                            self.handler.clone(),
                            self.config.clone(),
                        ) {
                            Ok(session) => {
                                sessions.spawn(session.run(shutdown.child_token()));
                            }
                            Err(e) => warn!(%peer, "Session rejected: {}", e),
                        }
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                Some(finished) = sessions.join_next() => {
                    if let Err(e) = finished {
                        warn!("Session task failed: {}", e);
                    }
                }
            }
        }

        info!(sessions = sessions.len(), "Shutting down");
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                warn!("Session task failed: {}", e);
            }
        }
        Ok(())
    }
}
