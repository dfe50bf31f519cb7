//! Gateway run loop

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::errors::AgentError;
use crate::scheduler::{Scheduler, SchedulerClient};
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the site agent gateway until `shutdown_signal` resolves.
///
/// `bound` receives the address the gateway listens on once it is up.
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
    bound: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), AgentError> {
    info!("Initializing site agent for site {}...", options.site_name);
    options.validate()?;

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let addr = match init(&options, &mut shutdown_manager, shutdown_tx.subscribe()).await {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to start site agent: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };
    if let Some(bound) = bound {
        let _ = bound.send(addr);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<SocketAddr, AgentError> {
    let scheduler: Arc<dyn Scheduler> = Arc::new(SchedulerClient::new(&options.scheduler)?);
    info!("Forwarding to scheduler at {}", options.scheduler.url);

    let server_state = ServerState::new(options.site_name.clone(), scheduler);

    let (addr, server_handle) = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(addr)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    socket_server_handle: Option<JoinHandle<Result<(), AgentError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            socket_server_handle: None,
        }
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), AgentError>>,
    ) -> Result<(), AgentError> {
        if self.socket_server_handle.is_some() {
            return Err(AgentError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                );
                if let Some(handle) = self.socket_server_handle.take() {
                    handle.abort();
                }
                Err(AgentError::ShutdownError(format!(
                    "shutdown timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), AgentError> {
        info!("Shutting down site agent...");

        if let Some(handle) = self.socket_server_handle.as_mut() {
            handle
                .await
                .map_err(|e| AgentError::ShutdownError(e.to_string()))??;
            self.socket_server_handle = None;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
