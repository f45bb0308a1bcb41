//! QUIC server hosting one storage driver behind the session protocol.
//!
//! The server's lifecycle has three phases: binding (fatal on failure),
//! serving (accept loop, one task per connection and per stream), and
//! termination, which force-closes every outstanding session before the
//! endpoint shuts down so no server-side resources leak.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicServerConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, instrument, warn};

use crate::driver::StorageDriver;
use crate::error::StorError;
use crate::message::StorMessage;
use crate::session::{Session, SessionTable};
use crate::types::VolumesRequest;

use super::MAX_MESSAGE_BYTES;

/// A server that accepts QUIC connections and dispatches [`StorMessage`]
/// requests against one [`StorageDriver`].
pub struct StorServer {
    endpoint: quinn::Endpoint,
    state: Arc<ServerState>,
}

struct ServerState {
    driver: Arc<dyn StorageDriver>,
    sessions: SessionTable,
}

impl StorServer {
    /// Bind a new server to `addr`.
    ///
    /// Failures here are fatal startup errors: the process has nothing to
    /// serve without an endpoint.
    pub fn bind(
        addr: SocketAddr,
        tls_config: rustls::ServerConfig,
        driver: Arc<dyn StorageDriver>,
    ) -> Result<Self, StorError> {
        let quic_server_config = QuicServerConfig::try_from(tls_config)
            .map_err(|e| StorError::Transport(format!("invalid TLS config: {e}")))?;
        let server_config = quinn::ServerConfig::with_crypto(Arc::new(quic_server_config));
        let endpoint = quinn::Endpoint::server(server_config, addr)
            .map_err(|e| StorError::Transport(format!("bind {addr}: {e}")))?;
        info!(%addr, driver = driver.name(), "storage server listening");
        Ok(Self {
            endpoint,
            state: Arc::new(ServerState {
                driver,
                sessions: SessionTable::new(),
            }),
        })
    }

    /// Address the endpoint is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, StorError> {
        self.endpoint.local_addr().map_err(StorError::transport)
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.state.sessions.len()
    }

    /// Accept connections in a loop until the endpoint is closed.
    ///
    /// Each accepted connection spawns a Tokio task, and each bi-stream
    /// within a connection is handled concurrently.
    pub async fn serve(&self) -> Result<(), StorError> {
        while let Some(incoming) = self.endpoint.accept().await {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                match incoming.await {
                    Ok(conn) => {
                        let remote = conn.remote_address();
                        debug!(%remote, "connection accepted");
                        if let Err(e) = handle_connection(conn, state).await {
                            warn!(%remote, error = %e, "connection error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "incoming connection failed");
                    }
                }
            });
        }
        Ok(())
    }

    /// Force-close every outstanding session and stop serving.
    ///
    /// Each live session is released through the driver exactly once.
    /// In-flight requests observe the closed connection as an error instead
    /// of hanging.
    pub async fn close(&self) {
        close_state(&self.endpoint, &self.state).await;
        self.endpoint.wait_idle().await;
    }

    /// Install a termination-signal handler that closes the server before
    /// the process exits.  Call before [`serve`](Self::serve).
    pub fn close_on_abort(&self) -> Result<(), StorError> {
        let mut interrupt = signal(SignalKind::interrupt()).map_err(StorError::internal)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(StorError::internal)?;
        let mut hangup = signal(SignalKind::hangup()).map_err(StorError::internal)?;
        let mut quit = signal(SignalKind::quit()).map_err(StorError::internal)?;

        let endpoint = self.endpoint.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
                _ = hangup.recv() => {}
                _ = quit.recv() => {}
            }
            info!("received abort signal");
            close_state(&endpoint, &state).await;
            std::process::exit(1);
        });
        Ok(())
    }
}

/// Shared terminal path: drain the session table, release every session
/// through the driver, then close the endpoint so `serve` returns.
async fn close_state(endpoint: &quinn::Endpoint, state: &ServerState) {
    let drained = state.sessions.drain();
    info!(count = drained.len(), "force-closing outstanding sessions");
    for (handle, _session) in drained {
        if let Err(e) = state.driver.close_session(handle).await {
            warn!(%handle, error = %e, "driver close failed during shutdown");
        }
    }
    endpoint.close(quinn::VarInt::from_u32(0), b"server shutdown");
}

/// Handle all bi-streams on a single connection.
async fn handle_connection(
    conn: quinn::Connection,
    state: Arc<ServerState>,
) -> Result<(), StorError> {
    loop {
        let (send, recv) = match conn.accept_bi().await {
            Ok(stream) => stream,
            Err(quinn::ConnectionError::ApplicationClosed(_))
            | Err(quinn::ConnectionError::LocallyClosed) => return Ok(()),
            Err(e) => return Err(StorError::transport(e)),
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_stream(send, recv, &state).await {
                error!(error = %e, "stream handler error");
            }
        });
    }
}

/// Process a single bi-stream: read request → dispatch → write response.
#[instrument(skip_all)]
async fn handle_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    state: &ServerState,
) -> Result<(), StorError> {
    let buf = recv
        .read_to_end(MAX_MESSAGE_BYTES)
        .await
        .map_err(StorError::transport)?;

    let request: StorMessage = serde_json::from_slice(&buf)
        .map_err(|e| StorError::Transport(format!("malformed request: {e}")))?;

    debug!(%request, "request received");

    let response = state.dispatch(request).await;

    let payload = serde_json::to_vec(&response).map_err(StorError::internal)?;
    send.write_all(&payload)
        .await
        .map_err(StorError::transport)?;
    send.finish().map_err(StorError::transport)?;
    Ok(())
}

impl ServerState {
    /// Map a request to the session table and driver, wrapping the outcome
    /// in a response [`StorMessage`].
    async fn dispatch(&self, request: StorMessage) -> StorMessage {
        match request {
            StorMessage::OpenSession { instance } => {
                let handle = self.sessions.open(Session { instance });
                match self.driver.open_session(handle).await {
                    Ok(()) => StorMessage::SessionOpened(handle),
                    Err(e) => {
                        // a failed open must not leave a live slot behind
                        let _ = self.sessions.close(handle);
                        StorMessage::Error(e)
                    }
                }
            }
            StorMessage::ListVolumes {
                handle,
                service,
                attachments,
            } => {
                let session = match self.sessions.get(handle) {
                    Ok(session) => session,
                    Err(e) => return StorMessage::Error(e),
                };
                let req = VolumesRequest {
                    service,
                    attachments,
                    instance_id: session.instance.map(|i| i.instance_id),
                };
                match self.driver.list_volumes(&req).await {
                    Ok(map) => StorMessage::ServiceVolumes(map),
                    Err(e) => StorMessage::Error(e),
                }
            }
            StorMessage::CloseSession { handle } => match self.sessions.close(handle) {
                Ok(_session) => match self.driver.close_session(handle).await {
                    Ok(()) => StorMessage::SessionClosed,
                    Err(e) => StorMessage::Error(e),
                },
                Err(e) => StorMessage::Error(e),
            },
            other => {
                warn!(msg = %other, "unexpected message variant received as request");
                StorMessage::Error(StorError::InvalidArgument(format!(
                    "unexpected message: {other}"
                )))
            }
        }
    }
}
