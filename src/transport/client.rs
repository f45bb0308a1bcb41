//! QUIC client used to issue storage requests.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::crypto::rustls::QuicClientConfig;
use tracing::{debug, instrument};

use crate::error::StorError;
use crate::message::StorMessage;

use super::MAX_MESSAGE_BYTES;

/// A lightweight client that sends [`StorMessage`] requests over a single
/// QUIC connection and returns the server's response.
pub struct StorClient {
    connection: quinn::Connection,
}

impl StorClient {
    /// Establish a new QUIC connection to the server at `addr`.
    ///
    /// * `addr` — socket address of the remote server
    /// * `server_name` — TLS SNI name that must match a SAN in the server's
    ///   certificate
    /// * `tls_config` — client TLS configuration, typically pinning the
    ///   certificate the server wrote at startup
    pub async fn connect(
        addr: SocketAddr,
        server_name: &str,
        tls_config: rustls::ClientConfig,
    ) -> Result<Self, StorError> {
        let quic_client_config = QuicClientConfig::try_from(tls_config)
            .map_err(|e| StorError::Transport(format!("invalid TLS config: {e}")))?;
        let client_config = quinn::ClientConfig::new(Arc::new(quic_client_config));

        let bind = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let mut endpoint = quinn::Endpoint::client(
            bind.parse().map_err(StorError::transport)?,
        )
        .map_err(StorError::transport)?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(addr, server_name)
            .map_err(StorError::transport)?
            .await
            .map_err(StorError::transport)?;

        debug!(%addr, %server_name, "storage connection established");
        Ok(Self { connection })
    }

    /// Send a request and wait for the corresponding response.
    ///
    /// Each call opens a new bi-directional QUIC stream, writes the
    /// JSON-serialized request, finishes the send side, then reads the full
    /// response and deserializes it.
    #[instrument(skip(self), fields(msg = %msg))]
    pub async fn request(&self, msg: &StorMessage) -> Result<StorMessage, StorError> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(connection_error)?;

        let payload = serde_json::to_vec(msg).map_err(StorError::internal)?;
        send.write_all(&payload)
            .await
            .map_err(StorError::transport)?;
        send.finish().map_err(StorError::transport)?;

        let buf = recv
            .read_to_end(MAX_MESSAGE_BYTES)
            .await
            .map_err(StorError::transport)?;

        let response: StorMessage =
            serde_json::from_slice(&buf).map_err(StorError::transport)?;
        debug!(%response, "storage response received");
        Ok(response)
    }

    /// Close the underlying QUIC connection gracefully.
    pub fn close(&self) {
        self.connection
            .close(quinn::VarInt::from_u32(0), b"client shutdown");
    }
}

/// Distinguish a server-initiated close from other transport failures, so
/// callers racing a shutdown see the documented "connection closed" error.
fn connection_error(e: quinn::ConnectionError) -> StorError {
    match e {
        quinn::ConnectionError::ApplicationClosed(_)
        | quinn::ConnectionError::ConnectionClosed(_)
        | quinn::ConnectionError::LocallyClosed => StorError::ConnectionClosed,
        other => StorError::transport(other),
    }
}
