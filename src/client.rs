//! High-level client session: open a handle, query volumes, release it.

use std::net::SocketAddr;
use std::path::Path;

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::StorError;
use crate::message::StorMessage;
use crate::tls;
use crate::transport::client::StorClient;
use crate::types::{AttachmentFlags, Handle, Instance, InstanceId, ServiceVolumeMap};

/// One established session against a driver server.
///
/// A `Client` owns its [`Handle`] exclusively.  Operations on the same
/// session must not run concurrently; the `&mut self` receivers serialize
/// them for the owning caller.  Sharing the raw handle value across callers
/// voids that guarantee.
pub struct Client {
    transport: StorClient,
    handle: Handle,
    service: Option<String>,
}

impl Client {
    /// Open a session using the configuration at `config_path`.
    ///
    /// A missing file yields [`StorError::ConfigNotFound`]; connection and
    /// session-establishment failures are returned as-is.
    pub async fn new(config_path: impl AsRef<Path>) -> Result<Self, StorError> {
        let config = ClientConfig::load(config_path)?;
        Self::connect(&config).await
    }

    /// Open a session from an already-loaded configuration.
    pub async fn connect(config: &ClientConfig) -> Result<Self, StorError> {
        let addr: SocketAddr = config
            .host
            .parse()
            .map_err(|e| StorError::Config(format!("host {}: {e}", config.host)))?;
        let cert = tls::read_cert(&config.ca_cert)?;
        let tls_config = tls::client_config(cert)?;
        let transport = StorClient::connect(addr, &config.server_name, tls_config).await?;

        let instance = config.instance.clone().or_else(local_instance);
        match transport
            .request(&StorMessage::OpenSession { instance })
            .await?
        {
            StorMessage::SessionOpened(handle) => {
                debug!(%handle, "session opened");
                Ok(Self {
                    transport,
                    handle,
                    service: config.service.clone(),
                })
            }
            StorMessage::Error(e) => Err(e),
            other => Err(StorError::Transport(format!("unexpected response: {other}"))),
        }
    }

    /// The handle identifying this session.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// List volumes grouped by service.
    ///
    /// The optional service scope from the configuration is applied; driver
    /// errors come back verbatim from the server.
    pub async fn volumes(
        &mut self,
        attachments: AttachmentFlags,
    ) -> Result<ServiceVolumeMap, StorError> {
        match self
            .transport
            .request(&StorMessage::ListVolumes {
                handle: self.handle,
                service: self.service.clone(),
                attachments,
            })
            .await?
        {
            StorMessage::ServiceVolumes(map) => Ok(map),
            StorMessage::Error(e) => Err(e),
            other => Err(StorError::Transport(format!("unexpected response: {other}"))),
        }
    }

    /// Release the session and its server-side resources.
    ///
    /// Consumes the client, so a session is closed at most once from safe
    /// code; the server rejects any further use of the handle either way.
    pub async fn close(self) -> Result<(), StorError> {
        let result = match self
            .transport
            .request(&StorMessage::CloseSession {
                handle: self.handle,
            })
            .await?
        {
            StorMessage::SessionClosed => Ok(()),
            StorMessage::Error(e) => Err(e),
            other => Err(StorError::Transport(format!("unexpected response: {other}"))),
        };
        self.transport.close();
        result
    }
}

/// Default identity presented at open time: this host.
fn local_instance() -> Option<Instance> {
    let hostname = nix::unistd::gethostname().ok()?.into_string().ok()?;
    Some(Instance {
        instance_id: InstanceId::new(hostname.clone()),
        name: hostname,
        provider_name: String::new(),
        region: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_is_distinct() {
        let err = Client::new("definitely/missing.json")
            .await
            .err()
            .expect("must fail");
        assert!(matches!(err, StorError::ConfigNotFound(_)));
        assert!(err.to_string().starts_with("configuration not found"));
    }

    #[test]
    fn local_instance_names_this_host() {
        let instance = local_instance().expect("hostname available");
        assert!(!instance.instance_id.id.is_empty());
        assert_eq!(instance.instance_id.id, instance.name);
    }
}
