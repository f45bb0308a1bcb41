//! Client and server configuration.
//!
//! Both binaries read a JSON configuration file whose path is given on the
//! command line.  A missing file maps to the distinct
//! [`StorError::ConfigNotFound`] so callers can tell "no such file" apart
//! from "file exists but is broken".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StorError;
use crate::types::Instance;

/// Default bind/connect address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:7979";
/// Default TLS server name the server certificate is issued for.
pub const DEFAULT_SERVER_NAME: &str = "libstor";

fn default_host() -> String {
    DEFAULT_ADDR.to_owned()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_owned()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/var/lib/libstor")
}

fn read_config(path: &Path) -> Result<String, StorError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StorError::ConfigNotFound(path.display().to_string()))
        }
        Err(e) => Err(StorError::Config(format!("{}: {e}", path.display()))),
    }
}

/// Configuration for [`Client`](crate::client::Client) sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Server address, `host:port`.
    #[serde(default = "default_host")]
    pub host: String,
    /// TLS server name the server's certificate was issued for.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Path to the server's certificate in DER form (the server writes it
    /// beside its data root at startup).
    pub ca_cert: PathBuf,
    /// Restrict queries to a single service.
    #[serde(default)]
    pub service: Option<String>,
    /// Identity presented when the session is opened; defaults to this host.
    #[serde(default)]
    pub instance: Option<Instance>,
}

impl ClientConfig {
    /// Load a client configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        serde_json::from_str(&text)
            .map_err(|e| StorError::Config(format!("{}: {e}", path.display())))
    }
}

/// Configuration for the driver server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    #[serde(default = "default_host")]
    pub bind: String,
    /// TLS server name to issue the self-signed certificate for.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Root directory holding the per-driver inventories; also receives the
    /// generated `server.crt`.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_host(),
            server_name: default_server_name(),
            data_root: default_data_root(),
        }
    }
}

impl ServerConfig {
    /// Load a server configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorError> {
        let path = path.as_ref();
        let text = read_config(path)?;
        serde_json::from_str(&text)
            .map_err(|e| StorError::Config(format!("{}: {e}", path.display())))
    }

    /// Path the server writes its certificate to.
    pub fn cert_path(&self) -> PathBuf {
        self.data_root.join("server.crt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_client_config() {
        let err = ClientConfig::load("does/not/exist.json").expect_err("must fail");
        assert!(matches!(err, StorError::ConfigNotFound(_)));
        assert!(err.to_string().starts_with("configuration not found"));
    }

    #[test]
    fn malformed_client_config() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = ClientConfig::load(&path).expect_err("must fail");
        assert!(matches!(err, StorError::Config(_)));
    }

    #[test]
    fn client_config_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"caCert": "/tmp/server.crt"}"#).expect("write");
        let cfg = ClientConfig::load(&path).expect("load");
        assert_eq!(cfg.host, DEFAULT_ADDR);
        assert_eq!(cfg.server_name, DEFAULT_SERVER_NAME);
        assert!(cfg.service.is_none());
        assert!(cfg.instance.is_none());
    }

    #[test]
    fn server_config_roundtrip() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("server.json");
        let cfg = ServerConfig {
            bind: "127.0.0.1:0".into(),
            server_name: "stor.test".into(),
            data_root: tmp.path().join("data"),
        };
        std::fs::write(&path, serde_json::to_string(&cfg).expect("serialize")).expect("write");
        let loaded = ServerConfig::load(&path).expect("load");
        assert_eq!(loaded.bind, cfg.bind);
        assert_eq!(loaded.server_name, cfg.server_name);
        assert_eq!(loaded.cert_path(), cfg.data_root.join("server.crt"));
    }
}
