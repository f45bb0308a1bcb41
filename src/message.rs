//! Protocol messages exchanged between client and server.
//!
//! [`StorMessage`] is the top-level envelope for all request and response
//! variants.  Each QUIC bi-stream carries exactly one request followed by
//! one response: the client sends a *request* variant and the server replies
//! with the corresponding *response* variant (or [`StorMessage::Error`]).

use serde::{Deserialize, Serialize};

use crate::error::StorError;
use crate::types::{AttachmentFlags, Handle, Instance, ServiceVolumeMap};

/// Top-level message envelope for the session protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorMessage {
    // ----- Requests --------------------------------------------------------
    /// Establish a session, optionally presenting the caller's identity.
    OpenSession {
        /// Instance this session acts on behalf of.
        instance: Option<Instance>,
    },
    /// List volumes grouped by owning service.
    ListVolumes {
        /// Session handle obtained from [`StorMessage::SessionOpened`].
        handle: Handle,
        /// Restrict the result to a single service.
        service: Option<String>,
        /// Attachment capability mask.
        attachments: AttachmentFlags,
    },
    /// Release a session and its server-side resources.
    CloseSession {
        /// Handle of the session to release.
        handle: Handle,
    },

    // ----- Responses -------------------------------------------------------
    /// A session was established.
    SessionOpened(Handle),
    /// Result of a volumes query.
    ServiceVolumes(ServiceVolumeMap),
    /// A session was released.
    SessionClosed,
    /// An error occurred.
    Error(StorError),
}

impl std::fmt::Display for StorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenSession { instance } => match instance {
                Some(i) => write!(f, "OpenSession(instance={})", i.instance_id),
                None => f.write_str("OpenSession"),
            },
            Self::ListVolumes {
                handle,
                service,
                attachments,
            } => match service {
                Some(s) => write!(f, "ListVolumes({handle}, service={s}, mask={attachments})"),
                None => write!(f, "ListVolumes({handle}, mask={attachments})"),
            },
            Self::CloseSession { handle } => write!(f, "CloseSession({handle})"),
            Self::SessionOpened(handle) => write!(f, "SessionOpened({handle})"),
            Self::ServiceVolumes(map) => write!(f, "ServiceVolumes(services={})", map.len()),
            Self::SessionClosed => f.write_str("SessionClosed"),
            Self::Error(e) => write!(f, "Error({e})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstanceId;

    #[test]
    fn message_serde_roundtrip() {
        let msg = StorMessage::ListVolumes {
            handle: Handle::from(0x100000001),
            service: Some("svcA".into()),
            attachments: AttachmentFlags::REQUESTED | AttachmentFlags::DEVICES,
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: StorMessage = serde_json::from_str(&json).expect("deserialize");
        match de {
            StorMessage::ListVolumes {
                handle,
                service,
                attachments,
            } => {
                assert_eq!(handle.raw(), 0x100000001);
                assert_eq!(service.as_deref(), Some("svcA"));
                assert!(attachments.devices());
            }
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn error_message_roundtrip() {
        let msg = StorMessage::Error(StorError::InvalidHandle(7));
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: StorMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(de, StorMessage::Error(StorError::InvalidHandle(7))));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(StorMessage::SessionClosed.to_string(), "SessionClosed");

        let msg = StorMessage::OpenSession {
            instance: Some(Instance {
                instance_id: InstanceId::new("i-1"),
                name: String::new(),
                provider_name: String::new(),
                region: String::new(),
            }),
        };
        assert_eq!(msg.to_string(), "OpenSession(instance=i-1)");
    }
}
