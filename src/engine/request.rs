//! engine::request
//!
//! Request and response shapes exchanged with the transport.
//!
//! Payloads are operation-specific JSON; each operation decodes its own
//! argument type with [`RequestContext::decode`]. Responses are a closed
//! set of variants so that the transport can serialize them uniformly.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::OperationError;
use crate::core::types::{ProcedureId, UserDetails};

/// Opaque per-request context, forwarded unchanged to the post-processor
/// and delivered back with the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Correlates the reply with the request.
    pub request_id: Uuid,
    /// When the transport received the request.
    pub received_at: DateTime<Utc>,
    /// Peer address, if the transport knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

impl RequestMetadata {
    /// Metadata for a request received now, with a fresh id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            received_at: Utc::now(),
            client: None,
        }
    }

    /// Attach the peer address.
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an operation needs to start a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub procedure_id: ProcedureId,
    pub payload: serde_json::Value,
    pub user: UserDetails,
    pub metadata: RequestMetadata,
}

impl RequestContext {
    /// Decode the payload into an operation's argument type.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::InvalidArgument` when the payload does not
    /// match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, OperationError> {
        T::deserialize(&self.payload).map_err(|e| {
            OperationError::InvalidArgument(format!(
                "procedure {}: malformed payload: {}",
                self.procedure_id, e
            ))
        })
    }
}

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Acknowledgement without data.
    Empty,
    /// A POSIX timestamp assigned by the operation.
    Timestamp { timestamp_s: u32 },
    /// An address mapping was stored under a new version.
    MappingSet { new_version: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Args {
        name: String,
    }

    fn ctx(payload: serde_json::Value) -> RequestContext {
        RequestContext {
            procedure_id: ProcedureId::new(1),
            payload,
            user: UserDetails::root(),
            metadata: RequestMetadata::new(),
        }
    }

    #[test]
    fn decode_matching_payload() {
        let args: Args = ctx(serde_json::json!({"name": "x"})).decode().unwrap();
        assert_eq!(args.name, "x");
    }

    #[test]
    fn decode_mismatch_is_invalid_argument() {
        let err = ctx(serde_json::json!({"other": 1}))
            .decode::<Args>()
            .unwrap_err();
        assert!(matches!(err, OperationError::InvalidArgument(_)));
        assert!(err.to_string().contains("procedure 1"));
    }

    #[test]
    fn response_json_is_tagged() {
        let json = serde_json::to_value(Response::Timestamp { timestamp_s: 1000 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "timestamp", "timestamp_s": 1000})
        );
        let json = serde_json::to_value(Response::Empty).unwrap();
        assert_eq!(json, serde_json::json!({"type": "empty"}));
    }

    #[test]
    fn metadata_ids_are_unique() {
        assert_ne!(
            RequestMetadata::new().request_id,
            RequestMetadata::new().request_id
        );
    }
}
