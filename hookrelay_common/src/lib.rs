//! Hookrelay Common - Shared wire protocol for the request relay
//!
//! This crate contains the message types exchanged between the server and
//! its viewers (browser pages and the CLI), plus the header document format
//! used both on the wire and in storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Header set of a captured request: header name -> one or more values.
///
/// Names are stored in canonical `Title-Case` form and kept sorted, so the
/// serialized document is stable for a given set of headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderDocument(BTreeMap<String, Vec<String>>);

impl HeaderDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any values already present for the name
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_header_name(name))
            .or_default()
            .push(value.into());
    }

    /// Values for a header, looked up case-insensitively
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(&canonical_header_name(name)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Serialize to the JSON document stored alongside the request
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(s).map_err(ProtocolError::Decode)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for HeaderDocument {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut doc = HeaderDocument::new();
        for (name, value) in iter {
            doc.append(name, value);
        }
        doc
    }
}

/// Convert `content-type` into `Content-Type`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// A captured inbound HTTP request, as pushed to viewers and returned by
/// the history API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub id: Uuid,

    #[serde(rename = "endpointID")]
    pub endpoint_id: String,

    pub method: String,

    /// Full request path, including the `/to/{endpoint}` prefix
    pub path: String,

    #[serde(rename = "sourceIP")]
    pub source_ip: String,

    pub body: String,

    pub headers: HeaderDocument,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Events pushed to a live viewer over its WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ViewerEvent {
    /// Sent once after the viewer is registered
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "endpointID")]
        endpoint_id: String,
        #[serde(rename = "connectionID")]
        connection_id: Uuid,
    },

    /// A request was captured for the viewer's endpoint
    #[serde(rename = "request")]
    Request(CapturedRequest),
}

impl ViewerEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(s).map_err(ProtocolError::Decode)
    }
}

/// Constants for the protocol
pub mod constants {
    /// Path prefix for inbound traffic addressed to an endpoint
    pub const CAPTURE_PREFIX: &str = "/to/";

    /// Path prefix for live viewer WebSockets
    pub const VIEWER_PREFIX: &str = "/ws/";

    /// Server -> viewer ping interval
    pub const WS_PING_INTERVAL_SECONDS: u64 = 15;

    /// A viewer that has not answered a ping for this long is dropped
    pub const WS_PONG_TIMEOUT_SECONDS: u64 = 45;

    /// Pending pushes buffered per viewer before deliveries start failing
    pub const VIEWER_CHANNEL_CAPACITY: usize = 64;

    /// History page size when the caller does not ask for one
    pub const DEFAULT_HISTORY_LIMIT: u32 = 32;

    /// Header consulted for the client address behind a trusted proxy
    pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
}
