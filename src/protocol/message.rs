//! JSON message envelope.
//!
//! # Responsibilities
//! - Define the request object clients and peers send
//! - Turn a raw request into a typed `Command`, rejecting bad input
//! - Define the response objects each action produces
//!
//! # Design Decisions
//! - `action` is parsed from a plain string so an unknown action and broken
//!   JSON can be reported differently
//! - Optional request fields accept explicit `null`
//! - Every response carries an ISO-8601 timestamp except the sync ack

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::record::{timestamp, Record, Snapshot};

/// Value returned by `GET` for a key this node has never seen.
pub const NOT_FOUND_VALUE: &str = "No encontrado";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Set,
    HealthCheck,
    SyncData,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "GET",
            Action::Set => "SET",
            Action::HealthCheck => "HEALTH_CHECK",
            Action::SyncData => "SYNC_DATA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "GET" => Some(Action::Get),
            "SET" => Some(Action::Set),
            "HEALTH_CHECK" => Some(Action::HealthCheck),
            "SYNC_DATA" => Some(Action::SyncData),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Snapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Client-side send time in seconds since the epoch. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl Request {
    fn with_action(action: Action) -> Self {
        Self {
            action: action.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::with_action(Action::Get)
        }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::with_action(Action::Set)
        }
    }

    pub fn health_check() -> Self {
        Self::with_action(Action::HealthCheck)
    }

    pub fn sync_data(data: Snapshot) -> Self {
        Self {
            data: Some(data),
            ..Self::with_action(Action::SyncData)
        }
    }

    /// Tag the request with the sender's id and send time.
    pub fn from_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.timestamp = Some(Utc::now().timestamp_micros() as f64 / 1_000_000.0);
        self
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a frame body into a validated command.
    pub fn decode(frame: &[u8]) -> Result<Command> {
        let request: Request = serde_json::from_slice(frame)
            .map_err(|e| Error::MalformedRequest(format!("invalid JSON: {e}")))?;
        Command::try_from(request)
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    HealthCheck,
    SyncData { data: Snapshot },
}

impl Command {
    pub fn action(&self) -> Action {
        match self {
            Command::Get { .. } => Action::Get,
            Command::Set { .. } => Action::Set,
            Command::HealthCheck => Action::HealthCheck,
            Command::SyncData { .. } => Action::SyncData,
        }
    }
}

impl TryFrom<Request> for Command {
    type Error = Error;

    fn try_from(request: Request) -> Result<Self> {
        let action = Action::parse(&request.action)
            .ok_or_else(|| Error::MalformedRequest(format!("unknown action `{}`", request.action)))?;
        let missing = |field: &str| Error::MalformedRequest(format!("{action} requires `{field}`"));

        match action {
            Action::Get => Ok(Command::Get {
                key: request.key.ok_or_else(|| missing("key"))?,
            }),
            Action::Set => Ok(Command::Set {
                key: request.key.ok_or_else(|| missing("key"))?,
                value: request.value.ok_or_else(|| missing("value"))?,
            }),
            Action::HealthCheck => Ok(Command::HealthCheck),
            Action::SyncData => Ok(Command::SyncData {
                data: request.data.ok_or_else(|| missing("data"))?,
            }),
        }
    }
}

/// Liveness a node asserts about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    pub server_id: String,
    pub key: String,
    pub value: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl GetResponse {
    pub fn found(server_id: &str, key: String, record: Record) -> Self {
        Self {
            server_id: server_id.to_string(),
            key,
            value: record.value,
            timestamp: record.timestamp,
        }
    }

    pub fn not_found(server_id: &str, key: String) -> Self {
        Self {
            server_id: server_id.to_string(),
            key,
            value: NOT_FOUND_VALUE.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.value != NOT_FOUND_VALUE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    pub server_id: String,
    pub status: String,
    pub key: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl SetResponse {
    pub fn ok(key: String, record: &Record) -> Self {
        Self {
            server_id: record.server_id.clone(),
            status: "OK".to_string(),
            key,
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub server_id: String,
    pub status: NodeStatus,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == NodeStatus::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub status: String,
}

impl SyncAck {
    pub const OK: &'static str = "sync_ok";

    pub fn ok() -> Self {
        Self {
            status: Self::OK.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            timestamp: None,
        }
    }

    /// Error stamped with the current time, as the balancer reports them.
    pub fn timestamped(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Any response a node or the balancer can produce.
///
/// Untagged: variants are tried in declaration order, which is also from
/// most to fewest required fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Get(GetResponse),
    Set(SetResponse),
    Health(HealthResponse),
    Sync(SyncAck),
    Error(ErrorResponse),
}

impl Response {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(frame: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(frame)?)
    }

    pub fn error(err: &Error) -> Self {
        Response::Error(ErrorResponse::new(err))
    }
}

mod optional_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::store::record::timestamp;

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => timestamp::serialize(ts, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|raw| {
            timestamp::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
        })
        .transpose()
    }
}
