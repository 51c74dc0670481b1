use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::StoreError;

/// Opaque user identifier as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_owned())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Friend,
    Blocked,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Friend => "friend",
            EdgeType::Blocked => "blocked",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "friend" => Ok(EdgeType::Friend),
            "blocked" => Ok(EdgeType::Blocked),
            other => Err(StoreError::InvalidData(format!("Unknown relationship type: {}", other))),
        }
    }
}

/// Identity of a stored edge. No two rows share all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub edge_type: EdgeType,
}

impl EdgeKey {
    pub fn friend(sender_id: &UserId, receiver_id: &UserId) -> Self {
        EdgeKey {
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            edge_type: EdgeType::Friend,
        }
    }

    pub fn blocked(sender_id: &UserId, receiver_id: &UserId) -> Self {
        EdgeKey {
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            edge_type: EdgeType::Blocked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEdge {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub edge_type: EdgeType,
    pub created_at: DateTime<Utc>,
}

impl RelationshipEdge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            edge_type: self.edge_type,
        }
    }

    /// The party on the other end of this edge, seen from `me`.
    /// `None` when `me` is not an endpoint.
    pub fn other_party(&self, me: &UserId) -> Option<&UserId> {
        if &self.sender_id == me {
            Some(&self.receiver_id)
        } else if &self.receiver_id == me {
            Some(&self.sender_id)
        } else {
            None
        }
    }
}

/// User-centric classification of a pair. Serialized with the labels the
/// client side already understands: an outgoing request is shown as "pending",
/// a confirmed pair as "friend".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationshipStatus {
    #[serde(rename = "friend")]
    Confirmed,
    #[serde(rename = "pending")]
    Outgoing,
    #[serde(rename = "incoming")]
    Incoming,
    #[serde(rename = "blocked")]
    Blocked,
}

/// One entry of the classified view, keyed by the other party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipView {
    pub id: UserId,
    pub status: RelationshipStatus,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub created_at: DateTime<Utc>,
    pub email: Option<String>,
}

/// Result of a write that changes how the caller sees `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub id: UserId,
    pub status: RelationshipStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Identity claims used to create or refresh a user row at sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
}
