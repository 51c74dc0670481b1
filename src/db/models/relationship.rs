use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::errors::StoreError;
use crate::relationships::model::{EdgeKey, RelationshipEdge, UserId};
use crate::schema::relationships;

#[derive(Queryable, Selectable, PartialEq, Clone, Debug)]
#[diesel(table_name = relationships)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Relationship {
    pub sender_id: String,
    pub receiver_id: String,
    pub relationship_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Relationship> for RelationshipEdge {
    type Error = StoreError;

    fn try_from(row: Relationship) -> Result<Self, Self::Error> {
        Ok(RelationshipEdge {
            edge_type: row.relationship_type.parse()?,
            sender_id: UserId::from(row.sender_id),
            receiver_id: UserId::from(row.receiver_id),
            created_at: row.created_at,
        })
    }
}

#[derive(Insertable, Clone)]
#[diesel(table_name = relationships)]
pub struct NewRelationship<'a> {
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub relationship_type: &'static str,
}

impl<'a> From<&'a EdgeKey> for NewRelationship<'a> {
    fn from(key: &'a EdgeKey) -> Self {
        NewRelationship {
            sender_id: key.sender_id.as_str(),
            receiver_id: key.receiver_id.as_str(),
            relationship_type: key.edge_type.as_str(),
        }
    }
}
