use async_trait::async_trait;

use crate::errors::{RelationshipError, StoreError};
use crate::relationships::model::{EdgeKey, EdgeType, RelationshipEdge, SignIn, UserId, UserProfile};

/// What happened to an insert. A row with the same key already being present
/// is an expected outcome under concurrent writers, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Row selection understood by every store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeFilter {
    /// The single row with this key.
    Exact(EdgeKey),
    /// Rows between `a` and `b` in either direction, optionally of one type.
    Between {
        a: UserId,
        b: UserId,
        edge_type: Option<EdgeType>,
    },
    /// Every row the user sends or receives.
    Touching(UserId),
}

impl EdgeFilter {
    pub fn between(a: &UserId, b: &UserId, edge_type: Option<EdgeType>) -> Self {
        EdgeFilter::Between {
            a: a.clone(),
            b: b.clone(),
            edge_type,
        }
    }

    pub fn matches(&self, edge: &RelationshipEdge) -> bool {
        match self {
            EdgeFilter::Exact(key) => {
                edge.sender_id == key.sender_id
                    && edge.receiver_id == key.receiver_id
                    && edge.edge_type == key.edge_type
            }
            EdgeFilter::Between { a, b, edge_type } => {
                let pair = (&edge.sender_id == a && &edge.receiver_id == b)
                    || (&edge.sender_id == b && &edge.receiver_id == a);
                pair && edge_type.map_or(true, |t| t == edge.edge_type)
            }
            EdgeFilter::Touching(user) => &edge.sender_id == user || &edge.receiver_id == user,
        }
    }
}

/// Unordered pair of users. Writes on the same pair are serialized by the
/// store; writes on different pairs are not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: UserId,
    high: UserId,
}

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            PairKey { low: a.clone(), high: b.clone() }
        } else {
            PairKey { low: b.clone(), high: a.clone() }
        }
    }

    /// Stable text name of the pair, the same whichever side asks.
    pub fn lock_name(&self) -> String {
        format!("relationships:{}|{}", self.low, self.high)
    }
}

/// Operations available inside a store transaction. Everything done through
/// one `EdgeTx` commits together or not at all.
pub trait EdgeTx {
    fn insert_edge(&mut self, key: &EdgeKey) -> Result<InsertOutcome, StoreError>;

    /// Returns the number of rows removed.
    fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<usize, StoreError>;

    fn select_edges(&mut self, filter: &EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError>;
}

#[async_trait]
pub trait EdgeStore: Send + Sync {
    async fn select_edges(&self, filter: EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError>;

    /// Runs `body` in one transaction scoped to `pair`. An `Err` from the body
    /// rolls back every change it made.
    async fn transaction<T, F>(&self, pair: PairKey, body: F) -> Result<T, RelationshipError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn EdgeTx) -> Result<T, RelationshipError> + Send + 'static;
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Resolves either a user id or an e-mail address.
    async fn find_user(&self, id_or_email: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, StoreError>;

    /// Creates the user on first sign-in, refreshes e-mail and login time after.
    async fn save_user(&self, sign_in: SignIn) -> Result<UserProfile, StoreError>;
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn edge(sender: &str, receiver: &str, edge_type: EdgeType) -> RelationshipEdge {
        RelationshipEdge {
            sender_id: UserId::from(sender),
            receiver_id: UserId::from(receiver),
            edge_type,
            created_at: Utc::now(),
        }
    }

    #[test]
    pub fn test_pair_key_is_unordered() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");
        assert_eq!(PairKey::new(&a, &b), PairKey::new(&b, &a));
        assert_eq!(PairKey::new(&b, &a).lock_name(), "relationships:alice|bob");
    }

    #[test]
    pub fn test_filter_matching() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        let forward = edge("a", "b", EdgeType::Friend);
        let backward = edge("b", "a", EdgeType::Friend);
        let block = edge("a", "b", EdgeType::Blocked);
        let unrelated = edge("b", "c", EdgeType::Friend);

        let exact = EdgeFilter::Exact(EdgeKey::friend(&a, &b));
        assert!(exact.matches(&forward));
        assert!(!exact.matches(&backward));
        assert!(!exact.matches(&block));

        let friends = EdgeFilter::between(&a, &b, Some(EdgeType::Friend));
        assert!(friends.matches(&forward) && friends.matches(&backward));
        assert!(!friends.matches(&block));
        assert!(EdgeFilter::between(&b, &a, None).matches(&block));
        assert!(!EdgeFilter::between(&a, &b, None).matches(&unrelated));

        let touching = EdgeFilter::Touching(a);
        assert!(touching.matches(&block));
        assert!(!touching.matches(&unrelated));
    }
}
