use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::store::{EdgeFilter, EdgeStore, EdgeTx, InsertOutcome, PairKey, UserLookup};
use crate::errors::{RelationshipError, StoreError};
use crate::relationships::model::{EdgeKey, RelationshipEdge, SignIn, UserId, UserProfile};

use log::*;

type EdgeTable = BTreeMap<EdgeKey, DateTime<Utc>>;

#[derive(Default)]
struct MemoryState {
    edges: EdgeTable,
    users: BTreeMap<UserId, UserProfile>,
}

/// In-process store with the same contract as `PgStore`.
///
/// All transactions run under one lock, so they are fully serialized. Clones
/// share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn edge_count(&self) -> usize {
        self.lock().edges.len()
    }
}

fn to_edge(key: &EdgeKey, created_at: &DateTime<Utc>) -> RelationshipEdge {
    RelationshipEdge {
        sender_id: key.sender_id.clone(),
        receiver_id: key.receiver_id.clone(),
        edge_type: key.edge_type,
        created_at: *created_at,
    }
}

struct MemoryTx<'a> {
    edges: &'a mut EdgeTable,
}

impl EdgeTx for MemoryTx<'_> {
    fn insert_edge(&mut self, key: &EdgeKey) -> Result<InsertOutcome, StoreError> {
        if key.sender_id == key.receiver_id {
            return Err(StoreError::InvalidData(format!("Self edge for {}", key.sender_id)));
        }
        if self.edges.contains_key(key) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        self.edges.insert(key.clone(), Utc::now());
        Ok(InsertOutcome::Inserted)
    }

    fn delete_edges(&mut self, filter: &EdgeFilter) -> Result<usize, StoreError> {
        let before = self.edges.len();
        self.edges
            .retain(|key, created_at| !filter.matches(&to_edge(key, created_at)));
        Ok(before - self.edges.len())
    }

    fn select_edges(&mut self, filter: &EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError> {
        Ok(select(self.edges, filter))
    }
}

fn select(edges: &EdgeTable, filter: &EdgeFilter) -> Vec<RelationshipEdge> {
    edges
        .iter()
        .map(|(key, created_at)| to_edge(key, created_at))
        .filter(|edge| filter.matches(edge))
        .collect()
}

#[async_trait]
impl EdgeStore for MemoryStore {
    async fn select_edges(&self, filter: EdgeFilter) -> Result<Vec<RelationshipEdge>, StoreError> {
        Ok(select(&self.lock().edges, &filter))
    }

    async fn transaction<T, F>(&self, pair: PairKey, body: F) -> Result<T, RelationshipError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn EdgeTx) -> Result<T, RelationshipError> + Send + 'static,
    {
        let mut state = self.lock();
        let snapshot = state.edges.clone();
        let tx: &mut dyn EdgeTx = &mut MemoryTx { edges: &mut state.edges };
        let result = body(tx);
        if result.is_err() {
            debug!("Rolling back transaction on {}", pair.lock_name());
            state.edges = snapshot;
        }
        result
    }
}

#[async_trait]
impl UserLookup for MemoryStore {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().users.get(id).cloned())
    }

    async fn find_user(&self, id_or_email: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.id.as_str() == id_or_email || u.email == id_or_email)
            .cloned())
    }

    async fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<UserProfile>, StoreError> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn save_user(&self, sign_in: SignIn) -> Result<UserProfile, StoreError> {
        let mut state = self.lock();
        let email_taken = state
            .users
            .values()
            .any(|u| u.email == sign_in.email && u.id != sign_in.id);
        if email_taken {
            return Err(StoreError::InvalidData(format!("E-mail {} is already registered", sign_in.email)));
        }
        let now = Utc::now();
        let profile = state
            .users
            .entry(sign_in.id.clone())
            .and_modify(|u| {
                u.email = sign_in.email.clone();
                u.last_login_at = Some(now);
            })
            .or_insert_with(|| UserProfile {
                id: sign_in.id.clone(),
                email: sign_in.email.clone(),
                username: sign_in.username.clone(),
                created_at: now,
                last_login_at: Some(now),
            });
        Ok(profile.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::relationships::model::EdgeType;

    fn ids() -> (UserId, UserId) {
        (UserId::from("a"), UserId::from("b"))
    }

    #[tokio::test]
    pub async fn test_insert_reports_existing_key() -> Result<(), RelationshipError> {
        let store = MemoryStore::new();
        let (a, b) = ids();
        let key = EdgeKey::friend(&a, &b);
        let outcomes = store
            .transaction(PairKey::new(&a, &b), move |tx| {
                Ok((tx.insert_edge(&key)?, tx.insert_edge(&key)?))
            })
            .await?;
        assert_eq!(outcomes, (InsertOutcome::Inserted, InsertOutcome::AlreadyExists));
        assert_eq!(store.edge_count(), 1);
        Ok(())
    }

    #[tokio::test]
    pub async fn test_failed_transaction_rolls_back() -> Result<(), RelationshipError> {
        let store = MemoryStore::new();
        let (a, b) = ids();
        let (a2, b2) = (a.clone(), b.clone());
        let result: Result<(), _> = store
            .transaction(PairKey::new(&a, &b), move |tx| {
                tx.insert_edge(&EdgeKey::blocked(&a2, &b2))?;
                Err(RelationshipError::Conflict("stop".to_owned()))
            })
            .await;
        assert!(matches!(result, Err(RelationshipError::Conflict(_))));
        assert_eq!(store.edge_count(), 0);
        assert!(store
            .select_edges(EdgeFilter::between(&a, &b, Some(EdgeType::Blocked)))
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    pub async fn test_self_edge_is_rejected() {
        let store = MemoryStore::new();
        let a = UserId::from("a");
        let key = EdgeKey::friend(&a, &a);
        let result = store
            .transaction(PairKey::new(&a, &a), move |tx| Ok(tx.insert_edge(&key)?))
            .await;
        assert!(matches!(result, Err(RelationshipError::Storage(StoreError::InvalidData(_)))));
    }

    #[tokio::test]
    pub async fn test_save_user_upserts() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let first = store
            .save_user(SignIn {
                id: UserId::from("sub-1"),
                email: "old@example.com".to_owned(),
                username: Some("one".to_owned()),
            })
            .await?;
        let second = store
            .save_user(SignIn {
                id: UserId::from("sub-1"),
                email: "new@example.com".to_owned(),
                username: None,
            })
            .await?;
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.email, "new@example.com");
        assert_eq!(second.username, Some("one".to_owned()));
        assert!(store.find_user("old@example.com").await?.is_none());
        assert_eq!(store.find_user("new@example.com").await?.map(|u| u.id), Some(UserId::from("sub-1")));
        assert_eq!(store.find_user("sub-1").await?.map(|u| u.email), Some("new@example.com".to_owned()));
        Ok(())
    }
}
