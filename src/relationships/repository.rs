use std::collections::BTreeMap;

use crate::db::store::{EdgeFilter, EdgeStore, InsertOutcome, PairKey, UserLookup};
use crate::errors::RelationshipError;

use super::model::{
    EdgeKey, EdgeType, RelationshipStatus, RelationshipView, StatusChange, UserId, UserProfile,
};
use super::projector::project;

use log::*;

/// Owns the lifecycle of relationship edges.
///
/// Every write runs as one store transaction on the (actor, target) pair, so
/// concurrent calls on the same pair see each other's effects whole or not at
/// all. Lost insert races come back from the store as
/// `InsertOutcome::AlreadyExists` and are mapped per operation.
#[derive(Clone)]
pub struct RelationshipRepository<S> {
    store: S,
}

fn require_id(name: &str, id: &str) -> Result<(), RelationshipError> {
    if id.trim().is_empty() {
        return Err(RelationshipError::InvalidArgument(format!("{} required", name)));
    }
    Ok(())
}

fn require_pair(actor: &UserId, target: &UserId) -> Result<(), RelationshipError> {
    require_id("actor id", actor.as_str())?;
    require_id("target id", target.as_str())?;
    if actor == target {
        return Err(RelationshipError::InvalidArgument(
            "Cannot target yourself".to_owned(),
        ));
    }
    Ok(())
}

impl<S> RelationshipRepository<S>
where
    S: EdgeStore + UserLookup,
{
    pub fn new(store: S) -> Self {
        RelationshipRepository { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Profile of the caller.
    pub async fn me(&self, actor: &UserId) -> Result<UserProfile, RelationshipError> {
        require_id("actor id", actor.as_str())?;
        self.store
            .get_user(actor)
            .await?
            .ok_or_else(|| RelationshipError::NotFound(format!("User {} not found", actor)))
    }

    /// Sends a friend request to `target`, given as a user id or an e-mail.
    /// Confirms the friendship at once when `target` already asked `actor`.
    pub async fn send(&self, actor: &UserId, target: &str) -> Result<StatusChange, RelationshipError> {
        require_id("actor id", actor.as_str())?;
        require_id("receiver id", target)?;
        if actor.as_str() == target {
            return Err(RelationshipError::InvalidArgument("Cannot friend yourself".to_owned()));
        }

        let target = self
            .store
            .find_user(target)
            .await?
            .ok_or_else(|| RelationshipError::NotFound(format!("No user found with id or email {}", target)))?
            .id;
        require_pair(actor, &target)?;

        let (me, other) = (actor.clone(), target.clone());
        let status = self
            .store
            .transaction(PairKey::new(actor, &target), move |tx| {
                let existing = tx.select_edges(&EdgeFilter::between(&me, &other, None))?;
                if existing.iter().any(|e| e.edge_type == EdgeType::Blocked) {
                    return Err(RelationshipError::Forbidden(format!(
                        "Friend requests between {} and {} are blocked",
                        me, other
                    )));
                }
                let outgoing = EdgeKey::friend(&me, &other);
                if existing.iter().any(|e| e.key() == outgoing) {
                    return Err(RelationshipError::Conflict("Friend request already sent".to_owned()));
                }
                let reciprocal = existing
                    .iter()
                    .any(|e| e.key() == EdgeKey::friend(&other, &me));

                match tx.insert_edge(&outgoing)? {
                    InsertOutcome::Inserted => {}
                    InsertOutcome::AlreadyExists => {
                        return Err(RelationshipError::Conflict("Request already exists".to_owned()))
                    }
                }
                Ok(if reciprocal {
                    RelationshipStatus::Confirmed
                } else {
                    RelationshipStatus::Outgoing
                })
            })
            .await?;

        info!("{} -> {}: friend request {:?}", actor, target, status);
        Ok(StatusChange { id: target, status })
    }

    /// Accepts the pending request `requester` sent to `actor`. Accepting twice
    /// is not an error.
    pub async fn accept(&self, actor: &UserId, requester: &UserId) -> Result<StatusChange, RelationshipError> {
        require_pair(actor, requester)?;

        let (me, other) = (actor.clone(), requester.clone());
        self.store
            .transaction(PairKey::new(actor, requester), move |tx| {
                let incoming = tx.select_edges(&EdgeFilter::Exact(EdgeKey::friend(&other, &me)))?;
                if incoming.is_empty() {
                    return Err(RelationshipError::NotFound(format!("No incoming request from {}", other)));
                }
                if tx.insert_edge(&EdgeKey::friend(&me, &other))? == InsertOutcome::AlreadyExists {
                    debug!("{} already accepted {}", me, other);
                }
                Ok(())
            })
            .await?;

        info!("{} accepted {}", actor, requester);
        Ok(StatusChange {
            id: requester.clone(),
            status: RelationshipStatus::Confirmed,
        })
    }

    /// Withdraws the request `actor` sent to `target`. The opposite direction
    /// is left alone.
    pub async fn cancel(&self, actor: &UserId, target: &UserId) -> Result<UserId, RelationshipError> {
        require_pair(actor, target)?;

        let key = EdgeKey::friend(actor, target);
        self.store
            .transaction(PairKey::new(actor, target), move |tx| {
                match tx.delete_edges(&EdgeFilter::Exact(key))? {
                    0 => Err(RelationshipError::NotFound("No outgoing request to cancel".to_owned())),
                    _ => Ok(()),
                }
            })
            .await?;

        info!("{} cancelled request to {}", actor, target);
        Ok(target.clone())
    }

    /// Drops friend edges in both directions. Nothing to drop is fine.
    pub async fn remove(&self, actor: &UserId, other: &UserId) -> Result<UserId, RelationshipError> {
        require_pair(actor, other)?;

        let filter = EdgeFilter::between(actor, other, Some(EdgeType::Friend));
        let removed = self
            .store
            .transaction(PairKey::new(actor, other), move |tx| Ok(tx.delete_edges(&filter)?))
            .await?;

        info!("{} removed {} ({} edges)", actor, other, removed);
        Ok(other.clone())
    }

    /// Clears any friendship with `target` and blocks it, in one transaction.
    pub async fn block(&self, actor: &UserId, target: &UserId) -> Result<StatusChange, RelationshipError> {
        require_pair(actor, target)?;

        let (me, other) = (actor.clone(), target.clone());
        self.store
            .transaction(PairKey::new(actor, target), move |tx| {
                tx.delete_edges(&EdgeFilter::between(&me, &other, Some(EdgeType::Friend)))?;
                if tx.insert_edge(&EdgeKey::blocked(&me, &other))? == InsertOutcome::AlreadyExists {
                    debug!("{} already blocks {}", me, other);
                }
                Ok(())
            })
            .await?;

        info!("{} blocked {}", actor, target);
        Ok(StatusChange {
            id: target.clone(),
            status: RelationshipStatus::Blocked,
        })
    }

    pub async fn unblock(&self, actor: &UserId, target: &UserId) -> Result<UserId, RelationshipError> {
        require_pair(actor, target)?;

        let key = EdgeKey::blocked(actor, target);
        let removed = self
            .store
            .transaction(PairKey::new(actor, target), move |tx| Ok(tx.delete_edges(&EdgeFilter::Exact(key))?))
            .await?;

        info!("{} unblocked {} ({} edges)", actor, target, removed);
        Ok(target.clone())
    }

    /// The caller's classified view of the graph, keyed by the other user.
    pub async fn classify(&self, actor: &UserId) -> Result<BTreeMap<UserId, RelationshipView>, RelationshipError> {
        require_id("actor id", actor.as_str())?;

        let edges = self.store.select_edges(EdgeFilter::Touching(actor.clone())).await?;
        let mut view = project(actor, &edges);

        let others: Vec<UserId> = view.keys().cloned().collect();
        for user in self.store.users_by_ids(&others).await? {
            if let Some(entry) = view.get_mut(&user.id) {
                entry.email = Some(user.email);
            }
        }
        debug!("{} has {} relationships from {} edges", actor, view.len(), edges.len());
        Ok(view)
    }
}
