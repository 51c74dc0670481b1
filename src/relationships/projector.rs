use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::model::{EdgeType, RelationshipEdge, RelationshipStatus, RelationshipView, UserId};

/// Everything the edges between `me` and one other user say about the pair.
///
/// Each slot keeps the newest timestamp seen for that edge shape, so `merge`
/// is commutative and associative and the resolved status never depends on
/// the order rows came back in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PairFold {
    blocked_by_me: Option<DateTime<Utc>>,
    blocked_me: Option<DateTime<Utc>>,
    outgoing: Option<DateTime<Utc>>,
    incoming: Option<DateTime<Utc>>,
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl PairFold {
    pub(crate) fn of(me: &UserId, edge: &RelationshipEdge) -> Self {
        let sent = &edge.sender_id == me;
        let at = Some(edge.created_at);
        match (edge.edge_type, sent) {
            (EdgeType::Blocked, true) => PairFold { blocked_by_me: at, ..Default::default() },
            (EdgeType::Blocked, false) => PairFold { blocked_me: at, ..Default::default() },
            (EdgeType::Friend, true) => PairFold { outgoing: at, ..Default::default() },
            (EdgeType::Friend, false) => PairFold { incoming: at, ..Default::default() },
        }
    }

    pub(crate) fn merge(self, other: PairFold) -> Self {
        PairFold {
            blocked_by_me: latest(self.blocked_by_me, other.blocked_by_me),
            blocked_me: latest(self.blocked_me, other.blocked_me),
            outgoing: latest(self.outgoing, other.outgoing),
            incoming: latest(self.incoming, other.incoming),
        }
    }

    /// `None` means the pair is not shown to `me` at all.
    pub(crate) fn resolve(self, other: UserId) -> Option<RelationshipView> {
        let (status, edge_type, created_at) = if let Some(at) = self.blocked_by_me {
            (RelationshipStatus::Blocked, EdgeType::Blocked, at)
        } else if self.blocked_me.is_some() {
            return None;
        } else {
            match (self.outgoing, self.incoming) {
                (Some(out), Some(inc)) => (RelationshipStatus::Confirmed, EdgeType::Friend, out.max(inc)),
                (Some(out), None) => (RelationshipStatus::Outgoing, EdgeType::Friend, out),
                (None, Some(inc)) => (RelationshipStatus::Incoming, EdgeType::Friend, inc),
                (None, None) => return None,
            }
        };
        Some(RelationshipView {
            id: other,
            status,
            edge_type,
            created_at,
            email: None,
        })
    }
}

/// Folds every edge touching `me` into one classified record per other user.
///
/// Edges that do not involve `me`, and self-edges, are ignored.
pub fn project(me: &UserId, edges: &[RelationshipEdge]) -> BTreeMap<UserId, RelationshipView> {
    let mut folds: BTreeMap<UserId, PairFold> = BTreeMap::new();
    for edge in edges {
        let other = match edge.other_party(me) {
            Some(other) if other != me => other,
            _ => continue,
        };
        let fold = PairFold::of(me, edge);
        folds
            .entry(other.clone())
            .and_modify(|acc| *acc = acc.merge(fold))
            .or_insert(fold);
    }

    folds
        .into_iter()
        .filter_map(|(other, fold)| fold.resolve(other.clone()).map(|view| (other, view)))
        .collect()
}
