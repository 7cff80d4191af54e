use indexmap::IndexSet;

use crate::backend::realtime::PresenceDiff;

/// The set of participant ids currently joined to a channel, folded from the
/// join/leave deltas of the presence sub-feed. Iteration order is join order.
///
/// Used by the seen-on-send heuristic: a message composed while the peer is
/// present is marked seen immediately. This is best-effort; nothing here is
/// a delivery receipt.
#[derive(Debug, Default)]
pub struct PresenceSet {
    present: IndexSet<String>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, diff: &PresenceDiff) {
        for join in &diff.joins {
            self.present.insert(join.uid.clone());
        }
        for leave in &diff.leaves {
            self.present.shift_remove(&leave.uid);
        }
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.present.contains(uid)
    }

    pub fn ids(&self) -> Vec<String> {
        self.present.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::PresenceState;

    fn uid(uid: &str) -> PresenceState {
        PresenceState {
            uid: uid.to_owned(),
        }
    }

    #[test]
    fn folds_joins_and_leaves() {
        let mut presence = PresenceSet::new();
        presence.apply(&PresenceDiff {
            joins: vec![uid("alice"), uid("bob")],
            leaves: vec![],
        });
        assert_eq!(presence.ids(), vec!["alice", "bob"]);

        // Re-joining is a no-op, leaving an unknown id is a no-op.
        presence.apply(&PresenceDiff {
            joins: vec![uid("alice")],
            leaves: vec![uid("carol")],
        });
        assert_eq!(presence.len(), 2);

        presence.apply(&PresenceDiff {
            joins: vec![],
            leaves: vec![uid("alice")],
        });
        assert!(!presence.contains("alice"));
        assert!(presence.contains("bob"));
    }
}
