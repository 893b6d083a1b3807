//! Part State Aggregator.
//!
//! Answers "which parts are in state X" for every production state in one
//! call, and exposes the result as a [`StateBoard`] view model. Read-only;
//! safe to poll.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::directory::PartDirectory;
use crate::errors::TrackerError;
use crate::models::{PartState, PartSummary, StateGroup};
use crate::session::Session;

pub mod feed;

pub use feed::{FeedEvent, PollingFeed, PushFeed, StateGroupFeed, Subscription};

#[derive(Clone)]
pub struct PartStateAggregator {
    directory: Arc<dyn PartDirectory>,
}

impl PartStateAggregator {
    pub fn new(directory: Arc<dyn PartDirectory>) -> Self {
        Self { directory }
    }

    /// All parts grouped by state: each state at most once, pipeline order.
    pub async fn get_all_parts_by_state(
        &self,
        session: &Session,
    ) -> Result<Vec<StateGroup>, TrackerError> {
        let raw = self.directory.parts_by_state(session).await?;
        let received = raw.len();
        let groups = normalize(raw);
        debug!(received, states = groups.len(), "fetched parts by state");
        Ok(groups)
    }

    /// Parts currently in a single state.
    pub async fn parts_in_state(
        &self,
        session: &Session,
        state: PartState,
    ) -> Result<Vec<PartSummary>, TrackerError> {
        let parts = self.directory.parts_in_state(session, state).await?;
        debug!(%state, count = parts.len(), "fetched parts in state");
        Ok(parts)
    }

    pub async fn board(&self, session: &Session) -> Result<StateBoard, TrackerError> {
        let groups = self.get_all_parts_by_state(session).await?;
        let board = StateBoard::from_groups(groups);
        info!(total = board.total(), "state board refreshed");
        Ok(board)
    }
}

/// Merge duplicate state entries (dropping repeated parts) and order the
/// groups by pipeline position.
pub fn normalize(groups: Vec<StateGroup>) -> Vec<StateGroup> {
    let mut merged: BTreeMap<PartState, Vec<PartSummary>> = BTreeMap::new();
    for group in groups {
        let parts = merged.entry(group.state).or_default();
        for part in group.parts {
            if !parts.iter().any(|p| p.part_id == part.part_id) {
                parts.push(part);
            }
        }
    }
    let mut groups: Vec<StateGroup> = merged
        .into_iter()
        .map(|(state, parts)| StateGroup { state, parts })
        .collect();
    groups.sort_by_key(|g| g.state.pipeline_rank());
    groups
}

/// Board view model over a normalized set of state groups.
///
/// An absent state and a state with an empty list look the same to callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateBoard {
    groups: BTreeMap<PartState, Vec<PartSummary>>,
}

impl StateBoard {
    pub fn from_groups(groups: Vec<StateGroup>) -> Self {
        Self {
            groups: normalize(groups)
                .into_iter()
                .map(|g| (g.state, g.parts))
                .collect(),
        }
    }

    pub fn parts(&self, state: PartState) -> &[PartSummary] {
        self.groups.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parts in `state` that nobody currently holds.
    pub fn open_pool(&self, state: PartState) -> Vec<&PartSummary> {
        self.parts(state).iter().filter(|p| !p.taken).collect()
    }

    /// Part count for every board column, pipeline order.
    pub fn counts(&self) -> Vec<(PartState, usize)> {
        PartState::BOARD_STATES
            .iter()
            .map(|s| (*s, self.parts(*s).len()))
            .collect()
    }

    /// Board columns in pipeline order, including empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (PartState, &[PartSummary])> + '_ {
        PartState::BOARD_STATES
            .iter()
            .map(move |s| (*s, self.parts(*s)))
    }

    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn find(&self, part_id: Uuid) -> Option<(PartState, &PartSummary)> {
        self.groups.iter().find_map(|(state, parts)| {
            parts
                .iter()
                .find(|p| p.part_id == part_id)
                .map(|p| (*state, p))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;

    fn summary(id: Uuid, taken: bool) -> PartSummary {
        PartSummary {
            part_id: id,
            project_id: Some(1),
            part_name: Some("UMBRAL".into()),
            part_state: None,
            scan_date_time: None,
            tracking_id: None,
            start_time: None,
            taken,
        }
    }

    #[test]
    fn test_normalize_merges_duplicate_states() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let groups = vec![
            StateGroup {
                state: PartState::Packing,
                parts: vec![summary(a, false)],
            },
            StateGroup {
                state: PartState::FactoryQualityControl,
                parts: vec![],
            },
            StateGroup {
                state: PartState::Packing,
                parts: vec![summary(a, false), summary(b, false)],
            },
        ];
        let normalized = normalize(groups);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].state, PartState::FactoryQualityControl);
        assert_eq!(normalized[1].state, PartState::Packing);
        assert_eq!(normalized[1].parts.len(), 2);
    }

    #[test]
    fn test_absent_and_empty_states_are_equivalent() {
        let board = StateBoard::from_groups(vec![StateGroup {
            state: PartState::Painting,
            parts: vec![],
        }]);
        assert!(board.parts(PartState::Painting).is_empty());
        assert!(board.parts(PartState::Repair).is_empty());
        assert_eq!(board.counts().len(), PartState::BOARD_STATES.len());
        assert!(board.counts().iter().all(|(_, n)| *n == 0));
    }

    #[test]
    fn test_open_pool_excludes_taken_parts() {
        let free = Uuid::new_v4();
        let held = Uuid::new_v4();
        let board = StateBoard::from_groups(vec![StateGroup {
            state: PartState::Painting,
            parts: vec![summary(free, false), summary(held, true)],
        }]);
        let pool = board.open_pool(PartState::Painting);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].part_id, free);
        assert_eq!(board.find(held).map(|(s, _)| s), Some(PartState::Painting));
    }

    #[test]
    fn test_iter_follows_board_order() {
        let board = StateBoard::default();
        let states: Vec<PartState> = board.iter().map(|(s, _)| s).collect();
        assert_eq!(states, PartState::BOARD_STATES.to_vec());
    }

    #[tokio::test]
    async fn test_taken_part_leaves_open_pool() {
        let dir = Arc::new(MemoryDirectory::new());
        let p1 = dir.add_part(PartState::Painting, "P1");
        dir.add_part(PartState::Painting, "P2");
        let session = Session::new("token", 7);
        let aggregator = PartStateAggregator::new(dir.clone());

        let before = aggregator.board(&session).await.unwrap();
        assert_eq!(before.open_pool(PartState::Painting).len(), 2);

        dir.take(&session, p1, 7).await.unwrap();
        let after = aggregator.board(&session).await.unwrap();
        assert_eq!(after.open_pool(PartState::Painting).len(), 1);
        assert_eq!(after.parts(PartState::Painting).len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_typed() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.fail("parts_by_state", 403, "Acceso denegado");
        let aggregator = PartStateAggregator::new(dir);
        let err = aggregator
            .get_all_parts_by_state(&Session::new("token", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::Unauthorized { status: 403, .. }));
        assert_eq!(err.user_message(), "Acceso denegado");
    }
}
