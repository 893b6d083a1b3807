use std::collections::VecDeque;

use crate::models::ScannedPart;

/// Most-recent-first list of received parts, capped at `limit` entries.
#[derive(Debug, Clone)]
pub struct RecentScans {
    entries: VecDeque<ScannedPart>,
    limit: usize,
}

impl RecentScans {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, entry: ScannedPart) {
        self.entries.push_front(entry);
        self.entries.truncate(self.limit);
    }

    /// Replace the list with server history, newest first.
    pub fn replace(&mut self, mut history: Vec<ScannedPart>) {
        history.sort_by(|a, b| b.scan_date_time.cmp(&a.scan_date_time));
        self.entries = history.into_iter().take(self.limit).collect();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScannedPart> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<ScannedPart> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
