//! In-memory mirror of the placement log with a latest-per-coordinate index.

use crate::placement::Placement;
use std::collections::HashMap;

/// Placements in append order plus the position of the latest one per coordinate.
#[derive(Debug, Default)]
pub(crate) struct LogIndex {
    placements: Vec<Placement>,
    latest: HashMap<(u16, u16), usize>,
}

impl LogIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, placement: Placement) {
        self.latest
            .insert(placement.coordinate(), self.placements.len());
        self.placements.push(placement);
    }

    pub(crate) fn extend<I: IntoIterator<Item = Placement>>(&mut self, placements: I) {
        for placement in placements {
            self.push(placement);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.placements.len()
    }

    pub(crate) fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub(crate) fn last_at(&self, x: u16, y: u16) -> Option<Placement> {
        self.latest
            .get(&(x, y))
            .map(|&idx| self.placements[idx].clone())
    }

    pub(crate) fn latest_per_coordinate(&self) -> Vec<Placement> {
        let mut latest: Vec<Placement> = self
            .latest
            .values()
            .map(|&idx| self.placements[idx].clone())
            .collect();
        latest.sort_by_key(|p| (p.y, p.x));
        latest
    }

    /// Returns the placements that would survive deleting `user`, without
    /// modifying the index.
    pub(crate) fn without_user(&self, user: &str) -> Vec<Placement> {
        self.placements
            .iter()
            .filter(|p| p.user != user)
            .cloned()
            .collect()
    }

    /// Replaces the contents, rebuilding the latest index from scratch.
    pub(crate) fn replace(&mut self, placements: Vec<Placement>) {
        self.placements.clear();
        self.latest.clear();
        self.extend(placements);
    }
}
