//! A naive reference canvas.
//!
//! Replays the whole history on every read. Slow, obviously correct, and
//! used to check stores and cached snapshots.

use place_protocol::CanvasSpec;
use place_storage::Placement;

/// Full placement history with last-write-wins rendering.
#[derive(Debug, Clone)]
pub struct ReferenceCanvas {
    spec: CanvasSpec,
    history: Vec<Placement>,
}

impl ReferenceCanvas {
    /// An empty canvas.
    pub fn new(spec: CanvasSpec) -> Self {
        Self {
            spec,
            history: Vec::new(),
        }
    }

    /// Records a placement.
    pub fn apply(&mut self, placement: &Placement) {
        self.history.push(placement.clone());
    }

    /// Removes every placement painted by `user`; returns how many.
    pub fn delete_user(&mut self, user: &str) -> usize {
        let before = self.history.len();
        self.history.retain(|p| p.user != user);
        before - self.history.len()
    }

    /// Number of recorded placements.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if nothing has been placed.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The latest placement at `(x, y)`.
    pub fn last_at(&self, x: u16, y: u16) -> Option<&Placement> {
        self.history.iter().rev().find(|p| p.x == x && p.y == y)
    }

    /// Colors and painters in linear index order.
    pub fn render(&self) -> (Vec<u8>, Vec<String>) {
        let mut colors = vec![0u8; self.spec.pixel_count()];
        let mut painters = vec![String::new(); self.spec.pixel_count()];
        for placement in &self.history {
            if let Some(i) = self.spec.index(placement.x, placement.y) {
                colors[i] = placement.color;
                painters[i].clone_from(&placement.user);
            }
        }
        (colors, painters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_and_delete_falls_back() {
        let spec = CanvasSpec::new(4, 4, 8);
        let mut canvas = ReferenceCanvas::new(spec);
        canvas.apply(&Placement::at(1.0, "bob", 1, 1, 2));
        canvas.apply(&Placement::at(2.0, "eve", 1, 1, 5));

        let (colors, painters) = canvas.render();
        assert_eq!(colors[5], 5);
        assert_eq!(painters[5], "eve");

        assert_eq!(canvas.delete_user("eve"), 1);
        let (colors, painters) = canvas.render();
        assert_eq!(colors[5], 2);
        assert_eq!(painters[5], "bob");
        assert_eq!(canvas.last_at(1, 1).unwrap().user, "bob");
    }
}
