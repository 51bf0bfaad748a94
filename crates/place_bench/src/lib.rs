//! Benchmark utilities.

#![warn(missing_docs)]

use place_protocol::CanvasSpec;
use place_storage::Placement;
use rand::Rng;

/// Painter names used by generated placements.
pub const PAINTERS: [&str; 8] = [
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi",
];

/// Generate `count` random placements on `spec` with increasing timestamps.
pub fn random_placements(spec: CanvasSpec, count: usize) -> Vec<Placement> {
    let mut rng = rand::thread_rng();
    let palette = spec.palette_size.clamp(1, 256);
    (0..count)
        .map(|i| {
            Placement::at(
                i as f64,
                PAINTERS[rng.gen_range(0..PAINTERS.len())],
                rng.gen_range(0..spec.width),
                rng.gen_range(0..spec.height),
                rng.gen_range(0..palette) as u8,
            )
        })
        .collect()
}
