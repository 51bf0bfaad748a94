//! Property-based test generators using proptest.

use place_protocol::CanvasSpec;
use place_storage::Placement;
use proptest::prelude::*;

/// Strategy for painter names, including the empty system painter.
pub fn user_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        1 => Just(String::new()),
        4 => prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex"),
    ]
}

/// Strategy for a single placement on `spec`, timestamp left at zero.
pub fn placement_strategy(spec: CanvasSpec) -> impl Strategy<Value = Placement> {
    let palette = u8::try_from(spec.palette_size.saturating_sub(1)).unwrap_or(u8::MAX);
    (
        user_name_strategy(),
        0..spec.width,
        0..spec.height,
        0..=palette,
    )
        .prop_map(|(user, x, y, color)| Placement::at(0.0, user, x, y, color))
}

/// Strategy for a placement history on `spec` with strictly increasing
/// timestamps.
pub fn placement_history_strategy(
    spec: CanvasSpec,
    max_len: usize,
) -> impl Strategy<Value = Vec<Placement>> {
    prop::collection::vec(placement_strategy(spec), 0..max_len).prop_map(|mut placements| {
        for (i, placement) in placements.iter_mut().enumerate() {
            placement.timestamp = (i + 1) as f64;
        }
        placements
    })
}

/// Strategy for client lines: well-formed commands, mangled casing and
/// spacing, and noise.
pub fn command_line_strategy() -> impl Strategy<Value = String> {
    let number = prop_oneof![any::<i64>(), -5i64..800].boxed();
    prop_oneof![
        Just("PING".to_string()),
        "[a-zA-Z0-9_-]{1,40}".prop_map(|t| format!("AUTH {t}")),
        (number.clone(), number.clone(), number.clone())
            .prop_map(|(x, y, c)| format!("place {x}  {y}\t{c}")),
        (number.clone(), number.clone(), number.clone(), number)
            .prop_map(|(a, b, c, d)| format!("CLEAR {a} {b} {c} {d}")),
        "[a-z]{1,12}".prop_map(|n| format!("BAN {n}")),
        any::<u32>().prop_map(|s| format!("SetCooldown {s}")),
        "\\PC{0,48}",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: CanvasSpec = CanvasSpec::new(12, 7, 5);

    proptest! {
        #[test]
        fn placements_are_on_canvas(p in placement_strategy(SPEC)) {
            prop_assert!(SPEC.index(p.x, p.y).is_some());
            prop_assert!(u16::from(p.color) < SPEC.palette_size);
        }

        #[test]
        fn history_timestamps_increase(history in placement_history_strategy(SPEC, 40)) {
            for pair in history.windows(2) {
                prop_assert!(pair[0].timestamp < pair[1].timestamp);
            }
        }
    }
}
