//! Late-move-reduction table and per-move adjustments.

use once_cell::sync::Lazy;

const TABLE_DEPTH: usize = 64;
const TABLE_MOVES: usize = 64;

/// Base reductions: `round(0.5 + ln(depth) * ln(move_count) / 2)`.
static LMR_TABLE: Lazy<[[i32; TABLE_MOVES]; TABLE_DEPTH]> = Lazy::new(|| {
    let mut table = [[0i32; TABLE_MOVES]; TABLE_DEPTH];
    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (count, cell) in row.iter_mut().enumerate().skip(1) {
            let r = 0.5 + (depth as f64).ln() * (count as f64).ln() / 2.0;
            *cell = (r.round() as i32).clamp(0, depth as i32 - 1);
        }
    }
    table
});

/// Inputs that shift the base reduction for one move.
#[derive(Clone, Copy, Debug, Default)]
pub struct LmrAdjustments {
    pub is_pv: bool,
    pub is_capture: bool,
    pub gives_check: bool,
    /// Butterfly history score for the move.
    pub history: i32,
    /// Continuation history score (consulted from depth 5 on).
    pub continuation: i32,
}

/// Final reduction for a move, clamped to `[0, depth - 2]`.
#[must_use]
pub fn reduction(depth: i32, move_count: usize, adjust: LmrAdjustments) -> i32 {
    if depth <= 0 {
        return 0;
    }
    let d = (depth as usize).min(TABLE_DEPTH - 1);
    let m = move_count.min(TABLE_MOVES - 1);
    let mut red = LMR_TABLE[d][m];

    if adjust.is_pv {
        red -= 1;
    }
    if adjust.is_capture {
        red -= 1;
    }
    if adjust.gives_check {
        red -= 1;
    }

    red += match adjust.history {
        h if h > 1000 => -2,
        h if h > 500 => -1,
        h if h < -500 => 2,
        h if h < -200 => 1,
        _ => 0,
    };

    if depth >= 5 {
        red += match adjust.continuation {
            c if c > 800 => -1,
            c if c < -400 => 1,
            _ => 0,
        };
    }

    red.clamp(0, (depth - 2).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_grows_with_depth_and_count() {
        let base = LmrAdjustments::default();
        let shallow = reduction(4, 8, base);
        let deep = reduction(16, 8, base);
        assert!(deep >= shallow);
        let early = reduction(16, 4, base);
        let late = reduction(16, 40, base);
        assert!(late >= early);
    }

    #[test]
    fn test_reduction_nonnegative_and_bounded() {
        for depth in 0..24 {
            for count in 0..48 {
                let r = reduction(
                    depth,
                    count,
                    LmrAdjustments {
                        history: -2000,
                        continuation: -2000,
                        ..Default::default()
                    },
                );
                assert!(r >= 0);
                assert!(r <= (depth - 2).max(0));
            }
        }
    }

    #[test]
    fn test_pv_and_checks_reduce_less() {
        let base = LmrAdjustments::default();
        let r_base = reduction(12, 20, base);
        let r_pv = reduction(
            12,
            20,
            LmrAdjustments {
                is_pv: true,
                ..base
            },
        );
        let r_check = reduction(
            12,
            20,
            LmrAdjustments {
                gives_check: true,
                ..base
            },
        );
        assert!(r_pv <= r_base);
        assert!(r_check <= r_base);
    }

    #[test]
    fn test_history_tiers() {
        let at = |history: i32| {
            reduction(
                12,
                20,
                LmrAdjustments {
                    history,
                    ..Default::default()
                },
            )
        };
        assert!(at(1500) <= at(600));
        assert!(at(600) <= at(0));
        assert!(at(0) <= at(-300));
        assert!(at(-300) <= at(-800));
    }
}
