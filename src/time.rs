//! Phase-aware search time allocation.
//!
//! Turns the UCI clock into a budget with soft and hard limits. The budget
//! shrinks when the engine is winning comfortably or the game is young, and
//! stretches when it is losing or deep in an endgame. `SearchClock` carries
//! the resulting deadlines into the search and can be re-armed while a
//! search runs, which is how `ponderhit` turns a free-running ponder search
//! into a clocked one.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Time to reserve per move for I/O latency and scheduling noise.
#[derive(Debug, Clone, Copy)]
pub struct TimeConfig {
    pub move_overhead_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        TimeConfig {
            move_overhead_ms: 50,
        }
    }
}

/// Time control for one `go` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeControl {
    /// No time limit (`go infinite`, ponder, or depth-limited searches).
    #[default]
    Infinite,
    /// Exact time for this move.
    MoveTime { time_ms: u64 },
    /// Remaining clock plus increment, optionally with moves to go.
    Incremental {
        remaining_ms: u64,
        increment_ms: u64,
        moves_to_go: Option<u64>,
    },
}

impl TimeControl {
    #[must_use]
    pub fn incremental(remaining: Duration, increment: Duration, moves_to_go: Option<u64>) -> Self {
        TimeControl::Incremental {
            remaining_ms: remaining.as_millis() as u64,
            increment_ms: increment.as_millis() as u64,
            moves_to_go,
        }
    }
}

/// The computed budget for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAllocation {
    /// Hard budget; the search never exceeds this.
    pub allocated_ms: u64,
    /// The unclamped target the scaling produced.
    pub optimal_ms: u64,
    /// Upper bound for a single extended iteration.
    pub max_ms: u64,
    /// Emergency floor when the clock runs dry.
    pub panic_ms: u64,
}

impl TimeAllocation {
    /// Soft limit: iterations stop starting past this point.
    #[must_use]
    pub fn soft_ms(&self) -> u64 {
        self.allocated_ms * 80 / 100
    }

    /// Hard limit: the search aborts mid-iteration here.
    #[must_use]
    pub fn hard_ms(&self) -> u64 {
        self.allocated_ms
    }
}

/// Deadline holder shared between the search and the protocol thread.
///
/// A normal `go` arms the deadlines immediately. A pondering search starts
/// unarmed (no deadlines at all); on `ponderhit` the protocol thread arms
/// the planned budget from that instant and the running search simply
/// starts honoring it at its next poll.
pub struct SearchClock {
    start: Mutex<Instant>,
    soft_deadline: Mutex<Option<Instant>>,
    hard_deadline: Mutex<Option<Instant>>,
}

impl SearchClock {
    /// A clock with no deadlines (`go infinite`, pondering).
    #[must_use]
    pub fn infinite() -> Self {
        SearchClock {
            start: Mutex::new(Instant::now()),
            soft_deadline: Mutex::new(None),
            hard_deadline: Mutex::new(None),
        }
    }

    /// A clock whose deadlines start running now.
    #[must_use]
    pub fn armed(allocation: Option<TimeAllocation>) -> Self {
        let clock = SearchClock::infinite();
        clock.arm(allocation);
        clock
    }

    /// (Re)start the deadlines from this instant. `None` clears them.
    pub fn arm(&self, allocation: Option<TimeAllocation>) {
        let now = Instant::now();
        let deadline = |ms: u64| now.checked_add(Duration::from_millis(ms));
        *self.start.lock() = now;
        *self.soft_deadline.lock() = allocation.and_then(|a| deadline(a.soft_ms()));
        *self.hard_deadline.lock() = allocation.and_then(|a| deadline(a.hard_ms()));
    }

    /// Time since the clock was last armed (or created).
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.lock().elapsed()
    }

    /// Past the point where new iterations should start?
    #[must_use]
    pub fn past_soft(&self) -> bool {
        self.soft_deadline
            .lock()
            .map_or(false, |d| Instant::now() >= d)
    }

    /// Past the point where the search must abort mid-iteration?
    #[must_use]
    pub fn past_hard(&self) -> bool {
        self.hard_deadline
            .lock()
            .map_or(false, |d| Instant::now() >= d)
    }
}

/// Compute the budget for one move.
///
/// `previous_score` is the last completed iteration's score (centipawns,
/// engine perspective); `phase` is the evaluator's 0..=256 estimate.
#[must_use]
pub fn allocate(
    control: TimeControl,
    config: &TimeConfig,
    previous_score: i32,
    phase: i32,
) -> Option<TimeAllocation> {
    match control {
        TimeControl::Infinite => None,
        TimeControl::MoveTime { time_ms } => {
            let t = time_ms.max(1);
            Some(TimeAllocation {
                allocated_ms: t,
                optimal_ms: t,
                max_ms: t,
                panic_ms: t,
            })
        }
        TimeControl::Incremental {
            remaining_ms,
            increment_ms,
            moves_to_go,
        } => {
            let remaining = remaining_ms.saturating_sub(config.move_overhead_ms).max(1);
            Some(incremental_allocation(
                remaining,
                increment_ms,
                moves_to_go,
                previous_score,
                phase,
            ))
        }
    }
}

fn incremental_allocation(
    remaining: u64,
    increment: u64,
    moves_to_go: Option<u64>,
    previous_score: i32,
    phase: i32,
) -> TimeAllocation {
    let mut base = match moves_to_go {
        Some(mtg) => remaining / (mtg + 3) + increment * 3 / 4,
        None if increment == 0 => remaining / 40,
        None => remaining / 33 + increment * 3 / 4,
    };

    // Game-phase scaling: spend less in the opening, more in endgames.
    if phase < 64 {
        base = base * 12 / 10;
    } else if phase > 200 {
        base = base * 8 / 10;
    }

    // Score scaling: bank time when winning, dig in when worse.
    let s = previous_score;
    if s > 300 {
        base = base * 7 / 10;
    } else if s > 100 {
        base = base * 85 / 100;
    } else if s < -300 {
        base = base * 14 / 10;
    } else if s < -100 {
        base = base * 12 / 10;
    }

    // Emergency clock handling.
    let low_on_increment = increment > 0 && remaining < 30 * increment;
    if low_on_increment || remaining < 30_000 {
        base = remaining / 10;
    }

    let optimal = base.max(1);
    let allocated = optimal.min(remaining / 2).max(1);
    let max = (optimal * 3).min(remaining / 4).max(allocated);
    let panic = (optimal / 3).max(100);

    TimeAllocation {
        allocated_ms: allocated,
        optimal_ms: optimal,
        max_ms: max,
        panic_ms: panic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TimeConfig {
        TimeConfig {
            move_overhead_ms: 0,
        }
    }

    #[test]
    fn test_infinite_has_no_budget() {
        assert!(allocate(TimeControl::Infinite, &config(), 0, 128).is_none());
    }

    #[test]
    fn test_movetime_is_exact() {
        let alloc = allocate(TimeControl::MoveTime { time_ms: 5000 }, &config(), 0, 128).unwrap();
        assert_eq!(alloc.allocated_ms, 5000);
        assert_eq!(alloc.hard_ms(), 5000);
        assert_eq!(alloc.soft_ms(), 4000);
    }

    #[test]
    fn test_incremental_with_moves_to_go() {
        let control = TimeControl::Incremental {
            remaining_ms: 60_000,
            increment_ms: 0,
            moves_to_go: Some(17),
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        // 60000/(17+3) = 3000, inside the emergency-free region? remaining
        // is above 30s so the plain formula applies.
        assert_eq!(alloc.optimal_ms, 3000);
        assert!(alloc.allocated_ms <= 30_000);
    }

    #[test]
    fn test_sudden_death_uses_fortieth() {
        let control = TimeControl::Incremental {
            remaining_ms: 400_000,
            increment_ms: 0,
            moves_to_go: None,
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert_eq!(alloc.optimal_ms, 10_000);
    }

    #[test]
    fn test_endgame_spends_more() {
        let control = TimeControl::Incremental {
            remaining_ms: 400_000,
            increment_ms: 0,
            moves_to_go: None,
        };
        let mid = allocate(control, &config(), 0, 128).unwrap();
        let end = allocate(control, &config(), 0, 32).unwrap();
        let opening = allocate(control, &config(), 0, 256).unwrap();
        assert!(end.optimal_ms > mid.optimal_ms);
        assert!(opening.optimal_ms < mid.optimal_ms);
    }

    #[test]
    fn test_winning_spends_less() {
        let control = TimeControl::Incremental {
            remaining_ms: 400_000,
            increment_ms: 0,
            moves_to_go: None,
        };
        let level = allocate(control, &config(), 0, 128).unwrap();
        let winning = allocate(control, &config(), 400, 128).unwrap();
        let losing = allocate(control, &config(), -400, 128).unwrap();
        assert!(winning.optimal_ms < level.optimal_ms);
        assert!(losing.optimal_ms > level.optimal_ms);
    }

    #[test]
    fn test_emergency_low_clock() {
        let control = TimeControl::Incremental {
            remaining_ms: 8_000,
            increment_ms: 0,
            moves_to_go: None,
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert_eq!(alloc.optimal_ms, 800);
        assert!(alloc.allocated_ms <= 4_000);
    }

    #[test]
    fn test_emergency_low_vs_increment() {
        let control = TimeControl::Incremental {
            remaining_ms: 50_000,
            increment_ms: 2_000,
            moves_to_go: None,
        };
        // remaining < 30 * increment triggers the /10 rule.
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert_eq!(alloc.optimal_ms, 5_000);
    }

    #[test]
    fn test_allocated_capped_to_half_remaining() {
        let control = TimeControl::Incremental {
            remaining_ms: 1_000,
            increment_ms: 10_000,
            moves_to_go: None,
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert!(alloc.allocated_ms <= 500);
    }

    #[test]
    fn test_panic_floor() {
        let control = TimeControl::Incremental {
            remaining_ms: 600_000,
            increment_ms: 0,
            moves_to_go: Some(40),
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert!(alloc.panic_ms >= 100);
        assert_eq!(alloc.panic_ms, alloc.optimal_ms / 3);
    }

    #[test]
    fn test_zero_remaining_does_not_panic() {
        let control = TimeControl::Incremental {
            remaining_ms: 0,
            increment_ms: 0,
            moves_to_go: None,
        };
        let alloc = allocate(control, &config(), 0, 128).unwrap();
        assert!(alloc.allocated_ms >= 1);
    }

    // ========================================================================
    // SearchClock
    // ========================================================================

    #[test]
    fn test_infinite_clock_never_expires() {
        let clock = SearchClock::infinite();
        assert!(!clock.past_soft());
        assert!(!clock.past_hard());
    }

    #[test]
    fn test_armed_clock_expires() {
        let alloc = TimeAllocation {
            allocated_ms: 1,
            optimal_ms: 1,
            max_ms: 1,
            panic_ms: 1,
        };
        let clock = SearchClock::armed(Some(alloc));
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.past_soft());
        assert!(clock.past_hard());
    }

    #[test]
    fn test_unarmed_clock_arms_later() {
        // Ponder flow: no deadlines until armed, then they start from the
        // arming instant.
        let clock = SearchClock::infinite();
        std::thread::sleep(Duration::from_millis(2));
        assert!(!clock.past_hard());

        let alloc = TimeAllocation {
            allocated_ms: 1,
            optimal_ms: 1,
            max_ms: 1,
            panic_ms: 1,
        };
        clock.arm(Some(alloc));
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.past_hard());
    }

    #[test]
    fn test_arm_none_clears_deadlines() {
        let alloc = TimeAllocation {
            allocated_ms: 1,
            optimal_ms: 1,
            max_ms: 1,
            panic_ms: 1,
        };
        let clock = SearchClock::armed(Some(alloc));
        clock.arm(None);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!clock.past_soft());
        assert!(!clock.past_hard());
    }
}
