//! Shared transposition table.
//!
//! Clusters of four 16-byte slots, one cluster per cache line. Slots are
//! pairs of `AtomicU64`: the packed entry data and the position key XORed
//! with that data. Readers re-derive the key from both words, so a torn
//! write can never validate; no locks are taken anywhere. Writers race on
//! the victim slot and the last write wins.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::board::{Move, MOVE_NONE};
use crate::search::constants::SCORE_MATE;

/// Entry bound kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    None = 0,
    Lower = 1,
    Upper = 2,
    Exact = 3,
}

impl Bound {
    fn from_bits(bits: u64) -> Self {
        match bits & 0x3 {
            1 => Bound::Lower,
            2 => Bound::Upper,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }
}

/// Decoded view of one table entry.
#[derive(Clone, Copy, Debug)]
pub struct TtEntry {
    pub score: i32,
    pub best_move: Move,
    pub depth: i32,
    pub bound: Bound,
    pub generation: u8,
}

// Packed data layout (low to high):
//   move 18 bits | score 16 bits | depth 16 bits | bound 2 bits | gen 8 bits
const MOVE_BITS: u32 = 18;
const SCORE_SHIFT: u32 = MOVE_BITS;
const DEPTH_SHIFT: u32 = SCORE_SHIFT + 16;
const BOUND_SHIFT: u32 = DEPTH_SHIFT + 16;
const GEN_SHIFT: u32 = BOUND_SHIFT + 2;

fn pack(entry: &TtEntry) -> u64 {
    let mv = u64::from(entry.best_move.as_u32()) & ((1 << MOVE_BITS) - 1);
    let score = u64::from(entry.score as i16 as u16);
    let depth = u64::from(entry.depth as i16 as u16);
    mv | score << SCORE_SHIFT
        | depth << DEPTH_SHIFT
        | (entry.bound as u64) << BOUND_SHIFT
        | u64::from(entry.generation) << GEN_SHIFT
}

fn unpack(data: u64) -> TtEntry {
    TtEntry {
        best_move: Move::from_u32((data & ((1 << MOVE_BITS) - 1)) as u32),
        score: i32::from((data >> SCORE_SHIFT) as u16 as i16),
        depth: i32::from((data >> DEPTH_SHIFT) as u16 as i16),
        bound: Bound::from_bits(data >> BOUND_SHIFT),
        generation: (data >> GEN_SHIFT) as u8,
    }
}

#[derive(Default)]
struct Slot {
    /// `key ^ data`; zero together with zero data marks an empty slot.
    key: AtomicU64,
    data: AtomicU64,
}

const CLUSTER_SLOTS: usize = 4;

#[repr(align(64))]
#[derive(Default)]
struct Cluster {
    slots: [Slot; CLUSTER_SLOTS],
}

/// The table. Sized to a power-of-two number of clusters; bucket index is
/// the low bits of the key.
pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    mask: usize,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Create a table of roughly `size_mb` megabytes.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let cluster_size = std::mem::size_of::<Cluster>();
        let requested = (size_mb.max(1) * 1024 * 1024) / cluster_size;
        let num_clusters = requested.next_power_of_two().max(1024);
        let num_clusters = if num_clusters > requested {
            num_clusters / 2
        } else {
            num_clusters
        }
        .max(1024);

        log::debug!(
            "allocating transposition table: {} clusters ({} MB)",
            num_clusters,
            num_clusters * cluster_size / (1024 * 1024)
        );

        let mut clusters = Vec::new();
        clusters.resize_with(num_clusters, Cluster::default);
        TranspositionTable {
            clusters: clusters.into_boxed_slice(),
            mask: num_clusters - 1,
            generation: AtomicU8::new(0),
        }
    }

    #[inline]
    fn cluster(&self, key: u64) -> &Cluster {
        &self.clusters[(key as usize) & self.mask]
    }

    /// Bump the age tag. Called once per root search.
    pub fn new_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn current_generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Wipe every entry (`ucinewgame`).
    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for slot in &cluster.slots {
                slot.key.store(0, Ordering::Relaxed);
                slot.data.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Look up `key`. Returns the decoded entry with mate scores translated
    /// back to be relative to `ply`. Refreshes the entry's age on hit.
    #[must_use]
    pub fn probe(&self, key: u64, ply: usize) -> Option<TtEntry> {
        let cluster = self.cluster(key);
        for slot in &cluster.slots {
            let data = slot.data.load(Ordering::Relaxed);
            if data == 0 {
                continue;
            }
            if slot.key.load(Ordering::Relaxed) ^ data != key {
                continue;
            }
            let mut entry = unpack(data);
            let current = self.current_generation();
            if entry.generation != current {
                entry.generation = current;
                let refreshed = pack(&entry);
                slot.data.store(refreshed, Ordering::Relaxed);
                slot.key.store(key ^ refreshed, Ordering::Relaxed);
            }
            entry.score = score_from_tt(entry.score, ply);
            return Some(entry);
        }
        None
    }

    /// Store an entry, normalizing mate scores by `ply`.
    pub fn store(&self, key: u64, score: i32, best_move: Move, depth: i32, bound: Bound, ply: usize) {
        let generation = self.current_generation();
        let cluster = self.cluster(key);
        let score = score_to_tt(score, ply);

        // Same-key slot: update in place when the new data is at least as
        // deep, or upgrades a non-exact bound to exact.
        for slot in &cluster.slots {
            let data = slot.data.load(Ordering::Relaxed);
            if data == 0 || slot.key.load(Ordering::Relaxed) ^ data != key {
                continue;
            }
            let existing = unpack(data);
            let upgrade = bound == Bound::Exact && existing.bound != Bound::Exact;
            if depth >= existing.depth || upgrade {
                let entry = TtEntry {
                    score,
                    best_move: if best_move.is_none() {
                        existing.best_move
                    } else {
                        best_move
                    },
                    depth,
                    bound,
                    generation,
                };
                let packed = pack(&entry);
                slot.data.store(packed, Ordering::Relaxed);
                slot.key.store(key ^ packed, Ordering::Relaxed);
            }
            return;
        }

        // Otherwise evict the slot with the lowest replacement score.
        let mut victim = 0usize;
        let mut victim_score = i32::MAX;
        let mut fallback = 0usize;
        let mut fallback_score = i32::MAX;
        for (idx, slot) in cluster.slots.iter().enumerate() {
            let data = slot.data.load(Ordering::Relaxed);
            let (replace_score, protected) = if data == 0 {
                (-1000, false)
            } else {
                let entry = unpack(data);
                let age = generation.wrapping_sub(entry.generation);
                let s = entry.depth * 4
                    + if entry.bound == Bound::Exact { 16 } else { 0 }
                    - i32::from(age) * 2;
                // A fresh exact entry well beyond the incoming depth is not
                // displaced by a bound-only write if any alternative exists.
                let protected = bound != Bound::Exact
                    && entry.bound == Bound::Exact
                    && age == 0
                    && entry.depth >= depth + 4;
                (s, protected)
            };
            if replace_score < fallback_score {
                fallback_score = replace_score;
                fallback = idx;
            }
            if !protected && replace_score < victim_score {
                victim_score = replace_score;
                victim = idx;
            }
        }
        let chosen = if victim_score == i32::MAX { fallback } else { victim };

        let entry = TtEntry {
            score,
            best_move,
            depth,
            bound,
            generation,
        };
        let packed = pack(&entry);
        let slot = &cluster.slots[chosen];
        slot.data.store(packed, Ordering::Relaxed);
        slot.key.store(key ^ packed, Ordering::Relaxed);
    }

    /// Best move recorded for `key`, regardless of entry depth.
    #[must_use]
    pub fn best_move(&self, key: u64) -> Move {
        let cluster = self.cluster(key);
        for slot in &cluster.slots {
            let data = slot.data.load(Ordering::Relaxed);
            if data != 0 && slot.key.load(Ordering::Relaxed) ^ data == key {
                return unpack(data).best_move;
            }
        }
        MOVE_NONE
    }

    /// Hint the CPU to pull the cluster for `key` into cache.
    #[inline]
    pub fn prefetch(&self, key: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            let cluster: *const Cluster = self.cluster(key);
            std::arch::x86_64::_mm_prefetch(cluster.cast::<i8>(), std::arch::x86_64::_MM_HINT_T0);
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = key;
        }
    }

    /// Occupancy in per-mille of current-generation entries, sampled.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let generation = self.current_generation();
        let sample = self.clusters.len().min(250);
        let mut filled = 0u32;
        for cluster in self.clusters.iter().take(sample) {
            for slot in &cluster.slots {
                let data = slot.data.load(Ordering::Relaxed);
                if data != 0 && unpack(data).generation == generation {
                    filled += 1;
                }
            }
        }
        filled * 1000 / (sample as u32 * CLUSTER_SLOTS as u32)
    }
}

/// Mate scores are stored relative to the probing node so the same entry
/// reads correctly from any ply.
fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score > SCORE_MATE - 1000 {
        score + ply as i32
    } else if score < -(SCORE_MATE - 1000) {
        score - ply as i32
    } else {
        score
    }
}

fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score > SCORE_MATE - 1000 {
        score - ply as i32
    } else if score < -(SCORE_MATE - 1000) {
        score + ply as i32
    } else {
        score
    }
}
