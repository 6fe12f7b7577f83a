//! Sliding-piece attacks: magic multiplication with a ray-walk reference.
//!
//! The magic tables are generated once at startup from a fixed-seed RNG, so
//! every run uses identical tables. `ray_rook_attacks`/`ray_bishop_attacks`
//! are the simple reference implementation used to fill the tables; the magic
//! lookup must agree with them on every (square, occupancy) pair.

use once_cell::sync::Lazy;
use rand::prelude::*;

const ROOK_DIRS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(isize, isize); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Walk the four rook rays, including the first blocker on each.
pub(crate) fn ray_rook_attacks(sq: usize, occ: u64) -> u64 {
    ray_attacks(sq, occ, &ROOK_DIRS)
}

/// Walk the four bishop rays, including the first blocker on each.
pub(crate) fn ray_bishop_attacks(sq: usize, occ: u64) -> u64 {
    ray_attacks(sq, occ, &BISHOP_DIRS)
}

fn ray_attacks(sq: usize, occ: u64, dirs: &[(isize, isize); 4]) -> u64 {
    let r0 = (sq / 8) as isize;
    let f0 = (sq % 8) as isize;
    let mut attacks = 0u64;
    for &(dr, df) in dirs {
        let mut r = r0 + dr;
        let mut f = f0 + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << ((r as usize) * 8 + f as usize);
            attacks |= bit;
            if occ & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// Relevant-blocker mask: the rays without their edge squares.
fn relevant_mask(sq: usize, dirs: &[(isize, isize); 4]) -> u64 {
    let r0 = (sq / 8) as isize;
    let f0 = (sq % 8) as isize;
    let mut mask = 0u64;
    for &(dr, df) in dirs {
        let mut r = r0 + dr;
        let mut f = f0 + df;
        // Stop before the edge square of the ray: a blocker there never
        // changes the attack set.
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << ((r as usize) * 8 + f as usize);
            r += dr;
            f += df;
        }
    }
    mask
}

/// One magic entry per square (Vantage-style layout).
struct MagicEntry {
    magic: u64,
    shift: u32,
    mask: u64,
    table: Box<[u64]>,
}

impl MagicEntry {
    #[inline]
    fn lookup(&self, occ: u64) -> u64 {
        let masked = occ & self.mask;
        let index = (masked.wrapping_mul(self.magic) >> self.shift) as usize;
        self.table[index]
    }
}

struct MagicTables {
    rook: [MagicEntry; 64],
    bishop: [MagicEntry; 64],
}

/// Enumerate all subsets of `mask` (carry-rippler), calling `f` on each.
fn for_each_subset(mask: u64, mut f: impl FnMut(u64)) {
    let mut subset = 0u64;
    loop {
        f(subset);
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            break;
        }
    }
}

/// Find a collision-free magic for one square by random trial.
fn find_magic(sq: usize, mask: u64, rng: &mut StdRng, rook: bool) -> MagicEntry {
    let bits = mask.count_ones();
    let shift = 64 - bits;
    let size = 1usize << bits;

    let reference = |occ: u64| {
        if rook {
            ray_rook_attacks(sq, occ)
        } else {
            ray_bishop_attacks(sq, occ)
        }
    };

    let mut table = vec![0u64; size].into_boxed_slice();
    loop {
        // Sparse candidates converge much faster than uniform ones.
        let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if (mask.wrapping_mul(magic) >> 56).count_ones() < 6 {
            continue;
        }

        table.iter_mut().for_each(|e| *e = 0);
        let mut ok = true;
        for_each_subset(mask, |occ| {
            if !ok {
                return;
            }
            let idx = (occ.wrapping_mul(magic) >> shift) as usize;
            let attacks = reference(occ);
            if table[idx] == 0 {
                table[idx] = attacks;
            } else if table[idx] != attacks {
                ok = false;
            }
        });

        if ok {
            return MagicEntry {
                magic,
                shift,
                mask,
                table,
            };
        }
    }
}

static TABLES: Lazy<MagicTables> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x5AB1_E000);
    let rook: [MagicEntry; 64] = std::array::from_fn(|sq| {
        let mask = relevant_mask(sq, &ROOK_DIRS);
        find_magic(sq, mask, &mut rng, true)
    });
    let bishop: [MagicEntry; 64] = std::array::from_fn(|sq| {
        let mask = relevant_mask(sq, &BISHOP_DIRS);
        find_magic(sq, mask, &mut rng, false)
    });
    MagicTables { rook, bishop }
});

/// Rook attacks from `sq` over `occ`, via magic lookup.
#[inline]
pub(crate) fn rook_attacks(sq: usize, occ: u64) -> u64 {
    TABLES.rook[sq].lookup(occ)
}

/// Bishop attacks from `sq` over `occ`, via magic lookup.
#[inline]
pub(crate) fn bishop_attacks(sq: usize, occ: u64) -> u64 {
    TABLES.bishop[sq].lookup(occ)
}

/// Queen attacks: rook | bishop.
#[inline]
pub(crate) fn queen_attacks(sq: usize, occ: u64) -> u64 {
    rook_attacks(sq, occ) | bishop_attacks(sq, occ)
}
