/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::OnceLock;

use super::{Bitboard, Color, Square, XoShiRo};

/// Deltas for the movement of the Queen (and King).
const QUEEN_DELTAS: [(i8, i8); 8] = [
    /* Rook */
    (1, 0),
    (0, -1),
    (-1, 0),
    (0, 1),
    /* Bishop */
    (1, 1),
    (1, -1),
    (-1, -1),
    (-1, 1),
];

/// Deltas for the movement of the Rook.
const ROOK_DELTAS: [(i8, i8); 4] = [
    QUEEN_DELTAS[0],
    QUEEN_DELTAS[1],
    QUEEN_DELTAS[2],
    QUEEN_DELTAS[3],
];

/// Deltas for the movement of the Bishop.
const BISHOP_DELTAS: [(i8, i8); 4] = [
    QUEEN_DELTAS[4],
    QUEEN_DELTAS[5],
    QUEEN_DELTAS[6],
    QUEEN_DELTAS[7],
];

/// Deltas for the movement of the Knight.
const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (1, -2),
    (2, 1),
    (2, -1),
    (-1, 2),
    (-1, -2),
    (-2, 1),
    (-2, -1),
];

const KNIGHT_ATTACKS: [Bitboard; Square::COUNT] = generate_leaper_mobility(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; Square::COUNT] = generate_leaper_mobility(&QUEEN_DELTAS);
const ROOK_RAYS: [Bitboard; Square::COUNT] = generate_rider_mobility(&ROOK_DELTAS);
const BISHOP_RAYS: [Bitboard; Square::COUNT] = generate_rider_mobility(&BISHOP_DELTAS);
const WHITE_PAWN_ATTACKS: [Bitboard; Square::COUNT] = generate_pawn_attacks(Color::White);
const BLACK_PAWN_ATTACKS: [Bitboard; Square::COUNT] = generate_pawn_attacks(Color::Black);
const WHITE_PAWN_PUSHES: [Bitboard; Square::COUNT] = generate_pawn_pushes(Color::White);
const BLACK_PAWN_PUSHES: [Bitboard; Square::COUNT] = generate_pawn_pushes(Color::Black);

/// Squares strictly between two aligned squares (exclusive of both).
///
/// Empty if the squares are not on a common rank, file, or diagonal.
const RAY_BETWEEN: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut rays = [[Bitboard::EMPTY; Square::COUNT]; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let from = Square::from_index_unchecked(i);
        let mut d = 0;
        while d < QUEEN_DELTAS.len() {
            let (df, dr) = QUEEN_DELTAS[d];
            let mut between = Bitboard::EMPTY;
            let mut to = from;

            while let Some(next) = to.offset(df, dr) {
                rays[from.index()][next.index()] = between;
                between = between.or(next.bitboard());
                to = next;
            }

            d += 1;
        }

        i += 1;
    }

    rays
};

/// The full line (edge to edge) through two aligned squares.
///
/// Empty if the squares are not on a common rank, file, or diagonal.
const RAY_CONTAINING: [[Bitboard; Square::COUNT]; Square::COUNT] = {
    let mut rays = [[Bitboard::EMPTY; Square::COUNT]; Square::COUNT];

    // Four axes; each covers a delta and its negation.
    const AXES: [(i8, i8); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

    let mut i = 0;
    while i < Square::COUNT {
        let from = Square::from_index_unchecked(i);
        let mut axis = 0;
        while axis < AXES.len() {
            let (df, dr) = AXES[axis];

            let mut line = from.bitboard();
            let mut to = from;
            while let Some(next) = to.offset(df, dr) {
                line = line.or(next.bitboard());
                to = next;
            }
            to = from;
            while let Some(next) = to.offset(-df, -dr) {
                line = line.or(next.bitboard());
                to = next;
            }

            // Every square on this line shares it with `from`.
            let mut j = 0;
            while j < Square::COUNT {
                let other = Square::from_index_unchecked(j);
                if from.index() != other.index() && line.contains(other) {
                    rays[from.index()][other.index()] = line;
                }
                j += 1;
            }

            axis += 1;
        }

        i += 1;
    }

    rays
};

/// Generates the mobility of "leaper" pieces (Knight, King) for every square.
const fn generate_leaper_mobility(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut movement = Bitboard::EMPTY;

        let mut d = 0;
        while d < deltas.len() {
            let (df, dr) = deltas[d];
            if let Some(shifted) = square.offset(df, dr) {
                movement = movement.or(shifted.bitboard());
            }
            d += 1;
        }

        mobility[i] = movement;
        i += 1;
    }

    mobility
}

/// Generates the unobstructed mobility of "rider" pieces (Rook, Bishop) for every square.
const fn generate_rider_mobility(deltas: &[(i8, i8)]) -> [Bitboard; Square::COUNT] {
    let mut mobility = [Bitboard::EMPTY; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let mut movement = Bitboard::EMPTY;

        let mut d = 0;
        while d < deltas.len() {
            let (df, dr) = deltas[d];
            let mut ray = square;
            while let Some(shifted) = ray.offset(df, dr) {
                movement = movement.or(shifted.bitboard());
                ray = shifted;
            }
            d += 1;
        }

        mobility[i] = movement;
        i += 1;
    }

    mobility
}

/// Generates the capture mobility of pawns: one square diagonally forward,
/// masked at the board edges.
const fn generate_pawn_attacks(color: Color) -> [Bitboard; Square::COUNT] {
    let mut attacks = [Bitboard::EMPTY; Square::COUNT];

    let mut i = 0;
    while i < Square::COUNT {
        let bb = Square::from_index_unchecked(i).bitboard().forward_by(color, 1);
        attacks[i] = bb.east().or(bb.west());
        i += 1;
    }

    attacks
}

/// Generates the push mobility of pawns: one square forward, or two from the
/// pawn's starting rank.
const fn generate_pawn_pushes(color: Color) -> [Bitboard; Square::COUNT] {
    let mut pushes = [Bitboard::EMPTY; Square::COUNT];

    let start_rank = match color {
        Color::White => 1,
        Color::Black => 6,
    };

    let mut i = 0;
    while i < Square::COUNT {
        let square = Square::from_index_unchecked(i);
        let bb = square.bitboard();

        pushes[i] = bb.forward_by(color, 1);
        if square.rank().inner() == start_rank {
            pushes[i] = pushes[i].or(bb.forward_by(color, 2));
        }

        i += 1;
    }

    pushes
}

/// Squares strictly between `from` and `to` (exclusive), or empty if they
/// do not share a rank, file, or diagonal.
///
/// # Example
/// ```
/// # use skink::*;
/// skink::init();
/// assert_eq!(ray_between(Square::A1, Square::A4), Square::A2.bitboard() | Square::A3.bitboard());
/// assert_eq!(ray_between(Square::A1, Square::B3), Bitboard::EMPTY);
/// ```
#[inline(always)]
pub const fn ray_between(from: Square, to: Square) -> Bitboard {
    RAY_BETWEEN[from.index()][to.index()]
}

/// The full board-spanning line through `from` and `to`, or empty if they
/// do not share a rank, file, or diagonal.
///
/// # Example
/// ```
/// # use skink::*;
/// skink::init();
/// assert_eq!(ray_containing(Square::A3, Square::A5), Bitboard::FILE_A);
/// ```
#[inline(always)]
pub const fn ray_containing(from: Square, to: Square) -> Bitboard {
    RAY_CONTAINING[from.index()][to.index()]
}

/// Attacks of a knight on `square`.
#[inline(always)]
pub const fn knight_attacks(square: Square) -> Bitboard {
    KNIGHT_ATTACKS[square.index()]
}

/// Attacks of a king on `square`.
#[inline(always)]
pub const fn king_attacks(square: Square) -> Bitboard {
    KING_ATTACKS[square.index()]
}

/// Capture targets of a `color` pawn on `square`.
#[inline(always)]
pub const fn pawn_attacks(square: Square, color: Color) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[square.index()],
        Color::Black => BLACK_PAWN_ATTACKS[square.index()],
    }
}

/// Push targets of a `color` pawn on `square`, ignoring blockers.
#[inline(always)]
pub const fn pawn_pushes(square: Square, color: Color) -> Bitboard {
    match color {
        Color::White => WHITE_PAWN_PUSHES[square.index()],
        Color::Black => BLACK_PAWN_PUSHES[square.index()],
    }
}

/// Unobstructed rook rays from `square`. Used for pin and check detection.
#[inline(always)]
pub const fn rook_rays(square: Square) -> Bitboard {
    ROOK_RAYS[square.index()]
}

/// Unobstructed bishop rays from `square`. Used for pin and check detection.
#[inline(always)]
pub const fn bishop_rays(square: Square) -> Bitboard {
    BISHOP_RAYS[square.index()]
}

/// Attacks of a rook on `square`, with `blockers` stopping each ray.
///
/// The first blocker on each ray is included, so captures of it are encoded.
#[inline(always)]
pub fn rook_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    let tables = magics();
    tables.rook_table[tables.rook_magics[square.index()].index_for(blockers)]
}

/// Attacks of a bishop on `square`, with `blockers` stopping each ray.
#[inline(always)]
pub fn bishop_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    let tables = magics();
    tables.bishop_table[tables.bishop_magics[square.index()].index_for(blockers)]
}

/// Attacks of a queen on `square`, with `blockers` stopping each ray.
#[inline(always)]
pub fn queen_attacks(square: Square, blockers: Bitboard) -> Bitboard {
    rook_attacks(square, blockers) | bishop_attacks(square, blockers)
}

/// Process-wide slider attack tables, built on first use.
static MAGICS: OnceLock<SliderTables> = OnceLock::new();

/// One-shot initialization of the magic slider tables.
///
/// Idempotent; every slider query also routes through the same `OnceLock`,
/// so calling this up front merely moves the construction cost to startup.
#[inline(always)]
pub fn init() {
    let _ = magics();
}

#[inline(always)]
fn magics() -> &'static SliderTables {
    MAGICS.get_or_init(SliderTables::build)
}

/// Everything needed for a [magic bitboard](https://www.chessprogramming.org/Magic_Bitboards)
/// slider attack lookup on one square.
struct Magic {
    /// Mask of the relevant blocker squares for this square.
    mask: Bitboard,
    /// Multiplier that perfectly hashes every subset of `mask`.
    magic: u64,
    /// `64 - popcount(mask)`; shifts the hash down to an index.
    shift: u8,
    /// Start of this square's slice of the shared attack table.
    offset: usize,
}

impl Magic {
    /// Index into the shared attack table for the given blocker set.
    #[inline(always)]
    fn index_for(&self, blockers: Bitboard) -> usize {
        let relevant = blockers.inner() & self.mask.inner();
        self.offset + (relevant.wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Dense rook and bishop attack tables indexed through [`Magic`] entries.
struct SliderTables {
    rook_magics: [Magic; Square::COUNT],
    bishop_magics: [Magic; Square::COUNT],
    rook_table: Vec<Bitboard>,
    bishop_table: Vec<Bitboard>,
}

impl SliderTables {
    /// Build the full slider tables, discovering a magic number for every
    /// square by trial search.
    ///
    /// The PRNG is seeded deterministically, so the discovered magics (and
    /// thus the table layout) are identical on every run.
    fn build() -> Self {
        let mut prng = XoShiRo::new();

        let (rook_magics, rook_table) = build_for(&ROOK_DELTAS, &mut prng);
        let (bishop_magics, bishop_table) = build_for(&BISHOP_DELTAS, &mut prng);

        Self {
            rook_magics,
            bishop_magics,
            rook_table,
            bishop_table,
        }
    }
}

/// Build magic entries and the dense attack table for one slider kind.
fn build_for(
    deltas: &[(i8, i8)],
    prng: &mut XoShiRo,
) -> ([Magic; Square::COUNT], Vec<Bitboard>) {
    let mut table = Vec::new();

    let magics = std::array::from_fn(|i| {
        let square = Square::from_index_unchecked(i);
        let mask = relevant_blockers(square, deltas);
        let bits = mask.population();
        let shift = (64 - bits) as u8;
        let size = 1usize << bits;
        let offset = table.len();

        // Enumerate every blocker subset of the mask (carry-rippler) along
        // with its ray-walked reference attacks.
        let mut subsets = Vec::with_capacity(size);
        let mut blockers = Bitboard::EMPTY;
        loop {
            subsets.push((blockers, sliding_attacks(square, blockers, deltas)));
            blockers = Bitboard::new(
                blockers.inner().wrapping_sub(mask.inner()) & mask.inner(),
            );
            if blockers.is_empty() {
                break;
            }
        }

        // Try sparse random candidates until one hashes every subset without
        // a destructive collision.
        let mut slice = vec![Bitboard::EMPTY; size];
        let magic = 'search: loop {
            let candidate = prng.next_sparse_u64();

            // Cheap rejection: the hash of the full mask must mix the high bits.
            if (mask.inner().wrapping_mul(candidate) >> 56).count_ones() < 6 {
                continue;
            }

            slice.iter_mut().for_each(|entry| *entry = Bitboard::EMPTY);

            for &(blockers, attacks) in &subsets {
                let index = (blockers.inner().wrapping_mul(candidate) >> shift) as usize;
                if slice[index].is_empty() {
                    slice[index] = attacks;
                } else if slice[index] != attacks {
                    // Destructive collision; try the next candidate.
                    continue 'search;
                }
            }

            break candidate;
        };

        table.extend_from_slice(&slice);

        Magic {
            mask,
            magic,
            shift,
            offset,
        }
    });

    (magics, table)
}

/// The mask of blocker squares that affect a slider's attacks from `square`.
///
/// The last square of each ray is excluded: a blocker there cannot shorten
/// the ray any further.
fn relevant_blockers(square: Square, deltas: &[(i8, i8)]) -> Bitboard {
    let mut mask = Bitboard::EMPTY;

    for &(df, dr) in deltas {
        let mut current = square;
        while let Some(next) = current.offset(df, dr) {
            // Only include `next` if the ray continues past it.
            if next.offset(df, dr).is_some() {
                mask |= next;
            }
            current = next;
        }
    }

    mask
}

/// Reference slider attacks computed by ray walking, stopping at (and
/// including) the first blocker on each ray.
fn sliding_attacks(square: Square, blockers: Bitboard, deltas: &[(i8, i8)]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;

    for &(df, dr) in deltas {
        let mut current = square;
        while let Some(next) = current.offset(df, dr) {
            attacks |= next;
            if blockers.contains(next) {
                break;
            }
            current = next;
        }
    }

    attacks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaper_tables() {
        // A knight in the middle has 8 targets, in a corner only 2.
        assert_eq!(knight_attacks(Square::E4).population(), 8);
        assert_eq!(knight_attacks(Square::A1).population(), 2);

        // Every knight target is exactly 2 away (Chebyshev).
        for square in Square::iter() {
            for to in knight_attacks(square) {
                assert_eq!(square.distance(to), 2);
            }
            for to in king_attacks(square) {
                assert_eq!(square.distance(to), 1);
            }
        }
    }

    #[test]
    fn test_pawn_tables_mask_edges() {
        assert_eq!(
            pawn_attacks(Square::A4, Color::White),
            Square::B5.bitboard()
        );
        assert_eq!(
            pawn_attacks(Square::H4, Color::Black),
            Square::G3.bitboard()
        );
        assert_eq!(
            pawn_attacks(Square::E4, Color::White).population(),
            2
        );

        assert_eq!(
            pawn_pushes(Square::E2, Color::White),
            Square::E3.bitboard() | Square::E4.bitboard()
        );
        assert_eq!(pawn_pushes(Square::E3, Color::White), Square::E4.bitboard());
    }

    #[test]
    fn test_rays() {
        assert_eq!(
            ray_between(Square::A1, Square::D4),
            Square::B2.bitboard() | Square::C3.bitboard()
        );
        assert_eq!(ray_between(Square::A1, Square::B3), Bitboard::EMPTY);
        assert_eq!(ray_containing(Square::B2, Square::D4).population(), 8);
        assert_eq!(ray_containing(Square::A1, Square::C2), Bitboard::EMPTY);
    }

    #[test]
    fn test_magic_lookups_match_ray_walking() {
        // Pseudo-random occupancies; every magic lookup must agree with the
        // reference ray walk.
        let mut prng = XoShiRo::new();
        for _ in 0..200 {
            let occupancy = Bitboard::new(prng.next_u64() & prng.next_u64());
            for square in Square::iter() {
                assert_eq!(
                    rook_attacks(square, occupancy),
                    sliding_attacks(square, occupancy, &ROOK_DELTAS),
                    "rook attacks diverge on {square} with occupancy {occupancy}"
                );
                assert_eq!(
                    bishop_attacks(square, occupancy),
                    sliding_attacks(square, occupancy, &BISHOP_DELTAS),
                    "bishop attacks diverge on {square} with occupancy {occupancy}"
                );
            }
        }
    }

    #[test]
    fn test_rook_attacks_with_blockers() {
        let blockers = Square::D6.bitboard() | Square::F4.bitboard() | Square::D2.bitboard();
        let attacks = rook_attacks(Square::D4, blockers);

        assert!(attacks.contains(Square::D5));
        assert!(attacks.contains(Square::D6)); // first blocker is included
        assert!(!attacks.contains(Square::D7)); // ...but the ray stops there
        assert!(attacks.contains(Square::F4));
        assert!(!attacks.contains(Square::G4));
        assert!(attacks.contains(Square::A4)); // unobstructed to the edge
    }
}
