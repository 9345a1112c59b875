/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Pre-computed attack tables: leapers, line rays, and magic sliders.
mod attacks;

/// The 64-bit board set type and its bit-twiddling helpers.
mod bitboard;

/// Legal move generation and perft drivers.
mod movegen;

/// Packed move encoding.
mod moves;

/// Colors, piece kinds, and colored pieces.
mod piece;

/// Position state, FEN, and incremental make/unmake.
mod position;

/// Deterministic PRNG used for Zobrist keys and magic discovery.
mod prng;

/// Squares, files, and ranks.
mod square;

/// Zobrist hashing.
mod zobrist;

pub use attacks::*;
pub use bitboard::*;
pub use movegen::*;
pub use moves::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use zobrist::*;
