/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::{CastlingRights, Color, File, Piece, Position, Square, XoShiRo};

/// Stores Zobrist hash keys for every hashed attribute of a [`Position`].
///
/// Built at compile time from the library's fixed PRNG seeds, so keys are
/// identical across runs and builds.
const ZOBRIST_TABLE: ZobristTable = ZobristTable::new();

/// A key produced by [Zobrist hashing](https://www.chessprogramming.org/Zobrist_Hashing).
///
/// Positions hash the same key if and only if they agree on piece placement,
/// castling rights, en passant square, and side to move.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
#[repr(transparent)]
pub struct ZobristKey(u64);

impl ZobristKey {
    /// Compute the full hash of `position` from scratch.
    ///
    /// The incrementally-maintained key of every reachable position must be
    /// equal to this value; that invariant is exercised in the position tests.
    pub fn new(position: &Position) -> Self {
        let mut key = Self::default();

        for square in Square::iter() {
            if let Some(piece) = position.piece_at(square) {
                key.hash_piece(square, piece);
            }
        }

        if let Some(ep_square) = position.ep_square() {
            key.hash_ep_file(ep_square.file());
        }

        key.hash_castling_rights(position.castling_rights());
        key.hash_side_to_move(position.side_to_move());

        key
    }

    /// Fetch the inner `u64` of this key.
    #[inline(always)]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Adds/removes `hash` to this key. XOR, so hashing twice un-hashes.
    #[inline(always)]
    pub fn hash(&mut self, hash: u64) {
        self.0 ^= hash;
    }

    /// Adds/removes the key of `piece` sitting on `square`.
    #[inline(always)]
    pub fn hash_piece(&mut self, square: Square, piece: Piece) {
        self.hash(ZOBRIST_TABLE.piece_keys[square.index()][piece.index()]);
    }

    /// Adds/removes the key of the en passant file.
    ///
    /// Only the file is hashed; the rank is implied by the side to move.
    /// The key is applied whenever `ep_square` is set, whether or not a
    /// capture is actually possible.
    #[inline(always)]
    pub fn hash_ep_file(&mut self, file: File) {
        self.hash(ZOBRIST_TABLE.ep_keys[file.index()]);
    }

    /// Adds/removes the key of the provided castling rights mask.
    #[inline(always)]
    pub fn hash_castling_rights(&mut self, rights: CastlingRights) {
        self.hash(ZOBRIST_TABLE.castling_keys[rights.index()]);
    }

    /// Adds/removes the side-to-move key. White's key is zero, so only a
    /// Black side-to-move alters the hash.
    #[inline(always)]
    pub fn hash_side_to_move(&mut self, color: Color) {
        if color.is_black() {
            self.hash(ZOBRIST_TABLE.side_key);
        }
    }
}

impl fmt::Display for ZobristKey {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018X}", self.0)
    }
}

/// The raw random keys backing [`ZobristKey`].
struct ZobristTable {
    /// One key for every (square, piece) pair.
    piece_keys: [[u64; Piece::COUNT]; Square::COUNT],

    /// One key per file on which en passant may be possible.
    ep_keys: [u64; File::COUNT],

    /// One key for every castling-rights mask.
    castling_keys: [u64; 16],

    /// The key XORed in when Black is to move.
    side_key: u64,
}

impl ZobristTable {
    /// Generate all keys from the fixed-seed PRNG. Runs at compile time.
    const fn new() -> Self {
        let mut piece_keys = [[0; Piece::COUNT]; Square::COUNT];
        let mut ep_keys = [0; File::COUNT];
        let mut castling_keys = [0; 16];

        let mut prng = XoShiRo::new();

        let mut square = 0;
        while square < Square::COUNT {
            let mut piece = 0;
            while piece < Piece::COUNT {
                let key;
                (key, prng) = prng.next_const();
                piece_keys[square][piece] = key;
                piece += 1;
            }
            square += 1;
        }

        let mut file = 0;
        while file < File::COUNT {
            let key;
            (key, prng) = prng.next_const();
            ep_keys[file] = key;
            file += 1;
        }

        let mut rights = 0;
        while rights < castling_keys.len() {
            let key;
            (key, prng) = prng.next_const();
            castling_keys[rights] = key;
            rights += 1;
        }

        let (side_key, _) = prng.next_const();

        Self {
            piece_keys,
            ep_keys,
            castling_keys,
            side_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_is_involutive() {
        let mut key = ZobristKey::default();
        key.hash_piece(Square::D5, Piece::BLACK_KNIGHT);
        assert_ne!(key, ZobristKey::default());

        key.hash_piece(Square::D5, Piece::BLACK_KNIGHT);
        assert_eq!(key, ZobristKey::default());
    }

    #[test]
    fn test_distinct_attributes_hash_differently() {
        let mut a = ZobristKey::default();
        a.hash_piece(Square::D5, Piece::BLACK_KNIGHT);

        let mut b = ZobristKey::default();
        b.hash_piece(Square::D5, Piece::WHITE_KNIGHT);
        assert_ne!(a, b);

        let mut c = ZobristKey::default();
        c.hash_piece(Square::D4, Piece::BLACK_KNIGHT);
        assert_ne!(a, c);

        let mut white = ZobristKey::default();
        white.hash_side_to_move(Color::White);
        assert_eq!(white, ZobristKey::default());

        let mut black = ZobristKey::default();
        black.hash_side_to_move(Color::Black);
        assert_ne!(black, ZobristKey::default());
    }
}
