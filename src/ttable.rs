/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{Move, Score, ZobristKey};

/// Number of bytes in a megabyte.
const BYTES_IN_MB: usize = 1024 * 1024;

/// How a stored score bounds the true value of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    /// The score is exact: it was inside the `(alpha, beta)` window.
    Exact,

    /// The score failed high: the true value is at least this score.
    Lower,

    /// The score failed low: the true value is at most this score.
    Upper,
}

impl Bound {
    /// Classify a search result against the window it was searched with.
    #[inline(always)]
    pub fn new(score: Score, original_alpha: Score, beta: Score) -> Self {
        if score <= original_alpha {
            Self::Upper
        } else if score >= beta {
            Self::Lower
        } else {
            Self::Exact
        }
    }
}

/// One cached search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTableEntry {
    /// Full Zobrist key of the position this entry describes.
    pub key: ZobristKey,

    /// Remaining depth of the search that produced this entry.
    pub depth: u8,

    /// The stored score. Mate scores are re-rooted to the storing ply so
    /// they stay meaningful wherever the entry is probed.
    pub score: Score,

    /// How `score` bounds the true value.
    pub bound: Bound,

    /// Best move found, or [`Move::NULL`] if the search failed low.
    pub best_move: Move,
}

impl TTableEntry {
    /// Create an entry, re-rooting mate scores away from `ply`.
    #[inline(always)]
    pub fn new(
        key: ZobristKey,
        depth: u8,
        score: Score,
        bound: Bound,
        best_move: Move,
        ply: i32,
    ) -> Self {
        Self {
            key,
            depth,
            score: score.absolute(ply),
            bound,
            best_move,
        }
    }

    /// The stored score adjusted to the probing ply.
    #[inline(always)]
    pub fn score_at(&self, ply: i32) -> Score {
        self.score.relative(ply)
    }
}

/// A fixed-size [transposition table](https://www.chessprogramming.org/Transposition_Table).
///
/// Entries are indexed by `key mod capacity` with no chaining: a probe only
/// hits when the full stored key matches, and a store replaces the occupant
/// only when the incoming entry's depth is at least as great.
#[derive(Debug)]
pub struct TTable {
    entries: Vec<Option<TTableEntry>>,
}

impl TTable {
    /// Default size of the table, in megabytes.
    pub const DEFAULT_SIZE_MB: usize = 16;

    /// Minimum size accepted by the `Hash` UCI option.
    pub const MIN_SIZE_MB: usize = 1;

    /// Maximum size accepted by the `Hash` UCI option.
    pub const MAX_SIZE_MB: usize = 1_024;

    /// Create a table occupying roughly `size_mb` megabytes.
    #[inline(always)]
    pub fn new(size_mb: usize) -> Self {
        Self::with_capacity(size_mb * BYTES_IN_MB / std::mem::size_of::<Option<TTableEntry>>())
    }

    /// Create a table holding exactly `capacity` entries.
    #[inline(always)]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![None; capacity.max(1)],
        }
    }

    /// Number of slots in this table.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Approximate size of this table, in megabytes.
    #[inline(always)]
    pub fn size_mb(&self) -> usize {
        self.entries.len() * std::mem::size_of::<Option<TTableEntry>>() / BYTES_IN_MB
    }

    /// Number of occupied slots.
    #[inline(always)]
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|slot| slot.is_some()).count()
    }

    /// Forget everything. Called on `ucinewgame`.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.entries.iter_mut().for_each(|slot| *slot = None);
    }

    /// Map a key to its slot.
    #[inline(always)]
    fn index(&self, key: ZobristKey) -> usize {
        (key.inner() % self.entries.len() as u64) as usize
    }

    /// Fetch the entry for `key`, if one is stored.
    ///
    /// Misses both on empty slots and on slots occupied by a different key
    /// (the table is a probabilistic filter, not an exact map).
    #[inline(always)]
    pub fn probe(&self, key: ZobristKey) -> Option<&TTableEntry> {
        self.entries[self.index(key)]
            .as_ref()
            .filter(|entry| entry.key == key)
    }

    /// Store `entry`, replacing the occupant only if the new entry was
    /// searched at least as deeply.
    #[inline(always)]
    pub fn store(&mut self, entry: TTableEntry) {
        let index = self.index(entry.key);

        let replace = match &self.entries[index] {
            Some(occupant) => entry.depth >= occupant.depth,
            None => true,
        };

        if replace {
            self.entries[index] = Some(entry);
        }
    }
}

impl Default for TTable {
    #[inline(always)]
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE_MB)
    }
}
