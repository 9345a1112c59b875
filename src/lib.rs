/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Board representation: bitboards, squares, pieces, moves, attack tables,
/// Zobrist hashing, position state, and legal move generation.
mod board;

/// Commands the engine accepts beyond the UCI protocol.
mod cli;

/// The engine's event loop and UCI handling.
mod engine;

/// Static evaluation of chess positions.
mod eval;

/// History heuristic for quiet-move ordering.
mod history;

/// Yields moves in best-first order during search.
mod movepicker;

/// Piece-square tables for the evaluator.
mod psqt;

/// Centipawn score type, including mate-score handling.
mod score;

/// Main engine logic; all search-related code.
mod search;

/// Static exchange evaluation of capture sequences.
mod see;

/// The transposition table.
mod ttable;

/// Tunable search constants.
pub(crate) mod tune;

pub use board::*;
pub use cli::*;
pub use engine::*;
pub use eval::*;
pub use history::*;
pub use movepicker::*;
pub use psqt::*;
pub use score::*;
pub use search::*;
pub use see::*;
pub use ttable::*;

/// One-shot, process-wide initialization: builds the magic slider attack
/// tables. Idempotent, and implied by constructing an [`Engine`], but tests
/// and library users may call it directly.
#[inline(always)]
pub fn init() {
    board::init();
}
