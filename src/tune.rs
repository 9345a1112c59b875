/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Tunable search constants, kept in one place as macros so call sites stay
//! compile-time constant.

/// Divisor of remaining time for computing the soft timeout of a search.
macro_rules! soft_timeout_divisor {
    () => {
        20
    };
}
pub(crate) use soft_timeout_divisor;

/// Divisor of remaining time for computing the hard timeout of a search.
macro_rules! hard_timeout_divisor {
    () => {
        5
    };
}
pub(crate) use hard_timeout_divisor;

/// Divisor for how much of the time increment to bank per move.
macro_rules! time_inc_divisor {
    () => {
        2
    };
}
pub(crate) use time_inc_divisor;

/// How many nodes to search between checks of the stop flag and deadlines.
macro_rules! stop_check_interval {
    () => {
        2048
    };
}
pub(crate) use stop_check_interval;

/// Minimum remaining depth at which null move pruning is attempted.
macro_rules! min_nmp_depth {
    () => {
        3
    };
}
pub(crate) use min_nmp_depth;

/// Depth reduction applied to the null-move verification search.
macro_rules! nmp_reduction {
    () => {
        3
    };
}
pub(crate) use nmp_reduction;

/// Minimum remaining depth at which late move reductions are applied.
macro_rules! min_lmr_depth {
    () => {
        5
    };
}
pub(crate) use min_lmr_depth;

/// Number of legal moves searched before late move reductions kick in.
macro_rules! min_lmr_moves {
    () => {
        5
    };
}
pub(crate) use min_lmr_moves;

/// Move-ordering bonus for the transposition table move.
macro_rules! hash_move_bonus {
    () => {
        20_000
    };
}
pub(crate) use hash_move_bonus;

/// Move-ordering bonus for captures with a non-negative exchange score.
macro_rules! capture_bonus {
    () => {
        10_000
    };
}
pub(crate) use capture_bonus;

/// Move-ordering bonus for killer moves.
macro_rules! killer_bonus {
    () => {
        900
    };
}
pub(crate) use killer_bonus;

/// Maximum magnitude of a history heuristic score.
macro_rules! max_history_bonus {
    () => {
        8_192
    };
}
pub(crate) use max_history_bonus;

/// Divisor scaling history scores into move-ordering scores, keeping quiets
/// strictly below the killer bonus.
macro_rules! history_score_divisor {
    () => {
        16
    };
}
pub(crate) use history_score_divisor;
