/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    see, tune, Bound, Evaluator, HistoryTable, Move, MovePicker, Position, Score, TTable,
    TTableEntry,
};

/// Maximum ply depth a search can reach, extensions included.
pub const MAX_PLY: usize = 128;

/// Compile-time marker deciding how chatty a [`Search`] is.
///
/// The search itself is identical at every level; only the `info` output
/// changes. Tests run silent searches through [`LogNone`].
pub trait LogLevel {
    /// Print `info` lines and the final `bestmove`.
    const INFO: bool;

    /// Print additional diagnostics.
    const DEBUG: bool;
}

/// Print nothing. Used by tests and benchmarks.
pub struct LogNone;
impl LogLevel for LogNone {
    const INFO: bool = false;
    const DEBUG: bool = false;
}

/// Print standard UCI output.
pub struct LogInfo;
impl LogLevel for LogInfo {
    const INFO: bool = true;
    const DEBUG: bool = false;
}

/// Print standard UCI output plus diagnostics.
pub struct LogDebug;
impl LogLevel for LogDebug {
    const INFO: bool = true;
    const DEBUG: bool = true;
}

/// The result of a search: the best move found and how it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Total nodes visited.
    pub nodes: u64,

    /// Best move found, if any legal move exists.
    pub bestmove: Option<Move>,

    /// Score of the position after `bestmove`.
    pub score: Score,

    /// Depth of the last fully completed iteration.
    pub depth: usize,
}

impl Default for SearchResult {
    /// A default result has no move and the worst possible score.
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            score: Score::ALPHA,
            depth: 0,
        }
    }
}

/// Limits for executing a [`Search`].
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum iterative deepening depth.
    pub max_depth: usize,

    /// Node allowance; the search exits as soon as possible once exceeded.
    pub max_nodes: u64,

    /// Instant the search clock started.
    pub starttime: Instant,

    /// Soft limit: once exceeded, no further deepening iteration starts.
    pub soft_timeout: Duration,

    /// Hard limit: once exceeded, the search exits mid-iteration.
    pub hard_timeout: Duration,
}

impl SearchConfig {
    /// Build a config from UCI `go` options and the position to search.
    ///
    /// The position decides whose clock (`wtime`/`btime`) applies.
    pub fn new(options: UciSearchOptions, position: &Position) -> Self {
        let mut config = Self::default();

        if let Some(depth) = options.depth {
            config.max_depth = depth as usize;
        }

        if let Some(nodes) = options.nodes {
            config.max_nodes = nodes as u64;
        }

        if let Some(movetime) = options.movetime {
            // Fixed time per move: soft and hard limits coincide.
            config.soft_timeout = movetime;
            config.hard_timeout = movetime;
        } else {
            let (time, inc) = if position.side_to_move().is_white() {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            if let Some(time) = time {
                let inc = inc.unwrap_or(Duration::ZERO) / tune::time_inc_divisor!();

                config.soft_timeout = time / tune::soft_timeout_divisor!() + inc;
                config.hard_timeout = time / tune::hard_timeout_divisor!() + inc;
            }
        }

        config
    }
}

impl Default for SearchConfig {
    /// The default config permits an effectively infinite search.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_PLY,
            max_nodes: u64::MAX,
            starttime: Instant::now(),
            soft_timeout: Duration::MAX,
            hard_timeout: Duration::MAX,
        }
    }
}

/// A single search worker.
///
/// Owns the position for the duration of the search and mutates it only
/// through paired make/unmake calls, so the position is back in its root
/// state whenever the search returns.
pub struct Search<'a, Log> {
    /// Nodes visited so far.
    nodes: u64,

    /// Set once any stop condition fires; the current iteration's result is
    /// then discarded in favor of the last completed one.
    stopped: bool,

    /// Cooperative stop flag shared with the engine thread.
    ///
    /// Cleared by the `stop` command; observed at a bounded interval.
    is_searching: Arc<AtomicBool>,

    /// Limits for this search.
    config: SearchConfig,

    /// Transposition table, exclusively borrowed for the whole search.
    ttable: &'a mut TTable,

    /// History heuristic table, exclusively borrowed for the whole search.
    history: &'a mut HistoryTable,

    /// Two killer moves per ply.
    killers: [[Move; 2]; MAX_PLY],

    log: PhantomData<Log>,
}

impl<'a, Log: LogLevel> Search<'a, Log> {
    /// Construct a new [`Search`].
    #[inline(always)]
    pub fn new(
        is_searching: Arc<AtomicBool>,
        config: SearchConfig,
        ttable: &'a mut TTable,
        history: &'a mut HistoryTable,
    ) -> Self {
        Self {
            nodes: 0,
            stopped: false,
            is_searching,
            config,
            ttable,
            history,
            killers: [[Move::NULL; 2]; MAX_PLY],
            log: PhantomData,
        }
    }

    /// Run the search on `position`, returning the best move of the last
    /// fully completed iteration.
    ///
    /// Prints `info` lines per iteration and a final `bestmove` (unless
    /// logging is [`LogNone`]). The position is unchanged on return.
    pub fn start(mut self, position: &mut Position) -> SearchResult {
        if Log::DEBUG {
            self.send_string(format!("Starting search on {:?}", position.to_fen()));
        }

        let mut result = self.iterative_deepening(position);
        result.nodes = self.nodes;

        if Log::INFO {
            let response: UciResponse<String> = UciResponse::BestMove {
                bestmove: result.bestmove.map(|mv| mv.to_string()),
                ponder: None,
            };
            println!("{response}");
        }

        // Let the engine thread know the search is over.
        self.is_searching.store(false, Ordering::Relaxed);

        result
    }

    /// [Iterative deepening](https://www.chessprogramming.org/Iterative_Deepening):
    /// run a full search at depth 1, then 2, and so on. Shallow iterations
    /// seed the transposition table and move ordering for deeper ones, and
    /// the previous iteration's result is always available if time runs out.
    fn iterative_deepening(&mut self, position: &mut Position) -> SearchResult {
        let mut result = SearchResult::default();

        // Checkmate or stalemate at the root: no move to search for.
        let moves = position.legal_moves();
        if moves.is_empty() {
            result.score = if position.in_check() {
                -Score::MATE
            } else {
                Score::DRAW
            };
            return result;
        }

        // Seed the best move so there is always something to play, even if
        // the very first iteration is cancelled.
        result.bestmove = moves.first().copied();

        let mut depth = 1;
        while depth <= self.config.max_depth
            && self.config.starttime.elapsed() < self.config.soft_timeout
            && self.is_searching.load(Ordering::Relaxed)
            && !self.stopped
        {
            let (score, bestmove) = self.search_root(position, depth);

            // An interrupted iteration may have searched only some moves, so
            // its result cannot be trusted; fall back to the previous one.
            if self.stopped {
                if Log::DEBUG {
                    self.send_string(format!("Search cancelled during depth {depth}"));
                }
                break;
            }

            result.score = score;
            result.bestmove = bestmove;
            result.depth = depth;

            if Log::INFO {
                self.send_iteration_info(position, &result);
            }

            depth += 1;
        }

        result
    }

    /// Search all root moves at the given depth, returning the best score
    /// and move.
    fn search_root(&mut self, position: &mut Position, depth: usize) -> (Score, Option<Move>) {
        let mut alpha = Score::ALPHA;
        let beta = Score::BETA;
        let original_alpha = alpha;

        let moves = position.legal_moves();
        let tt_move = self
            .ttable
            .probe(position.key())
            .map(|entry| entry.best_move)
            .unwrap_or(Move::NULL);

        let picker = MovePicker::new(moves, |mv| self.score_move(position, mv, tt_move, 0));

        let mut bestmove = None;
        let mut searched = 0;

        for mv in picker {
            position.make_move(mv);

            let score = if searched == 0 {
                // The first (presumed best) move gets the full window.
                -self.negamax(position, depth as i32 - 1, 1, -beta, -alpha, true)
            } else {
                // Principal variation search: probe the rest with a null
                // window, re-searching in full only on an upset.
                let probe = -self.negamax(position, depth as i32 - 1, 1, -alpha - 1, -alpha, true);
                if probe > alpha && probe < beta {
                    -self.negamax(position, depth as i32 - 1, 1, -beta, -alpha, true)
                } else {
                    probe
                }
            };

            position.unmake_move(mv);

            if self.stopped {
                break;
            }
            searched += 1;

            if score > alpha || bestmove.is_none() {
                alpha = alpha.max(score);
                bestmove = Some(mv);
            }
        }

        if let (Some(mv), false) = (bestmove, self.stopped) {
            self.ttable.store(TTableEntry::new(
                position.key(),
                depth as u8,
                alpha,
                Bound::new(alpha, original_alpha, beta),
                mv,
                0,
            ));
        }

        (alpha, bestmove)
    }

    /// The main alpha-beta recursion:
    /// [negamax](https://www.chessprogramming.org/Negamax) with principal
    /// variation search, transposition cutoffs, a check extension, null-move
    /// pruning, and late move reductions.
    fn negamax(
        &mut self,
        position: &mut Position,
        depth: i32,
        ply: usize,
        mut alpha: Score,
        mut beta: Score,
        allow_null: bool,
    ) -> Score {
        self.nodes += 1;
        if self.check_stop() {
            return Score::DRAW;
        }

        // Draw by 50-move rule or repetition. The undo stack holds the whole
        // game, so repetitions across the root are found as well.
        if position.halfmove() >= 100 || position.is_repetition() {
            return Score::DRAW;
        }

        if ply >= MAX_PLY {
            return Evaluator::new(position).eval();
        }

        let in_check = position.in_check();

        // Being in check is too volatile to evaluate statically; look one
        // ply further before standing pat.
        let depth = if in_check { depth + 1 } else { depth };

        if depth <= 0 {
            return self.quiescence(position, ply, alpha, beta);
        }

        let key = position.key();

        // Transposition table probe: an entry from an equal or deeper search
        // can narrow the window or cut off outright. Its best move improves
        // ordering even when the depth is insufficient for a cutoff.
        let mut tt_move = Move::NULL;
        if let Some(entry) = self.ttable.probe(key) {
            tt_move = entry.best_move;

            if entry.depth as i32 >= depth {
                let score = entry.score_at(ply as i32);
                match entry.bound {
                    Bound::Exact => return score,
                    Bound::Lower => alpha = alpha.max(score),
                    Bound::Upper => beta = beta.min(score),
                }

                if alpha >= beta {
                    return score;
                }
            }
        }

        // The bound classification below is relative to the window this node
        // was actually searched with, including any TT narrowing above.
        let original_alpha = alpha;

        // Null move pruning: if passing the turn still beats beta, an actual
        // move surely would. Unsound in check, after another null move, and
        // without non-pawn material, where zugzwang makes "doing nothing"
        // an advantage.
        if allow_null
            && !in_check
            && depth >= tune::min_nmp_depth!()
            && position.has_non_pawn_material(position.side_to_move())
        {
            position.make_null_move();
            let score = -self.negamax(
                position,
                depth - 1 - tune::nmp_reduction!(),
                ply + 1,
                -beta,
                -beta + 1,
                false,
            );
            position.unmake_null_move();

            if self.stopped {
                return Score::DRAW;
            }
            if score >= beta {
                return beta;
            }
        }

        let moves = position.legal_moves();
        if moves.is_empty() {
            return if in_check {
                // Checkmate; prefer shorter mates.
                -Score::MATE + ply as i32
            } else {
                Score::DRAW
            };
        }

        let picker = MovePicker::new(moves, |mv| self.score_move(position, mv, tt_move, ply));

        let mut best_move = Move::NULL;
        let mut searched = 0;

        for mv in picker {
            position.make_move(mv);
            searched += 1;

            let gives_check = position.in_check();

            let score = if searched == 1 {
                -self.negamax(position, depth - 1, ply + 1, -beta, -alpha, true)
            } else {
                // Late move reductions: moves this far down the ordering
                // rarely matter, so try them shallower first. Tactical moves
                // and check evasions keep their full depth.
                let reduction = if mv.is_quiet()
                    && !in_check
                    && !gives_check
                    && searched > tune::min_lmr_moves!()
                    && depth >= tune::min_lmr_depth!()
                {
                    (1 + depth / 5).min(4)
                } else {
                    0
                };

                let probe = -self.negamax(
                    position,
                    depth - 1 - reduction,
                    ply + 1,
                    -alpha - 1,
                    -alpha,
                    true,
                );

                if probe > alpha && probe < beta {
                    -self.negamax(position, depth - 1, ply + 1, -beta, -alpha, true)
                } else {
                    probe
                }
            };

            position.unmake_move(mv);

            if self.stopped {
                return Score::DRAW;
            }

            if score > alpha {
                alpha = score;
                best_move = mv;
            }

            if alpha >= beta {
                // A quiet move strong enough to refute the whole node is
                // remembered by the killer and history heuristics.
                if mv.is_quiet() {
                    self.store_killer(ply, mv);
                    self.history
                        .update(position, &mv, (depth * depth).min(i16::MAX as i32) as i16);
                }

                self.ttable
                    .store(TTableEntry::new(key, depth as u8, beta, Bound::Lower, mv, ply as i32));

                return beta;
            }
        }

        self.ttable.store(TTableEntry::new(
            key,
            depth as u8,
            alpha,
            Bound::new(alpha, original_alpha, beta),
            best_move,
            ply as i32,
        ));

        alpha
    }

    /// [Quiescence search](https://www.chessprogramming.org/Quiescence_Search):
    /// at the horizon, keep resolving captures and promotions until the
    /// position is quiet, so the static evaluation is never taken in the
    /// middle of an exchange.
    fn quiescence(&mut self, position: &mut Position, ply: usize, mut alpha: Score, beta: Score) -> Score {
        self.nodes += 1;
        if self.check_stop() {
            return Score::DRAW;
        }

        // Standing pat: the side to move can usually decline to capture.
        let stand_pat = Evaluator::new(position).eval();
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        if ply >= MAX_PLY {
            return alpha;
        }

        let captures = position.legal_captures();
        let picker = MovePicker::new(captures, |mv| see(position, *mv));

        for mv in picker {
            // Captures that lose material cannot beat the standing pat;
            // promotions are kept since their gain is off the board.
            if !mv.is_promotion() && see(position, mv) < 0 {
                continue;
            }

            position.make_move(mv);
            let score = -self.quiescence(position, ply + 1, -beta, -alpha);
            position.unmake_move(mv);

            if self.stopped {
                return Score::DRAW;
            }

            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    /// Move-ordering score: hash move, then winning captures by exchange
    /// score, then killers, then quiets by history, with losing captures
    /// at the very back.
    fn score_move(&self, position: &Position, mv: &Move, tt_move: Move, ply: usize) -> i32 {
        if *mv == tt_move {
            return tune::hash_move_bonus!();
        }

        if mv.is_capture() || mv.is_promotion() {
            let exchange = see(position, *mv);
            return if exchange >= 0 {
                tune::capture_bonus!() + exchange
            } else {
                exchange
            };
        }

        if self.killers[ply].contains(mv) {
            return tune::killer_bonus!();
        }

        match position.piece_at(mv.from()) {
            Some(piece) => {
                self.history.get(piece, mv.to()) as i32 / tune::history_score_divisor!()
            }
            None => 0,
        }
    }

    /// Remember a quiet move that caused a beta cutoff at `ply`.
    #[inline(always)]
    fn store_killer(&mut self, ply: usize, mv: Move) {
        if self.killers[ply][0] != mv {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = mv;
        }
    }

    /// Cooperative stop check, consulted every few thousand nodes: the
    /// shared stop flag, the hard deadline, and the node allowance.
    #[inline(always)]
    fn check_stop(&mut self) -> bool {
        if !self.stopped && self.nodes % tune::stop_check_interval!() == 0 {
            self.stopped = self.config.starttime.elapsed() >= self.config.hard_timeout
                || !self.is_searching.load(Ordering::Relaxed)
                || self.nodes >= self.config.max_nodes;
        }

        self.stopped
    }

    /// Send the end-of-iteration `info` line, with the PV recovered by
    /// walking transposition table best moves.
    fn send_iteration_info(&mut self, position: &mut Position, result: &SearchResult) {
        let elapsed = self.config.starttime.elapsed();
        let pv = self.extract_pv(position, result.depth);

        let info = UciInfo::new()
            .depth(result.depth)
            .score(result.score.into_uci())
            .nodes(self.nodes)
            .nps((self.nodes as f32 / elapsed.as_secs_f32()).trunc())
            .time(elapsed.as_millis())
            .pv(pv.iter().map(|mv| mv.to_string()));

        println!("{}", UciResponse::<String>::Info(Box::new(info)));
    }

    /// Walk transposition-table best moves to recover the principal
    /// variation, restoring the position afterwards.
    fn extract_pv(&self, position: &mut Position, max_len: usize) -> Vec<Move> {
        let mut pv = Vec::with_capacity(max_len);

        while pv.len() < max_len {
            let Some(entry) = self.ttable.probe(position.key()) else {
                break;
            };
            let mv = entry.best_move;

            // The table may hold stale or aliased entries, so re-validate.
            if mv.is_null() || !position.legal_moves().contains(&mv) {
                break;
            }

            position.make_move(mv);
            pv.push(mv);
        }

        for mv in pv.iter().rev() {
            position.unmake_move(*mv);
        }

        pv
    }

    /// Send a plain `info string` message.
    #[inline(always)]
    fn send_string<T: fmt::Display>(&self, message: T) {
        let info = UciInfo::new().string(message);
        println!("{}", UciResponse::<String>::Info(Box::new(info)));
    }
}
