/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! End-to-end search scenarios: mates, draws, and horizon handling.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use skink::{
    HistoryTable, LogNone, Position, Score, Search, SearchConfig, SearchResult, Square, TTable,
};

fn search_to_depth(fen: &str, depth: usize) -> SearchResult {
    skink::init();
    let mut position: Position = fen.parse().unwrap();
    let is_searching = Arc::new(AtomicBool::new(true));

    let config = SearchConfig {
        max_depth: depth,
        ..Default::default()
    };

    let mut ttable = TTable::default();
    let mut history = HistoryTable::default();

    Search::<LogNone>::new(is_searching, config, &mut ttable, &mut history).start(&mut position)
}

#[test]
fn test_mate_in_one_as_white() {
    // Scholar's mate is available: Qxf7#.
    let fen = "r1bqkbnr/p1pp1ppp/1p6/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 2 4";
    let res = search_to_depth(fen, 3);

    assert!(res.score.is_mate(), "expected mate, got {:?}", res.score);
    assert_eq!(res.score.moves_to_mate(), 1);
    assert_eq!(res.bestmove.unwrap().to_string(), "f3f7");
}

#[test]
fn test_mate_in_two_as_black() {
    let fen = "6k1/3b4/1p1p2p1/p1pPbr2/P1P3K1/1P6/4r3/3R4 b - - 1 51";
    let res = search_to_depth(fen, 5);

    assert!(res.score.is_mate(), "expected mate, got {:?}", res.score);
    assert_eq!(res.bestmove.unwrap().to_string(), "e2f2");
}

#[test]
fn test_en_passant_discovered_check_not_generated() {
    // Capturing en passant on c6 would expose the white king to the h5 rook
    // along the fifth rank.
    skink::init();
    let position: Position = "8/8/3p4/1Pp4r/1K3p2/6k1/4P1P1/1R6 w - c6 0 3".parse().unwrap();

    assert!(position
        .legal_moves()
        .iter()
        .all(|mv| mv.to_string() != "b5c6"));
}

#[test]
fn test_castling_through_attacked_square_not_generated() {
    // The black rook on f8 covers f1, which the king would cross.
    skink::init();
    let position: Position = "4kr2/8/8/8/8/8/8/4K2R w K - 0 1".parse().unwrap();

    assert!(position
        .legal_moves()
        .iter()
        .all(|mv| mv.to_string() != "e1g1"));
}

#[test]
fn test_perpetual_check_is_a_draw() {
    // White is a rook and two knights against a lone queen, but the queen
    // shuttles between f8 and f7 with checks the black king cannot block or
    // escape. The search must prefer the repetition over any losing line.
    let fen = "7k/1K3Q2/7p/8/p7/8/8/nnr5 w - - 0 1";
    let res = search_to_depth(fen, 8);

    assert_eq!(res.score, Score::DRAW, "expected a draw by repetition");
}

#[test]
fn test_fifty_move_rule_draw() {
    // Balanced rooks, clock at 100 plies, and no irreversible move in sight.
    let res = search_to_depth("4k3/r7/8/8/8/8/7R/4K3 w - - 100 80", 4);
    assert_eq!(res.score, Score::DRAW);
}

#[test]
fn test_threefold_repetition_detected_during_play() {
    skink::init();
    let mut position = Position::new();

    // Shuffle the kingside knights out and back, twice over.
    for mv_str in [
        "g1f3", "g8f6", "f3g1", "f6g8", // second occurrence of startpos
        "g1f3", "g8f6", "f3g1",
    ] {
        let mv = skink::Move::from_uci(&position, mv_str).unwrap();
        position.make_move(mv);
    }

    // One more shuffle move produces the third occurrence.
    let mv = skink::Move::from_uci(&position, "f6g8").unwrap();
    position.make_move(mv);
    assert!(position.is_repetition());
}

#[test]
fn test_quiescence_resolves_hanging_queen() {
    // The white queen on d4 is attacked by the c5 pawn. A depth-1 search
    // must not trust the static eval of quiet moves (which still counts the
    // queen); quiescence plays the capture out.
    let fen = "4k3/8/8/2p5/3Q4/8/8/4K3 w - - 0 1";
    let res = search_to_depth(fen, 1);

    let best = res.bestmove.unwrap();
    assert_eq!(best.from(), Square::D4, "the queen must move: got {best}");
    assert!(
        res.score > Score::new(700),
        "score must reflect the saved queen, got {:?}",
        res.score
    );
}

#[test]
fn test_deeper_search_is_consistent_on_tactics() {
    // A free rook hangs on a8; any reasonable depth finds the capture.
    let fen = "r3k3/8/8/8/8/8/8/R3K3 w - - 0 1";
    for depth in [1, 2, 3, 4] {
        let res = search_to_depth(fen, depth);
        assert_eq!(
            res.bestmove.unwrap().to_string(),
            "a1a8",
            "depth {depth} missed the hanging rook"
        );
    }
}
