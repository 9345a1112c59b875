/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use skink::{perft, Position};

fn test_perft_fen_nodes(depth: usize, fen: &str, expected: u64) {
    skink::init();
    let mut position = Position::from_fen(fen).unwrap();
    let nodes = perft(&mut position, depth);
    assert_eq!(nodes, expected, "perft({depth}) failed on {fen}");
}

/// The six standard positions from <https://www.chessprogramming.org/Perft_Results>.
mod standard_suite {
    use super::*;

    #[test]
    fn test_startpos() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        test_perft_fen_nodes(1, fen, 20);
        test_perft_fen_nodes(2, fen, 400);
        test_perft_fen_nodes(3, fen, 8_902);
        test_perft_fen_nodes(4, fen, 197_281);
        test_perft_fen_nodes(5, fen, 4_865_609);
    }

    #[test]
    fn test_kiwipete() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        test_perft_fen_nodes(1, fen, 48);
        test_perft_fen_nodes(2, fen, 2_039);
        test_perft_fen_nodes(3, fen, 97_862);
        test_perft_fen_nodes(4, fen, 4_085_603);
    }

    #[test]
    fn test_position_3() {
        let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
        test_perft_fen_nodes(1, fen, 14);
        test_perft_fen_nodes(2, fen, 191);
        test_perft_fen_nodes(3, fen, 2_812);
        test_perft_fen_nodes(4, fen, 43_238);
        test_perft_fen_nodes(5, fen, 674_624);
        test_perft_fen_nodes(6, fen, 11_030_083);
    }

    #[test]
    fn test_position_4() {
        let fen = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
        test_perft_fen_nodes(1, fen, 6);
        test_perft_fen_nodes(2, fen, 264);
        test_perft_fen_nodes(3, fen, 9_467);
        test_perft_fen_nodes(4, fen, 422_333);
    }

    #[test]
    fn test_position_5() {
        let fen = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
        test_perft_fen_nodes(1, fen, 44);
        test_perft_fen_nodes(2, fen, 1_486);
        test_perft_fen_nodes(3, fen, 62_379);
        test_perft_fen_nodes(4, fen, 2_103_487);
    }

    #[test]
    fn test_position_6() {
        let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
        test_perft_fen_nodes(1, fen, 46);
        test_perft_fen_nodes(2, fen, 2_079);
        test_perft_fen_nodes(3, fen, 89_890);
        test_perft_fen_nodes(4, fen, 3_894_594);
    }
}

/// Positions that stress promotion generation.
mod promotion_perft {
    use super::*;

    #[test]
    fn test_promotion_perft() {
        let fen = "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1";
        test_perft_fen_nodes(1, fen, 24);
        test_perft_fen_nodes(2, fen, 496);
        test_perft_fen_nodes(3, fen, 9_483);
        test_perft_fen_nodes(4, fen, 182_838);
        test_perft_fen_nodes(5, fen, 3_605_103);
    }
}

/// Tricky cases from <https://www.chessprogramming.net/perfect-perft/>.
mod special_perfts {
    use super::*;

    #[test]
    fn test_illegal_ep_move_1() {
        test_perft_fen_nodes(6, "3k4/3p4/8/K1P4r/8/8/8/8 b - - 0 1", 1_134_888);
    }

    #[test]
    fn test_illegal_ep_move_2() {
        test_perft_fen_nodes(6, "8/8/4k3/8/2p5/8/B2P2K1/8 w - - 0 1", 1_015_133);
    }

    #[test]
    fn test_ep_capture_checks_opponent() {
        test_perft_fen_nodes(6, "8/8/1k6/2b5/2pP4/8/5K2/8 b - d3 0 1", 1_440_467);
    }

    #[test]
    fn test_short_castling_gives_check() {
        test_perft_fen_nodes(6, "5k2/8/8/8/8/8/8/4K2R w K - 0 1", 661_072);
    }

    #[test]
    fn test_long_castling_gives_check() {
        test_perft_fen_nodes(6, "3k4/8/8/8/8/8/8/R3K3 w Q - 0 1", 803_711);
    }

    #[test]
    fn test_castling_rights() {
        test_perft_fen_nodes(4, "r3k2r/1b4bq/8/8/8/8/7B/R3K2R w KQkq - 0 1", 1_274_206);
    }

    #[test]
    fn test_castling_prevented() {
        test_perft_fen_nodes(4, "r3k2r/8/3Q4/8/8/5q2/8/R3K2R b KQkq - 0 1", 1_720_476);
    }

    #[test]
    fn test_promote_out_of_check() {
        test_perft_fen_nodes(6, "2K2r2/4P3/8/8/8/8/8/3k4 w - - 0 1", 3_821_001);
    }

    #[test]
    fn test_discovered_check() {
        test_perft_fen_nodes(5, "8/8/1P2K3/8/2n5/1q6/8/5k2 b - - 0 1", 1_004_658);
    }

    #[test]
    fn test_promote_to_give_check() {
        test_perft_fen_nodes(6, "4k3/1P6/8/8/8/8/K7/8 w - - 0 1", 217_342);
    }

    #[test]
    fn test_under_promote_to_give_check() {
        test_perft_fen_nodes(6, "8/P1k5/K7/8/8/8/8/8 w - - 0 1", 92_683);
    }

    #[test]
    fn test_self_stalemate() {
        test_perft_fen_nodes(6, "K1k5/8/P7/8/8/8/8/8 w - - 0 1", 2_217);
    }

    #[test]
    fn test_stalemate_and_checkmate_1() {
        test_perft_fen_nodes(7, "8/k1P5/8/1K6/8/8/8/8 w - - 0 1", 567_584);
    }

    #[test]
    fn test_stalemate_and_checkmate_2() {
        test_perft_fen_nodes(4, "8/8/2k5/5q2/5n2/8/5K2/8 b - - 0 1", 23_527);
    }
}

// En passant edge cases from https://github.com/kz04px/rawr/blob/master/tests/perft_extra.rs

fn do_perft(fen: &str, results: &[u64]) {
    skink::init();
    let mut position = Position::from_fen(fen).unwrap();
    for (depth, expected) in results.iter().enumerate() {
        let nodes = perft(&mut position, depth);
        assert_eq!(nodes, *expected, "perft({depth}) failed on {fen}");
    }
}

#[test]
fn perft_enpassant() {
    let tests = [
        // EP
        ("8/8/8/8/1k1PpN1R/8/8/4K3 b - d3 0 1", vec![1, 9, 193]),
        ("8/8/8/8/1k1Ppn1R/8/8/4K3 b - d3 0 1", vec![1, 17, 220]),
        ("4k3/8/8/2PpP3/8/8/8/4K3 w - d6 0 1", vec![1, 9, 47, 376]),
        ("4k3/8/8/8/2pPp3/8/8/4K3 b - d3 0 1", vec![1, 9, 47, 376]),
        // EP - pinned diagonal
        ("4k3/b7/8/2Pp4/8/8/8/6K1 w - d6 0 1", vec![1, 5, 45]),
        ("4k3/7b/8/4pP2/8/8/8/1K6 w - e6 0 1", vec![1, 5, 45]),
        ("6k1/8/8/8/2pP4/8/B7/3K4 b - d3 0 1", vec![1, 5, 45]),
        ("1k6/8/8/8/4Pp2/8/7B/4K3 b - e3 0 1", vec![1, 5, 45]),
        ("4k3/b7/8/1pP5/8/8/8/6K1 w - b6 0 1", vec![1, 6, 52]),
        ("4k3/7b/8/5Pp1/8/8/8/1K6 w - g6 0 1", vec![1, 6, 51]),
        ("6k1/8/8/8/1Pp5/8/B7/4K3 b - b3 0 1", vec![1, 6, 52]),
        ("1k6/8/8/8/5pP1/8/7B/4K3 b - g3 0 1", vec![1, 6, 51]),
        // EP - double check
        ("4k3/2rn4/8/2K1pP2/8/8/8/8 w - e6 0 1", vec![1, 4, 75]),
        // EP - pinned horizontal
        ("4k3/8/8/K2pP2r/8/8/8/8 w - d6 0 1", vec![1, 6, 94]),
        ("4k3/8/8/K2pP2q/8/8/8/8 w - d6 0 1", vec![1, 6, 130]),
        ("4k3/8/8/r2pP2K/8/8/8/8 w - d6 0 1", vec![1, 6, 87]),
        ("4k3/8/8/q2pP2K/8/8/8/8 w - d6 0 1", vec![1, 6, 129]),
        // EP - pinned vertical
        ("k7/8/4r3/3pP3/8/8/8/4K3 w - d6 0 1", vec![1, 5, 70]),
        // EP - in check
        ("4k3/8/8/4pP2/3K4/8/8/8 w - e6 0 1", vec![1, 9, 49]),
        ("8/8/8/4k3/5Pp1/8/8/3K4 b - f3 0 1", vec![1, 9, 50]),
        // EP - block check
        ("4k3/8/K6r/3pP3/8/8/8/8 w - d6 0 1", vec![1, 6, 109]),
        ("4k3/8/K6q/3pP3/8/8/8/8 w - d6 0 1", vec![1, 6, 151]),
    ];

    for (fen, results) in tests {
        do_perft(fen, &results);
    }
}

#[test]
fn perft_double_checked() {
    let tests = [
        ("4k3/8/4r3/8/8/8/3p4/4K3 w - - 0 1", [1, 4, 80, 320]),
        ("4k3/8/4q3/8/8/8/3b4/4K3 w - - 0 1", [1, 4, 143, 496]),
    ];

    for (fen, results) in tests {
        do_perft(fen, &results);
    }
}

#[test]
fn perft_pins() {
    let tests = [
        ("4k3/8/8/8/1b5b/8/3Q4/4K3 w - - 0 1", [1, 3, 54, 1_256]),
        ("4k3/8/8/8/1b5b/8/3R4/4K3 w - - 0 1", [1, 3, 54, 836]),
        ("4k3/8/8/8/1b5b/2Q5/5P2/4K3 w - - 0 1", [1, 6, 98, 2_274]),
        ("4k3/8/8/8/1b5b/2R5/5P2/4K3 w - - 0 1", [1, 4, 72, 1_300]),
        ("4k3/8/8/8/1b2r3/8/3Q4/4K3 w - - 0 1", [1, 3, 66, 1_390]),
        ("4k3/8/8/8/1b2r3/8/3QP3/4K3 w - - 0 1", [1, 6, 119, 2_074]),
    ];

    for (fen, results) in tests {
        do_perft(fen, &results);
    }
}
