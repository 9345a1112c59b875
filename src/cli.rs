/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::str::FromStr;

use clap::Parser;

use crate::Square;

/// A command to be sent to the engine.
///
/// These are the engine's own commands, entered interactively or passed as
/// process arguments. UCI commands take a separate path and arrive through
/// [`EngineCommand::Uci`].
#[derive(Debug, Clone, Parser)]
#[command(multicall = true, about, rename_all = "lower")]
pub enum EngineCommand {
    /// Print a visual representation of the current board state.
    #[command(alias = "d")]
    Display,

    /// Print the static evaluation of the current position.
    Eval,

    /// Quit the engine.
    Exit {
        /// If set, the engine will await any running search before exiting.
        #[arg(short, long, default_value = "false")]
        cleanup: bool,
    },

    /// Generate and print a FEN string for the current position.
    Fen,

    /// Display information about the engine's transposition table.
    #[command(aliases = ["tt", "ttable"])]
    HashInfo,

    /// Apply the provided move to the current position, if it is legal.
    MakeMove { mv_string: String },

    /// Show all legal moves in the current position.
    ///
    /// If `square` is provided, only moves originating there are shown.
    Moves { square: Option<Square> },

    /// Count the leaf nodes of the move tree at the given depth.
    Perft { depth: usize },

    /// Like `perft`, but also prints the node count below each root move.
    #[command(alias = "sperft")]
    Splitperft { depth: usize },

    /// Execute a UCI command on the engine.
    ///
    /// Needed only when sending UCI on engine startup, like
    /// `skink uci "go depth 5"`; during runtime UCI commands are recognized
    /// directly.
    Uci {
        /// The UCI command text.
        #[arg(trailing_var_arg = true, num_args = 1..)]
        command: Vec<String>,
    },
}

impl FromStr for EngineCommand {
    type Err = clap::Error;

    /// Parse a command from an interactive line of input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse_from(s.split_ascii_whitespace())
    }
}
