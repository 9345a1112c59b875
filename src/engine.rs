/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{bail, Context, Result};
use uci_parser::{UciCommand, UciInfo, UciOption, UciParseError, UciResponse};

use crate::{
    perft, splitperft, EngineCommand, Evaluator, HistoryTable, LogDebug, LogInfo, Move, Position,
    Search, SearchConfig, SearchResult, Square, TTable,
};

/// The skink chess engine.
///
/// Runs an event loop over commands received from stdin (or process
/// arguments), owns the game state, and spawns one worker thread per search.
#[derive(Debug)]
pub struct Engine {
    /// The current game state, updated by `position` and `makemove`.
    position: Position,

    /// Sending half of the command channel.
    sender: Sender<EngineCommand>,

    /// Receiving half of the command channel, drained by the event loop.
    receiver: Receiver<EngineCommand>,

    /// Flag signalling whether a search is currently running.
    ///
    /// Shared with the search worker, which polls it cooperatively.
    is_searching: Arc<AtomicBool>,

    /// Handle to the currently running search thread, if any.
    search_thread: Option<JoinHandle<SearchResult>>,

    /// Transposition table, locked by the worker for the span of a search.
    ttable: Arc<Mutex<TTable>>,

    /// History heuristic table, shared the same way.
    history: Arc<Mutex<HistoryTable>>,

    /// Whether to print extra diagnostics (`debug on`).
    debug: bool,
}

impl Engine {
    /// Construct a new [`Engine`], ready to [`Engine::run`].
    pub fn new() -> Self {
        crate::init();

        let (sender, receiver) = channel();

        Self {
            position: Position::new(),
            sender,
            receiver,
            is_searching: Arc::default(),
            search_thread: None,
            ttable: Arc::default(),
            history: Arc::default(),
            debug: false,
        }
    }

    /// The engine's name and version.
    #[inline(always)]
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// The engine's authors.
    #[inline(always)]
    pub fn authors(&self) -> String {
        env!("CARGO_PKG_AUTHORS").replace(':', ", ")
    }

    /// Queue a command for the engine to execute.
    #[inline(always)]
    pub fn send_command(&self, command: EngineCommand) {
        // The receiver lives as long as the engine, so this cannot fail.
        self.sender
            .send(command)
            .expect("engine command channel closed");
    }

    /// Entrypoint of the engine.
    ///
    /// Spawns a thread that parses stdin, then executes commands in the
    /// order received until told to exit.
    pub fn run(&mut self) {
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                eprintln!("input thread stopping after fatal error: {err:#}");
            }
        });

        while let Ok(cmd) = self.receiver.recv() {
            match cmd {
                EngineCommand::Display => println!("{}", self.position),

                EngineCommand::Eval => println!("{}", Evaluator::new(&self.position)),

                EngineCommand::Exit { cleanup } => {
                    if cleanup {
                        self.stop_search();
                    }
                    break;
                }

                EngineCommand::Fen => println!("{}", self.position.to_fen()),

                EngineCommand::HashInfo => self.hash_info(),

                EngineCommand::MakeMove { mv_string } => {
                    match Move::from_uci(&self.position, &mv_string) {
                        Ok(mv) => self.position.make_move(mv),
                        Err(err) => eprintln!("{err:#}"),
                    }
                }

                EngineCommand::Moves { square } => self.moves(square),

                EngineCommand::Perft { depth } => {
                    println!("{}", perft(&mut self.position, depth));
                }

                EngineCommand::Splitperft { depth } => {
                    println!("{}", splitperft(&mut self.position, depth));
                }

                EngineCommand::Uci { command } => {
                    let line = command.join(" ");
                    match UciCommand::new(&line) {
                        // UCI spec: errors are reported and execution continues.
                        Ok(cmd) => {
                            if let Err(err) = self.handle_uci_command(cmd) {
                                eprintln!("error: {err:#}");
                            }
                        }
                        Err(err) => eprintln!("{err:#}"),
                    }
                }
            }
        }
    }

    /// Execute one [`UciCommand`].
    fn handle_uci_command(&mut self, uci: UciCommand) -> Result<()> {
        use UciCommand::*;
        match uci {
            Uci => self.uci(),

            Debug(status) => self.debug = status,

            IsReady => println!("{}", UciResponse::<&str>::ReadyOk),

            SetOption { name, value } => self.set_option(&name, value)?,

            UciNewGame => self.new_game(),

            Position { fen, moves } => self.set_position(fen, moves)?,

            Go(options) => {
                if let Some(depth) = options.perft {
                    println!("{}", splitperft(&mut self.position, depth as usize));
                    return Ok(());
                }

                let config = SearchConfig::new(options, &self.position);
                self.start_search(config);
            }

            Stop => self.set_is_searching(false),

            Quit => self.send_command(EngineCommand::Exit { cleanup: false }),

            _ => bail!("{} does not support UCI command {uci:?}", self.name()),
        }

        Ok(())
    }

    /// Respond to the `uci` handshake: identity, options, `uciok`.
    fn uci(&self) {
        println!("id name {}\nid author {}\n", self.name(), self.authors());

        for option in [
            UciOption::button("Clear Hash"),
            UciOption::spin(
                "Hash",
                TTable::DEFAULT_SIZE_MB as i32,
                TTable::MIN_SIZE_MB as i32,
                TTable::MAX_SIZE_MB as i32,
            ),
            UciOption::spin("Threads", 1, 1, 1),
        ] {
            println!("{}", UciResponse::Option(option));
        }

        println!("{}", UciResponse::<&str>::UciOk);
    }

    /// Handle `setoption name <name> [value <value>]`.
    fn set_option(&mut self, name: &str, value: Option<String>) -> Result<()> {
        match name {
            "Clear Hash" => self.clear_hash_tables(),

            "Hash" => {
                let Some(value) = value.as_ref() else {
                    bail!("usage: setoption name {name} value <value>");
                };

                let Ok(mb) = value.parse::<usize>() else {
                    bail!("expected an integer, got {value:?}");
                };

                if !(TTable::MIN_SIZE_MB..=TTable::MAX_SIZE_MB).contains(&mb) {
                    bail!(
                        "Hash must be between {} and {} MB",
                        TTable::MIN_SIZE_MB,
                        TTable::MAX_SIZE_MB
                    );
                }

                *self.ttable() = TTable::new(mb);
            }

            "Threads" => bail!("{} currently supports only 1 thread", self.name()),

            _ => bail!("unrecognized option {name:?}"),
        }

        if self.debug {
            Self::send_string(format!("option {name} set"));
        }

        Ok(())
    }

    /// Handle `position [startpos | fen <FEN>] [moves <m1> <m2> ...]`.
    ///
    /// Unparsable or illegal move tokens are reported and skipped; the
    /// remaining tokens are still applied.
    fn set_position(
        &mut self,
        fen: Option<String>,
        moves: impl IntoIterator<Item = String>,
    ) -> Result<()> {
        self.position = match fen {
            Some(fen) => fen.parse()?,
            None => Position::new(),
        };

        for mv_str in moves {
            match Move::from_uci(&self.position, &mv_str) {
                Ok(mv) => self.position.make_move(mv),
                Err(err) => Self::send_string(format!("ignoring move {mv_str:?}: {err}")),
            }
        }

        Ok(())
    }

    /// Reset all game state for a new game.
    fn new_game(&mut self) {
        self.set_is_searching(false);
        self.position = Position::new();
        self.clear_hash_tables();
    }

    /// Display all legal moves, optionally only those from one square.
    fn moves(&self, square: Option<Square>) {
        let moves = self.position.legal_moves();

        let mut list: Vec<String> = moves
            .iter()
            .filter(|mv| square.is_none() || square == Some(mv.from()))
            .map(|mv| mv.to_string())
            .collect();

        if list.is_empty() {
            println!("(none)");
        } else {
            list.sort();
            println!("{}", list.join(", "));
        }
    }

    /// Display occupancy statistics of the transposition table.
    fn hash_info(&self) {
        let ttable = self.ttable();
        let occupied = ttable.occupied();
        let capacity = ttable.capacity();
        let percent = occupied as f64 / capacity as f64 * 100.0;
        println!(
            "TT info: {}mb @ {occupied}/{capacity} entries ({percent:.2}% full)",
            ttable.size_mb()
        );
    }

    /// Clear the transposition and history tables. Called between games.
    #[inline(always)]
    fn clear_hash_tables(&mut self) {
        self.ttable().clear();
        self.history().clear();
    }

    /// Flip the searching flag.
    #[inline(always)]
    fn set_is_searching(&mut self, status: bool) {
        self.is_searching.store(status, Ordering::Relaxed);
    }

    /// Returns `true` if a search is currently running.
    #[inline(always)]
    fn is_searching(&self) -> bool {
        self.is_searching.load(Ordering::Relaxed)
    }

    /// Spawn a worker thread to search the current position.
    ///
    /// The worker gets its own copy of the position; the engine's copy is
    /// never mutated during a search.
    fn start_search(&mut self, config: SearchConfig) {
        if self.is_searching() {
            Self::send_string("a search is already running");
            return;
        }
        self.set_is_searching(true);

        let is_searching = Arc::clone(&self.is_searching);
        let mut position = self.position.clone();
        let ttable = Arc::clone(&self.ttable);
        let history = Arc::clone(&self.history);
        let debug = self.debug;

        self.search_thread = Some(thread::spawn(move || {
            // Hold both table locks for the span of the search, so nothing
            // else can mutate them mid-search.
            let mut ttable = ttable.lock().expect("TT lock poisoned at search start");
            let mut history = history.lock().expect("history lock poisoned at search start");

            if debug {
                Search::<LogDebug>::new(is_searching, config, &mut ttable, &mut history)
                    .start(&mut position)
            } else {
                Search::<LogInfo>::new(is_searching, config, &mut ttable, &mut history)
                    .start(&mut position)
            }
        }));
    }

    /// Signal the running search (if any) to stop, and block on its result.
    fn stop_search(&mut self) -> Option<SearchResult> {
        self.set_is_searching(false);

        let handle = self.search_thread.take()?;
        let result = handle.join().ok()?;

        Some(result)
    }

    /// Send a plain `info string` message.
    #[inline(always)]
    fn send_string<T: fmt::Display>(message: T) {
        let info = UciInfo::new().string(message);
        println!("{}", UciResponse::<String>::Info(Box::new(info)));
    }

    /// Lock and fetch the transposition table.
    #[inline(always)]
    fn ttable(&self) -> std::sync::MutexGuard<'_, TTable> {
        self.ttable.lock().expect("a thread holding the TT panicked")
    }

    /// Lock and fetch the history table.
    #[inline(always)]
    fn history(&self) -> std::sync::MutexGuard<'_, HistoryTable> {
        self.history
            .lock()
            .expect("a thread holding the history table panicked")
    }
}

impl Default for Engine {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

/// Loop over stdin, parsing each line and forwarding it to the engine.
///
/// UCI commands take priority; anything unrecognized is retried as an
/// engine-specific command. Parse failures are reported and skipped, never
/// fatal (per the UCI contract).
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("failed to read from stdin")?;

        // Ctrl+D / closed stdin: tell the engine to quit and stop this thread.
        if bytes == 0 {
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("failed to send exit command on EOF")?;
            bail!("stdin closed");
        }

        let line = buffer.trim();
        if line.is_empty() {
            continue;
        }

        match UciCommand::new(line) {
            Ok(_) => sender
                .send(EngineCommand::Uci {
                    command: vec![line.to_string()],
                })
                .context("failed to send UCI command")?,

            // Not a UCI command; try the engine's own command set.
            Err(UciParseError::UnrecognizedCommand { cmd: _ }) => match line.parse() {
                Ok(cmd) => sender.send(cmd).context("failed to send command")?,
                Err(err) => err.print()?,
            },

            // A UCI command with bad arguments; print usage.
            Err(uci_err) => eprintln!("{uci_err:#}"),
        }
    }
}
