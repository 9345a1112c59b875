/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::Parser;
use skink::{Engine, EngineCommand};

fn main() {
    let mut engine = Engine::new();
    println!("{} by {}", engine.name(), engine.authors());

    // If a command was provided as arguments, run it and then exit.
    if let Ok(cmd) = EngineCommand::try_parse_from(std::env::args_os().skip(1)) {
        engine.send_command(cmd);
        engine.send_command(EngineCommand::Exit { cleanup: true });
    }

    engine.run();
}
