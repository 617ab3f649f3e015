// repl.rs - Operator console: one command per line, answers prefixed with "# "

use std::io::{BufRead, Write};

use anyhow::Result;
use conway_gate::{CommandChannel, EngineError, GateError, Snapshot, Strategy};
use log::{debug, error};

const COMMANDS: &[(&str, &str)] = &[
    ("help", "print this text"),
    ("dump", "print current field state"),
    ("run", "run #N iterations"),
    ("stop", "break calculations"),
    ("exit", "close program"),
];

/// What the loop does after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub fn print_title(out: &mut impl Write, strategy: Strategy, workers: usize) -> Result<()> {
    writeln!(out, "########################################")?;
    writeln!(out, "##       Conway's Game of Life        ##")?;
    writeln!(out, "########################################")?;
    writeln!(out, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "# Strategy: {strategy}, {workers} workers")?;
    writeln!(out, "# To get help, type `help` command")?;
    Ok(())
}

/// Reads commands until `exit`, end of input, or the engine going away.
///
/// The engine is left running; halting it is up to the caller.
pub fn run_io_loop<R, W>(input: R, out: &mut W, commands: &CommandChannel) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, ">> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            continue;
        };
        debug!("console command: {line}");

        match execute(name, words.next(), out, commands) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(err) => {
                error!("engine unavailable: {err}");
                writeln!(out, "# Engine stopped: {err}")?;
                break;
            }
        }
    }
    writeln!(out, "# Bye!")?;
    Ok(())
}

/// Runs one command. Only engine failures come back as `Err`.
fn execute<W: Write>(
    name: &str,
    argument: Option<&str>,
    out: &mut W,
    commands: &CommandChannel,
) -> Result<Flow, EngineError> {
    let written = match name {
        "help" => print_help(out),
        "dump" => dump(out, &commands.snapshot()?),
        "run" => match argument.and_then(|arg| arg.parse::<i64>().ok()).filter(|&n| n > 0) {
            Some(n) => match commands.advance(n) {
                Ok(target) => writeln!(out, "# Running until iteration {target}"),
                Err(EngineError::Gate(err)) if err != GateError::Halted => writeln!(out, "# {err}"),
                Err(err) => return Err(err),
            },
            None => writeln!(out, "# A positive integer required!"),
        },
        "stop" => {
            let target = commands.stop()?;
            writeln!(out, "# Stopping at iteration {target}")
        }
        "exit" => return Ok(Flow::Exit),
        other => writeln!(out, "# Unknown command: {other}"),
    };
    // A console that can no longer be written to has nobody left to serve.
    Ok(if written.is_ok() { Flow::Continue } else { Flow::Exit })
}

fn print_help(out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "# Available commands:")?;
    for (name, description) in COMMANDS {
        writeln!(out, "# {name:<8} - {description}")?;
    }
    Ok(())
}

fn dump(out: &mut impl Write, snapshot: &Snapshot) -> std::io::Result<()> {
    writeln!(out, "# Current iteration: {}", snapshot.generation)?;
    for row in snapshot.rows() {
        writeln!(out, "# {row}")?;
    }
    Ok(())
}
