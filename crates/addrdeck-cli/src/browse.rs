//! Line-driven address browser.
//!
//! Each input line is one navigation event. The selected address is printed
//! after every successful move; on failure the previous address stays
//! current and only the error is reported.

use std::io::{BufRead, Write};
use std::str::FromStr;

use addrdeck_core::{ReceiveAddress, Session};
use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextAddress,
    PrevAddress,
    NextProfile,
    PrevProfile,
    Words,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "next" | "right" | "l" => Ok(Command::NextAddress),
            "p" | "prev" | "left" | "h" => Ok(Command::PrevAddress),
            "down" | "j" => Ok(Command::NextProfile),
            "up" | "k" => Ok(Command::PrevProfile),
            "w" | "words" => Ok(Command::Words),
            "?" | "help" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: {:?} (try `help`)", other)),
        }
    }
}

/// Print the mnemonic as two numbered columns.
pub fn write_mnemonic<W: Write>(out: &mut W, words: &[&str]) -> Result<()> {
    let half = (words.len() + 1) / 2;
    for row in 0..half {
        let left = format!("{:>2}: {}", row + 1, words[row]);
        match words.get(row + half) {
            Some(right) => writeln!(out, "{:<16}{:>2}: {}", left, row + half + 1, right)?,
            None => writeln!(out, "{}", left)?,
        }
    }
    Ok(())
}

pub fn write_address<W: Write>(out: &mut W, address: &ReceiveAddress, keep: usize) -> Result<()> {
    writeln!(out, "{}  ({})", address.label(), address.path)?;
    writeln!(out, "  {}", address.short(keep))?;
    writeln!(out, "  {}", address.address)?;
    Ok(())
}

fn write_help<W: Write>(out: &mut W) -> Result<()> {
    writeln!(
        out,
        "n/right: next address   p/left: previous address\n\
         down/j: next type       up/k: previous type\n\
         words: show mnemonic    q: quit"
    )?;
    Ok(())
}

/// Run the browser until `quit` or end of input.
pub fn run<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    out: &mut W,
    keep: usize,
) -> Result<()> {
    write_address(out, &session.current()?, keep)?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "! {}", e)?;
                continue;
            }
        };

        let moved = match command {
            Command::NextAddress => session.next_address(),
            Command::PrevAddress => session.prev_address(),
            Command::NextProfile => session.next_profile(),
            Command::PrevProfile => session.prev_profile(),
            Command::Words => {
                write_mnemonic(out, &session.get_mnemonic_words())?;
                continue;
            }
            Command::Help => {
                write_help(out)?;
                continue;
            }
            Command::Quit => break,
        };

        match moved {
            Ok(address) => write_address(out, &address, keep)?,
            Err(e) => {
                log::error!("Navigation failed: {}", e);
                writeln!(out, "! {}", e)?;
            }
        }
    }

    Ok(())
}
