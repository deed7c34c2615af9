/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Interactive pattern-matcher CLI: drives [`vartier::trie::Trie`] from
//! a REPL or a batch script, persisting trie files through the trie's
//! own codec-backed save/load.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use vartier::trie::Trie;

#[derive(Parser, Debug)]
#[command(name = "pattern-cli", about = "Dotted-segment pub/sub pattern matcher", long_about = None)]
struct Cli {
    /// Run the built-in self-check scenario and exit.
    #[arg(long)]
    test: bool,

    /// Read commands from FILE (or stdin if omitted) instead of an
    /// interactive prompt. Lines starting with `#` are comments.
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "-")]
    batch: Option<String>,

    /// Increase log verbosity (also controllable via RUST_LOG).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

struct Session {
    trie: Trie,
}

impl Session {
    fn new() -> Self {
        Self { trie: Trie::new() }
    }

    /// Executes one line of CLI grammar, printing a single-line
    /// `✓`/`✗` result. Returns `Ok(true)` to keep the session running,
    /// `Ok(false)` on `quit`.
    fn execute(&mut self, line: &str) -> Result<bool> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else {
            return Ok(true);
        };
        match cmd {
            "add" | "subscribe" => match parts.as_slice() {
                [_, pattern, id, name] => match id.parse::<u64>() {
                    Ok(id) => match self.trie.insert(pattern, id, name) {
                        Ok(()) => println!("\u{2713} subscribed {name} (id {id}) to {pattern}"),
                        Err(e) => println!("\u{2717} {e}"),
                    },
                    Err(_) => println!("\u{2717} invalid subscriber id: {id}"),
                },
                _ => println!("\u{2717} usage: add <pattern> <id> <name>"),
            },
            "remove" | "unsubscribe" => match parts.as_slice() {
                [_, pattern, id] => match id.parse::<u64>() {
                    Ok(id) => match self.trie.remove(pattern, id) {
                        Ok(()) => println!("\u{2713} removed id {id} from {pattern}"),
                        Err(e) => println!("\u{2717} {e}"),
                    },
                    Err(_) => println!("\u{2717} invalid subscriber id: {id}"),
                },
                _ => println!("\u{2717} usage: remove <pattern> <id>"),
            },
            "match" => match parts.as_slice() {
                [_, input] => match self.trie.match_input(input) {
                    Ok(subs) => {
                        if subs.is_empty() {
                            println!("\u{2713} no matches for {input}");
                        } else {
                            let names: Vec<String> = subs.iter().map(|s| format!("{}({})", s.name, s.id)).collect();
                            println!("\u{2713} {input} matched: {}", names.join(", "));
                        }
                    }
                    Err(e) => println!("\u{2717} {e}"),
                },
                _ => println!("\u{2717} usage: match <input>"),
            },
            "list" => {
                let entries = self.trie.list();
                if entries.is_empty() {
                    println!("\u{2713} no patterns registered");
                } else {
                    for (pattern, subs) in entries {
                        let names: Vec<String> = subs.iter().map(|s| format!("{}({})", s.name, s.id)).collect();
                        println!("\u{2713} {pattern}: {}", names.join(", "));
                    }
                }
            }
            "stats" => {
                let (patterns, nodes, subscribers) = self.trie.stats();
                println!("\u{2713} patterns={patterns} nodes={nodes} subscribers={subscribers}");
            }
            "save" => match parts.as_slice() {
                [_, path] => match std::fs::write(path, self.trie.save()) {
                    Ok(()) => println!("\u{2713} saved to {path}"),
                    Err(e) => println!("\u{2717} {e}"),
                },
                _ => println!("\u{2717} usage: save <file>"),
            },
            "load" => match parts.as_slice() {
                [_, path] => match std::fs::read(path).map_err(anyhow::Error::from).and_then(|bytes| Trie::load(&bytes).map_err(anyhow::Error::from)) {
                    Ok(trie) => {
                        self.trie = trie;
                        println!("\u{2713} loaded from {path}");
                    }
                    Err(e) => println!("\u{2717} {e}"),
                },
                _ => println!("\u{2717} usage: load <file>"),
            },
            "help" => print_help(),
            "quit" => return Ok(false),
            other => println!("\u{2717} unknown command: {other} (try 'help')"),
        }
        Ok(true)
    }
}

fn print_help() {
    println!(
        "commands: add <pattern> <id> <name> | remove <pattern> <id> | subscribe <pattern> <id> <name> | \
         unsubscribe <pattern> <id> | match <input> | list | stats | save <file> | load <file> | help | quit"
    );
}

/// Runs a small built-in insert/match/persistence self-check, printing
/// a `✓`/`✗` line per check and returning whether all of them passed.
fn self_check() -> bool {
    let mut trie = Trie::new();
    let checks: Vec<(&str, bool)> = vec![
        (
            "insert/match union",
            (|| -> Result<bool, vartier::error::Error> {
                trie.insert("stock.*.aapl", 1, "a")?;
                trie.insert("stock.#", 2, "b")?;
                trie.insert("stock.nasdaq.aapl", 3, "c")?;
                let mut ids: Vec<u64> = trie.match_input("stock.nasdaq.aapl")?.into_iter().map(|s| s.id).collect();
                ids.sort_unstable();
                Ok(ids == vec![1, 2, 3])
            })()
            .unwrap_or(false),
        ),
        (
            "hash matches trailing segment",
            trie.match_input("stock.nasdaq.aapl.trade").map(|v| v.len() == 1 && v[0].id == 2).unwrap_or(false),
        ),
        (
            "save/load round trip is byte identical",
            {
                let a = trie.save();
                let b = trie.save();
                a == b && Trie::load(&a).is_ok()
            },
        ),
    ];
    let mut all_passed = true;
    for (name, passed) in &checks {
        println!("{} {name}", if *passed { "\u{2713}" } else { "\u{2717}" });
        all_passed &= passed;
    }
    all_passed
}

fn run_lines(reader: impl BufRead, interactive: bool) -> Result<()> {
    let mut session = Session::new();
    let stdout = io::stdout();
    for line in reader.lines() {
        let line = line.context("failed to read input line")?;
        let trimmed = line.trim();
        if interactive {
            print!("> ");
            stdout.lock().flush().ok();
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !session.execute(trimmed)? {
            break;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.test {
        let passed = self_check();
        std::process::exit(if passed { 0 } else { 1 });
    }

    match cli.batch {
        Some(path) if path != "-" => {
            let file = std::fs::File::open(&path);
            match file {
                Ok(f) => run_lines(io::BufReader::new(f), false)?,
                Err(e) => {
                    eprintln!("cannot open file: {path}: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(_) => run_lines(io::BufReader::new(io::stdin().lock()), false)?,
        None => {
            print_help();
            run_lines(io::BufReader::new(io::stdin().lock()), true)?;
        }
    }
    Ok(())
}
