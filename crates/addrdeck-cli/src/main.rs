//! addrdeck — headless receive-address browser
//!
//! Generates a fresh 12-word mnemonic, shows it for backup, then lets you
//! step through native segwit, nested segwit and taproot receive addresses.
//! Nothing is written to disk.
//!
//! # Usage
//!
//! ```bash
//! addrdeck                          # new mnemonic, interactive browsing
//! addrdeck --list 5                 # first 5 addresses of every type
//! addrdeck --entropy 00..00 --json  # deterministic, machine-readable
//! addrdeck --config addrdeck.toml --validate
//! ```

mod browse;
mod config;

use std::io::{self, Write};
use std::path::PathBuf;

use addrdeck_core::{ReceiveAddress, Session};
use anyhow::{Context, Result};
use rand::rngs::OsRng;
use serde::Serialize;
use zeroize::Zeroizing;

#[derive(Serialize)]
struct Listing<'a> {
    network: String,
    addresses: &'a [ReceiveAddress],
}

/// Options gathered from the command line.
#[derive(Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    entropy_hex: Option<Zeroizing<String>>,
    list: Option<u32>,
    json: bool,
    validate_only: bool,
}

enum Invocation {
    Run(CliArgs),
    Help,
    Version,
}

// Parse CLI args (minimal — no clap dependency needed)
fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut cli = CliArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                match args.get(i) {
                    Some(path) => cli.config_path = Some(PathBuf::from(path)),
                    None => anyhow::bail!("--config requires a path argument"),
                }
            }
            "--entropy" => {
                i += 1;
                match args.get(i) {
                    Some(hex) => cli.entropy_hex = Some(Zeroizing::new(hex.clone())),
                    None => anyhow::bail!("--entropy requires a hex argument"),
                }
            }
            "--list" => {
                i += 1;
                let count = args
                    .get(i)
                    .context("--list requires a count")?
                    .parse::<u32>()
                    .context("--list count must be a number")?;
                cli.list = Some(count);
            }
            "--json" => {
                cli.json = true;
            }
            "--validate" => {
                cli.validate_only = true;
            }
            "--help" | "-h" => return Ok(Invocation::Help),
            "--version" | "-V" => return Ok(Invocation::Version),
            other => {
                anyhow::bail!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    anyhow::ensure!(cli.list.is_some() || !cli.json, "--json requires --list");
    Ok(Invocation::Run(cli))
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args)? {
        Invocation::Run(cli) => cli,
        Invocation::Help => {
            print_help();
            return Ok(());
        }
        Invocation::Version => {
            println!("addrdeck {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("ADDRDECK_CONFIG").ok().map(PathBuf::from));

    // Load config
    let mut app_config = match &config_path {
        Some(path) => config::AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => config::AppConfig::default(),
    };

    // Apply env overrides
    let ignored_overrides = app_config.apply_env_overrides();

    // Validate
    app_config
        .validate()
        .context("Configuration validation failed")?;

    // Init logger
    std::env::set_var("RUST_LOG", &app_config.display.log_level);
    env_logger::init();
    for message in &ignored_overrides {
        log::warn!("{}", message);
    }

    let network = app_config.network()?;

    if cli.validate_only {
        println!("✅ Configuration is valid.");
        println!("  Network:        {}", network);
        println!("  Entropy:        {} bytes", app_config.wallet.entropy_bytes);
        println!("  Start profile:  {}", app_config.wallet.start_profile);
        println!("  Short address:  {} chars", app_config.display.short_address_chars);
        return Ok(());
    }

    let mut session = match cli.entropy_hex {
        Some(hex_str) => {
            let entropy = Zeroizing::new(
                hex::decode(hex_str.trim()).context("--entropy must be hex")?,
            );
            Session::from_entropy(&entropy, network)?
        }
        None => Session::generate(&mut OsRng, network, app_config.wallet.entropy_bytes)?,
    };
    log::info!("Session ready on {}", network);

    let start = session
        .profile_of(app_config.wallet.start_profile)
        .context("start profile not available")?;
    session.select(start, 0)?;

    let keep = app_config.display.short_address_chars;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(count) = cli.list {
        let mut addresses = Vec::new();
        for profile in 0..session.profile_count() {
            for index in 0..count {
                addresses.push(session.get_receive_address(profile, index)?);
            }
        }

        if cli.json {
            let listing = Listing {
                network: network.to_string(),
                addresses: &addresses,
            };
            serde_json::to_writer_pretty(&mut out, &listing)?;
            writeln!(out)?;
        } else {
            for address in &addresses {
                browse::write_address(&mut out, address, keep)?;
            }
        }
        return Ok(());
    }

    writeln!(out, "Write down these words:\n")?;
    browse::write_mnemonic(&mut out, &session.get_mnemonic_words())?;
    writeln!(out, "\n(type `help` for commands)\n")?;

    browse::run(&mut session, io::stdin().lock(), &mut out, keep)
}

fn print_help() {
    println!(
        r#"addrdeck — receive-address browser

USAGE:
    addrdeck [OPTIONS]

OPTIONS:
    -c, --config <PATH>   Config file path (TOML)
    --entropy <HEX>       Use the given entropy instead of a random one
    --list <N>            Print the first N receive addresses of every type and exit
    --json                Print the --list output as JSON (requires --list)
    --validate            Validate configuration and exit
    -h, --help            Show this help message
    -V, --version         Show version

ENVIRONMENT VARIABLES (override config file):
    ADDRDECK_CONFIG         Config file path
    ADDRDECK_NETWORK        Bitcoin network (bitcoin/testnet/signet/regtest)
    ADDRDECK_ENTROPY_BYTES  Entropy size (16/20/24/28/32)
    ADDRDECK_LOG_LEVEL      Log level (error/warn/info/debug/trace)
    ADDRDECK_START_PROFILE  native-segwit / nested-segwit / taproot
"#
    );
}
