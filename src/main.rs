// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use blockseq::config::{validate_settings, SettingsEvent, SettingsWatcher};
use blockseq::host::{DocumentId, FileHost, DEFAULT_LANGUAGE};

fn print_usage() {
    println!("blockseq - live pattern blocks in markdown documents");
    println!();
    println!("Usage: blockseq [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --blocks <FILE> [LANG]    List pattern blocks in a document (default language {})", DEFAULT_LANGUAGE);
    println!("  --check-settings <FILE>   Validate a YAML or TOML settings file");
    println!("  --watch-settings <FILE>   Print reload events while a settings file is edited");
    println!("  --help                    Show this help message");
    println!();
    println!("Set RUST_LOG to control log output (default: info)");
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn list_blocks(path: &str, language: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let host = FileHost::new(language);
    let document = DocumentId::from_path(path);

    let parsed = runtime
        .block_on(host.load(&document))
        .with_context(|| format!("Failed to load document {}", path))?;

    if parsed.blocks().is_empty() {
        println!("No `{}` blocks found in {}", language, path);
        return Ok(());
    }

    println!("{} block(s) in {}:", parsed.blocks().len(), path);
    for block in parsed.blocks() {
        let first_line = block.text.lines().next().unwrap_or("");
        println!(
            "  {:<12} lines {:<9} {}",
            block.id.as_str(),
            // 1-based for display
            format!("{}-{}", block.range.start_line + 1, block.range.end_line),
            first_line
        );
    }
    Ok(())
}

fn check_settings(path: &str) -> Result<()> {
    let settings = validate_settings(path)?;
    println!("Settings OK: {}", path);
    print!("{}", settings.to_yaml()?);
    Ok(())
}

fn watch_settings(path: &str) -> Result<()> {
    let watcher = SettingsWatcher::new(path, None)?;
    println!("Watching {} (press Ctrl+C to stop)...", watcher.watched_path().display());

    while let Some(event) = watcher.recv() {
        match event {
            SettingsEvent::Reloaded(settings) => {
                println!(
                    "Reloaded: tempo {} BPM, auto-evaluate {}",
                    settings.evaluation.default_tempo,
                    if settings.evaluation.auto_evaluate_enabled { "on" } else { "off" }
                );
            }
            SettingsEvent::Error(message) => eprintln!("Error: {}", message),
            SettingsEvent::Removed(path) => println!("Removed: {}", path.display()),
        }
    }
    Ok(())
}

fn require_arg<'a>(args: &'a [String], flag: &str) -> &'a str {
    match args.get(2) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a file path", flag);
            std::process::exit(1);
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("blockseq - live pattern blocks in markdown documents");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--blocks" => {
            let path = require_arg(&args, "--blocks");
            let language = args.get(3).map(String::as_str).unwrap_or(DEFAULT_LANGUAGE);
            list_blocks(path, language)?;
        }
        "--check-settings" => {
            check_settings(require_arg(&args, "--check-settings"))?;
        }
        "--watch-settings" => {
            watch_settings(require_arg(&args, "--watch-settings"))?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
