//! Configuration management command
//!
//! Provides CLI interface to view and edit the labwatch configuration.

use anyhow::{Context, Result};
use cli_lib::config;
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration
pub async fn run_show() -> Result<()> {
    let app = config::load()?;
    let config_path = config::config_file_path()?;

    println!("{}", "Labwatch Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    match &app.labpath {
        Some(lab) => println!("{} = {}", "labpath".cyan(), lab.display()),
        None => println!("{} = {}", "labpath".cyan(), "(unset)".dimmed()),
    }

    let watcher = &app.watcher;
    println!("\n{}", "[watcher]".yellow());
    println!(
        "  {} = {} {}",
        "poll_interval_ms".cyan(),
        watcher.poll_interval_ms,
        format!("({:?})", watcher.poll_interval()).dimmed()
    );

    println!("\n{}", "[watcher.ignore]".yellow());
    println!("  {} = {}", "ignore_hidden".cyan(), watcher.ignore.ignore_hidden);
    println!("  {} = {}", "use_labignore".cyan(), watcher.ignore.use_labignore);
    println!("  {} = {:?}", "ignored_paths".cyan(), watcher.ignore.ignored_paths);
    println!("  {} = {:?}", "patterns".cyan(), watcher.ignore.patterns);

    println!("\n{}", "Valid Ranges:".bold());
    println!(
        "  poll_interval_ms: {}-{}",
        watcher::config::MIN_POLL_INTERVAL_MS,
        watcher::config::MAX_POLL_INTERVAL_MS
    );

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = config::config_file_path()?;

    if create && config::init_if_missing()? {
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Point the configuration at a lab directory
pub async fn run_set_lab(path: &Path) -> Result<()> {
    let lab = std::path::absolute(path)
        .with_context(|| format!("Invalid lab path: {}", path.display()))?;
    if !lab.is_dir() {
        anyhow::bail!("Lab path is not a directory: {}", lab.display());
    }

    let mut app = config::load()?;
    app.labpath = Some(lab.clone());
    config::save(&app)?;

    println!("{} {} = {}", "✓".green(), "labpath".cyan(), lab.display());
    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
