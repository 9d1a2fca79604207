//! Watch the lab and print changes until Ctrl-C

use anyhow::{Context, Result};
use cli_lib::bridge::{self, OutputFormat};
use cli_lib::config::{self, ConfigFileSource};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use watcher::{LabPathSource, SharedLabPath, Watcher};

/// Options of `labwatch watch`; unset values come from the config file
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub lab: Option<PathBuf>,
    pub interval_ms: Option<u64>,
    pub json: bool,
    pub show_hidden: bool,
}

pub async fn run(options: WatchOptions) -> Result<()> {
    let app = config::load()?;

    let mut watcher_config = app.watcher.clone();
    if let Some(interval_ms) = options.interval_ms {
        watcher_config.poll_interval_ms = interval_ms;
    }
    if options.show_hidden {
        watcher_config.ignore.ignore_hidden = false;
    }
    watcher_config.validate().context("Invalid watch options")?;

    let lab: Arc<dyn LabPathSource> = match options.lab {
        Some(path) => {
            let path = std::path::absolute(&path)
                .with_context(|| format!("Invalid lab path: {}", path.display()))?;
            if !path.is_dir() {
                anyhow::bail!("Lab path is not a directory: {}", path.display());
            }
            let shared = SharedLabPath::new();
            shared.set(path);
            Arc::new(shared)
        }
        None => Arc::new(ConfigFileSource::new(config::config_file_path()?)),
    };

    let lab_root = lab.lab_path();
    let watcher = Arc::new(
        Watcher::from_config(lab_root.as_deref(), &watcher_config)
            .context("Failed to set up the watcher")?,
    );
    let format = if options.json { OutputFormat::Json } else { OutputFormat::Pretty };
    let interval = watcher_config.poll_interval();

    if lab_root.is_none() && !options.json {
        println!(
            "{}",
            "No lab configured yet; waiting for `labwatch config set-lab <path>`".yellow()
        );
    }

    let bridge = {
        let watcher = Arc::clone(&watcher);
        let lab = Arc::clone(&lab);
        tokio::task::spawn_blocking(move || {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            bridge::run(&watcher, lab.as_ref(), format, &mut out)
        })
    };

    let mut poller = {
        let watcher = Arc::clone(&watcher);
        let lab = Arc::clone(&lab);
        tokio::task::spawn_blocking(move || watcher.start_lab(lab.as_ref(), interval))
    };

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Interrupt received, shutting down");
            None
        }
        finished = &mut poller => Some(finished),
    };

    watcher.close();
    let polled = match finished {
        Some(finished) => finished,
        None => poller.await,
    };
    polled.context("Poll loop panicked")??;

    let summary = bridge.await.context("Event bridge panicked")??;
    if !options.json {
        println!(
            "\n{} {} events, {} errors",
            "Stopped.".bold(),
            summary.events,
            summary.errors
        );
    }

    Ok(())
}
