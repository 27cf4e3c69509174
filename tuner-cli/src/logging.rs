use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;

pub fn default_log_path() -> PathBuf {
    env::temp_dir().join("tuner_trace.log")
}

pub fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logs to stderr. Used when nothing else owns the terminal.
pub fn init_stderr(verbose: u8) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbose))
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("could not install logger: {e}"))
}

/// Logs to a file so the full-screen UI stays clean.
pub fn init_file(verbose: u8, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(level_for(verbose))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow!("could not install logger: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), Level::WARN);
        assert_eq!(level_for(1), Level::INFO);
        assert_eq!(level_for(2), Level::DEBUG);
        assert_eq!(level_for(9), Level::TRACE);
    }
}
