use std::fs::File;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

use crate::error::{Error, Result};

/// Logger sink selection (design notes §9's `{console, file, null}` variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    /// Terminal output only.
    Console,
    /// Terminal output plus one file sink per worker, `worker-<id>.log`.
    File,
    /// No logging at all.
    Null,
}

/// Maps `-v`/`-q` occurrence counts to a level, `Info` at the default (0, 0).
pub fn level_from_verbosity(verbose: u8, quiet: u8) -> LevelFilter {
    let base = LevelFilter::Info as i64;
    let shifted = base + verbose as i64 - quiet as i64;
    match shifted.clamp(LevelFilter::Off as i64, LevelFilter::Trace as i64) {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the process-wide logger. `threads` sizes the worker file sinks
/// when `sink` is [`Sink::File`]; each worker gets its own `worker-<id>.log`
/// so concurrent writers never interleave into one file (§5's per-worker
/// logger-sink requirement).
pub fn init(sink: Sink, level: LevelFilter, threads: usize) -> Result<()> {
    if sink == Sink::Null {
        return Ok(());
    }

    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![TermLogger::new(level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto)];

    if sink == Sink::File {
        for worker in 0..threads.max(1) {
            loggers.push(worker_logger(worker, level, config.clone())?);
        }
    }

    CombinedLogger::init(loggers).map_err(|err| Error::InternalError(err.to_string()))
}

fn worker_logger(worker: usize, level: LevelFilter, config: Config) -> Result<Box<dyn SharedLogger>> {
    let path = format!("worker-{worker}.log");
    let file = File::create(&path).map_err(|_| Error::FileError(path))?;
    Ok(WriteLogger::new(level, config, file))
}
