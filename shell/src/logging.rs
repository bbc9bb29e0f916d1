use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use thiserror::Error;

use crate::config::LogConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
	#[error("unknown log level {0:?}")]
	Level(String),
	#[error("open log file {}: {}", .path.display(), .source)]
	File { path: PathBuf, source: io::Error },
	#[error(transparent)]
	SetLogger(#[from] log::SetLoggerError),
}

/// Installs the global logger: appends to `file` when set, stderr otherwise.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
	let level: LevelFilter = config.level.parse().map_err(|_| LoggingError::Level(config.level.clone()))?;
	let log_config = ConfigBuilder::new()
		.set_thread_level(LevelFilter::Off)
		.set_target_level(LevelFilter::Off)
		.build();

	match config.file {
		Some(ref path) => {
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.map_err(|e| LoggingError::File { path: path.clone(), source: e })?;
			WriteLogger::init(level, log_config, file)?;
		},
		None => {
			TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)?;
		},
	}
	Ok(())
}
