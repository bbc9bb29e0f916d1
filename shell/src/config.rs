use std::env;
use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::redirect::StderrRedirect;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub shell: ShellConfig,
	#[serde(default)]
	pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ShellConfig {
	pub prompt: String,
	pub debug_print: bool,
	pub reap_background: bool,
	pub stderr_redirect: StderrRedirect,
}

impl Default for ShellConfig {
	fn default() -> ShellConfig {
		ShellConfig {
			prompt: "> ".to_string(),
			debug_print: false,
			reap_background: true,
			stderr_redirect: StderrRedirect::EveryStage,
		}
	}
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogConfig {
	pub level: String,
	pub file: Option<PathBuf>,
}

impl Default for LogConfig {
	fn default() -> LogConfig {
		LogConfig { level: "warn".to_string(), file: None }
	}
}

// Overlay: every field optional, present ones override the defaults.

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
	#[serde(default)]
	shell: ShellOverlay,
	#[serde(default)]
	log: LogOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct ShellOverlay {
	prompt: Option<String>,
	debug_print: Option<bool>,
	reap_background: Option<bool>,
	stderr_redirect: Option<StderrRedirect>,
}

#[derive(Debug, Deserialize, Default)]
struct LogOverlay {
	level: Option<String>,
	file: Option<PathBuf>,
}

impl Config {
	pub fn default_config() -> Config {
		toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
			warn!("embedded config does not parse: {}", e);
			Config { shell: ShellConfig::default(), log: LogConfig::default() }
		})
	}

	/// Embedded defaults, then the user's `psh/config.toml` on top.
	pub fn load() -> Config {
		let mut config = Config::default_config();
		if let Some(path) = Config::user_path() {
			if let Ok(content) = fs::read_to_string(&path) {
				if let Err(e) = config.apply_str(&content) {
					eprintln!("psh: config {}: {}", path.display(), e);
				}
			}
		}
		config
	}

	fn user_path() -> Option<PathBuf> {
		let base = match env::var_os("XDG_CONFIG_HOME") {
			Some(dir) if !dir.is_empty() => PathBuf::from(dir),
			_ => PathBuf::from(env::var_os("HOME")?).join(".config"),
		};
		Some(base.join("psh").join("config.toml"))
	}

	/// Parses `toml_str` as an overlay and applies it. On error the config is
	/// left untouched.
	pub fn apply_str(&mut self, toml_str: &str) -> Result<(), toml::de::Error> {
		let overlay: ConfigOverlay = toml::from_str(toml_str)?;
		self.apply_overlay(overlay);
		Ok(())
	}

	fn apply_overlay(&mut self, overlay: ConfigOverlay) {
		let s = overlay.shell;
		if let Some(v) = s.prompt { self.shell.prompt = v; }
		if let Some(v) = s.debug_print { self.shell.debug_print = v; }
		if let Some(v) = s.reap_background { self.shell.reap_background = v; }
		if let Some(v) = s.stderr_redirect { self.shell.stderr_redirect = v; }

		let l = overlay.log;
		if let Some(v) = l.level { self.log.level = v; }
		if l.file.is_some() { self.log.file = l.file; }
	}
}
