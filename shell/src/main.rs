use std::io;
use std::io::{BufRead, Write};
use std::process;

use log::{debug, error};

use psh::config::Config;
use psh::eval::{self, EvalResult, ExecOptions};
use psh::job::{self, WaitStatusExt};
use psh::{logging, parser};

fn main() {
	let config = Config::load();
	if let Err(e) = logging::init(&config.log) {
		eprintln!("psh: logging disabled: {}", e);
	}
	let opts = ExecOptions { stderr_redirect: config.shell.stderr_redirect };

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if config.shell.reap_background {
			job::reap_finished();
		}

		let _ = stdout.write_all(config.shell.prompt.as_bytes());
		let _ = stdout.flush();
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => {
				let _ = writeln!(stdout, "EOF");
				process::exit(0);
			},
			Ok(_) => {},
			Err(e) => {
				eprintln!("psh: read: {}", e);
				process::exit(1);
			},
		}

		let line = line.trim_ascii();
		if line.is_empty() {
			continue;
		}

		let pipeline = match parser::parse(line) {
			Ok(p) => p,
			Err(e) => {
				debug!("parse error: {}", e);
				let _ = writeln!(stdout, "Parse ERROR");
				continue;
			},
		};
		if config.shell.debug_print {
			let _ = write!(stdout, "{}", pipeline);
		}

		match eval::eval(pipeline, &opts, &mut stdout) {
			Ok(EvalResult::Done(statuses)) => {
				debug!("foreground job done, status {:?}", statuses.last().cloned().flatten().and_then(|s| s.code()));
			},
			Ok(_) => {},
			Err(e) => {
				eprintln!("psh: {}", e);
				if e.is_fatal() {
					error!("aborting: {}", e);
					process::exit(1);
				}
			},
		}
	}
}
