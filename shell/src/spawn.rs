use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd;
use thiserror::Error;

use crate::redirect::{self, Stream};

/// A failure inside a forked stage. It ends that stage only.
#[derive(Debug, Error)]
pub enum StageError {
	#[error("setsid: {0}")]
	Setsid(Errno),
	#[error("signal: {0}")]
	Signal(Errno),
	#[error("open {0} {1}: {2}")]
	Open(&'static str, String, Errno),
	#[error("dup2 {0}: {1}")]
	Dup(&'static str, Errno),
	#[error("execvp {0}: {1}")]
	Exec(String, Errno),
}

impl StageError {
	pub fn exit_code(&self) -> i32 {
		match *self {
			StageError::Exec(_, Errno::ENOENT) => 127,
			StageError::Exec(..) => 126,
			_ => libc::EXIT_FAILURE,
		}
	}
}

/// Per-stage process policy, applied in the child before exec.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SpawnOptions {
	pub detach_session: bool,
	pub ignore_hangup: bool,
}

impl SpawnOptions {
	pub fn for_pipeline(is_background: bool) -> SpawnOptions {
		SpawnOptions { detach_session: is_background, ignore_hangup: is_background }
	}
}

/// Descriptors and redirection targets handed to one stage.
///
/// `pipe_in` is the read end left over from the previous stage, `pipe_out`
/// the `(read, write)` pair created for this stage's output. The child owns
/// both after fork and closes every raw end before exec.
#[derive(Debug, Default)]
pub struct StageIo<'a> {
	pub pipe_in: Option<OwnedFd>,
	pub pipe_out: Option<(OwnedFd, OwnedFd)>,
	pub stdin_file: Option<&'a CStr>,
	pub stdout_file: Option<&'a CStr>,
	pub stderr_file: Option<&'a CStr>,
}

fn dup_onto(fd: &OwnedFd, stream: Stream) -> Result<(), StageError> {
	unistd::dup2(fd.as_raw_fd(), stream.fd())
		.map(|_| ())
		.map_err(|e| StageError::Dup(stream.name(), e))
}

fn rewire(io: StageIo, opts: SpawnOptions) -> Result<(), StageError> {
	if opts.detach_session {
		unistd::setsid().map_err(StageError::Setsid)?;
	}

	match io.pipe_in {
		Some(ref fd) => dup_onto(fd, Stream::Stdin)?,
		None => if let Some(path) = io.stdin_file {
			redirect::redirect(path, Stream::Stdin)?;
		},
	}
	match io.pipe_out {
		Some((_, ref write)) => dup_onto(write, Stream::Stdout)?,
		None => if let Some(path) = io.stdout_file {
			redirect::redirect(path, Stream::Stdout)?;
		},
	}
	if let Some(path) = io.stderr_file {
		redirect::redirect(path, Stream::Stderr)?;
	}

	drop(io.pipe_in);
	drop(io.pipe_out);

	// The Rust runtime ignores SIGPIPE and exec keeps ignored dispositions.
	let r = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
	r.map_err(StageError::Signal)?;
	if opts.ignore_hangup {
		let r = unsafe { signal::signal(Signal::SIGHUP, SigHandler::SigIgn) };
		r.map_err(StageError::Signal)?;
	}
	Ok(())
}

fn die(err: StageError) -> ! {
	let msg = format!("psh: {}\n", err);
	let _ = unistd::write(io::stderr(), msg.as_bytes());
	unsafe { libc::_exit(err.exit_code()) }
}

/// Turns the freshly forked child into stage `argv`. Never returns: either the
/// process image is replaced or the child exits with a failure status.
pub fn exec_stage(argv: &[CString], io: StageIo, opts: SpawnOptions) -> ! {
	if let Err(e) = rewire(io, opts) {
		die(e);
	}
	let program = &argv[0];
	match unistd::execvp(program, argv) {
		Ok(never) => match never {},
		Err(e) => die(StageError::Exec(program.to_string_lossy().into_owned(), e)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn background_stages_detach_and_ignore_hangup() {
		assert_eq!(SpawnOptions::for_pipeline(true), SpawnOptions { detach_session: true, ignore_hangup: true });
		assert_eq!(SpawnOptions::for_pipeline(false), SpawnOptions::default());
	}

	#[test]
	fn exit_codes_distinguish_exec_failures() {
		assert_eq!(StageError::Exec("nope".to_string(), Errno::ENOENT).exit_code(), 127);
		assert_eq!(StageError::Exec("dir".to_string(), Errno::EACCES).exit_code(), 126);
		assert_eq!(StageError::Setsid(Errno::EPERM).exit_code(), 1);
		assert_eq!(StageError::Open("stdin", "missing".to_string(), Errno::ENOENT).exit_code(), 1);
	}

	#[test]
	fn diagnostics_name_the_operation() {
		let e = StageError::Open("stdin", "missing.txt".to_string(), Errno::ENOENT);
		assert!(e.to_string().starts_with("open stdin missing.txt: "));
		let e = StageError::Exec("nope".to_string(), Errno::ENOENT);
		assert!(e.to_string().starts_with("execvp nope: "));
	}
}
