use std::ffi::{CStr, CString, NulError};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::unistd;
use serde::{Deserialize, Serialize};

use crate::spawn::StageError;
use crate::types::Pipeline;

/// Which stages receive the pipeline's `2>` target.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StderrRedirect {
	#[default]
	EveryStage,
	LastStage,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stream { Stdin, Stdout, Stderr }

impl Stream {
	pub fn fd(self) -> RawFd {
		match self {
			Stream::Stdin => libc::STDIN_FILENO,
			Stream::Stdout => libc::STDOUT_FILENO,
			Stream::Stderr => libc::STDERR_FILENO,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Stream::Stdin => "stdin",
			Stream::Stdout => "stdout",
			Stream::Stderr => "stderr",
		}
	}

	fn flags(self) -> OFlag {
		match self {
			Stream::Stdin => OFlag::O_RDONLY | OFlag::O_CLOEXEC,
			Stream::Stdout | Stream::Stderr =>
				OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_CLOEXEC,
		}
	}
}

/// Redirection targets converted up front, so a child only has to open them.
#[derive(Debug)]
pub struct Redirections {
	stdin: Option<CString>,
	stdout: Option<CString>,
	stderr: Option<CString>,
	stderr_policy: StderrRedirect,
}

fn to_cstring(path: &Option<PathBuf>) -> Result<Option<CString>, NulError> {
	path.as_ref().map(|p| path_cstring(p)).transpose()
}

fn path_cstring(path: &Path) -> Result<CString, NulError> {
	CString::new(path.as_os_str().as_bytes())
}

impl Redirections {
	pub fn resolve(pipeline: &Pipeline, stderr_policy: StderrRedirect) -> Result<Redirections, NulError> {
		Ok(Redirections {
			stdin: to_cstring(&pipeline.rstdin)?,
			stdout: to_cstring(&pipeline.rstdout)?,
			stderr: to_cstring(&pipeline.rstderr)?,
			stderr_policy: stderr_policy,
		})
	}

	/// Only the first stage reads the input file.
	pub fn stdin_for(&self, is_first: bool) -> Option<&CStr> {
		if is_first { self.stdin.as_deref() } else { None }
	}

	/// Only the last stage writes the output file.
	pub fn stdout_for(&self, is_last: bool) -> Option<&CStr> {
		if is_last { self.stdout.as_deref() } else { None }
	}

	pub fn stderr_for(&self, is_last: bool) -> Option<&CStr> {
		match self.stderr_policy {
			StderrRedirect::EveryStage => self.stderr.as_deref(),
			StderrRedirect::LastStage if is_last => self.stderr.as_deref(),
			StderrRedirect::LastStage => None,
		}
	}
}

/// Opens `path` in the mode `stream` needs and moves it onto `stream`.
/// Runs in the child between fork and exec.
pub fn redirect(path: &CStr, stream: Stream) -> Result<(), StageError> {
	let fd = fcntl::open(path, stream.flags(), Mode::from_bits_truncate(0o666))
		.map_err(|e| StageError::Open(stream.name(), path.to_string_lossy().into_owned(), e))?;
	// With the stream closed beforehand, open hands back the stream itself;
	// it must then survive exec.
	if fd == stream.fd() {
		return fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))
			.map(|_| ())
			.map_err(|e| StageError::Dup(stream.name(), e));
	}
	let r = unistd::dup2(fd, stream.fd()).map(|_| ()).map_err(|e| StageError::Dup(stream.name(), e));
	let _ = unistd::close(fd);
	r
}
