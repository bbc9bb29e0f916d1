use std::ffi::{self, CString};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::OwnedFd;

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::WaitStatus;
use nix::unistd::{self, ForkResult};
use thiserror::Error;

use crate::job::{Job, JobBuilder};
use crate::redirect::{Redirections, StderrRedirect};
use crate::spawn::{self, SpawnOptions, StageIo};
use crate::types::Pipeline;

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("fork: {0}")]
	Fork(Errno),
	#[error("pipe: {0}")]
	Pipe(Errno),
	#[error("waitpid: {0}")]
	Wait(Errno),
	#[error("nul char in argument or path: {0}")]
	Nul(#[from] ffi::NulError),
	#[error("empty command")]
	EmptyCommand,
}

impl ExecError {
	/// Fork and pipe failures abort the shell itself.
	pub fn is_fatal(&self) -> bool {
		match *self {
			ExecError::Fork(_) | ExecError::Pipe(_) => true,
			_ => false,
		}
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecOptions {
	pub stderr_redirect: StderrRedirect,
}

#[derive(Debug)]
pub enum EvalResult {
	/// Nothing to run.
	Empty,
	/// Foreground job finished; one entry per stage in spawn order, `None`
	/// where the stage had already been collected elsewhere.
	Done(Vec<Option<WaitStatus>>),
	/// Background job left running.
	Running(Job),
}

fn prepare_argvs(pipeline: &Pipeline) -> Result<Vec<Vec<CString>>, ExecError> {
	let mut argvs = Vec::with_capacity(pipeline.len());
	for stage in pipeline.iter() {
		if stage.argv.is_empty() {
			return Err(ExecError::EmptyCommand);
		}
		let argv: Result<Vec<CString>, ffi::NulError> = stage.argv.iter().map(|s| CString::new(s.as_bytes())).collect();
		argvs.push(argv?);
	}
	Ok(argvs)
}

fn spawn_stages(argvs: &[Vec<CString>], redirections: &Redirections, opts: SpawnOptions,
                job_builder: &mut JobBuilder) -> Result<(), ExecError> {
	let mut pipe_in: Option<OwnedFd> = None;
	for (i, argv) in argvs.iter().enumerate() {
		let is_first = i == 0;
		let is_last = i + 1 == argvs.len();
		let pipe_out = if is_last {
			None
		} else {
			let pair = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
			debug!("pipe {:?} between stage {} and {}", pair, i, i + 1);
			Some(pair)
		};
		match job_builder.push_fork().map_err(ExecError::Fork)? {
			ForkResult::Parent { .. } => {
				// The child has its own copies now.
				drop(pipe_in.take());
				pipe_in = pipe_out.map(|(read, write)| {
					drop(write);
					read
				});
			},
			ForkResult::Child => {
				let io = StageIo {
					pipe_in: pipe_in,
					pipe_out: pipe_out,
					stdin_file: redirections.stdin_for(is_first),
					stdout_file: redirections.stdout_for(is_last),
					stderr_file: redirections.stderr_for(is_last),
				};
				spawn::exec_stage(argv, io, opts);
			},
		}
	}
	Ok(())
}

/// Runs `pipeline`: one process per stage, chained by pipes.
///
/// A foreground pipeline is waited for in full. A background one has its
/// pids written to `out` and is left running.
pub fn eval<W: Write>(mut pipeline: Pipeline, opts: &ExecOptions, out: &mut W) -> Result<EvalResult, ExecError> {
	pipeline.normalize();
	if pipeline.is_empty() {
		return Ok(EvalResult::Empty);
	}

	let argvs = prepare_argvs(&pipeline)?;
	let redirections = Redirections::resolve(&pipeline, opts.stderr_redirect)?;
	let mut job_builder = JobBuilder::new(argvs.len());
	spawn_stages(&argvs, &redirections, SpawnOptions::for_pipeline(pipeline.is_background), &mut job_builder)?;
	let job = job_builder.build();

	if pipeline.is_background {
		if let Err(e) = job.report(out) {
			warn!("could not report background job {:?}: {}", job.pids, e);
		}
		Ok(EvalResult::Running(job))
	} else {
		let statuses = job.wait().map_err(ExecError::Wait)?;
		Ok(EvalResult::Done(statuses))
	}
}
