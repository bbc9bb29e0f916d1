use std::io::{self, Write};

use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};

pub trait WaitStatusExt {
	fn get_pid(self) -> Option<Pid>;
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn get_pid(self) -> Option<Pid> {
		self.pid()
	}

	/// Exit status the way a shell reports it: signals map to `128 + signo`.
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

/// The processes of one pipeline, in spawn order.
#[derive(Debug, PartialEq, Eq)]
pub struct Job {
	pub pids: Vec<Pid>,
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { pids: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks and, on the parent side, records the child.
	pub fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		let r = unsafe { unistd::fork() }?;
		if let unistd::ForkResult::Parent { child } = r {
			debug!("forked stage {} as pid {}", self.imp.pids.len(), child);
			self.imp.pids.push(child);
		}
		Ok(r)
	}

	pub fn build(self) -> Job {
		self.imp
	}
}

fn wait_one(pid: Pid) -> nix::Result<Option<WaitStatus>> {
	loop {
		match wait::waitpid(pid, None) {
			Ok(status) => return Ok(Some(status)),
			Err(Errno::EINTR) => continue,
			// Someone else already collected it.
			Err(Errno::ECHILD) => return Ok(None),
			Err(e) => return Err(e),
		}
	}
}

impl Job {
	/// Blocks until every process has terminated, waiting in spawn order.
	/// The result lines up with `pids`.
	pub fn wait(self) -> nix::Result<Vec<Option<WaitStatus>>> {
		let mut statuses = Vec::with_capacity(self.pids.len());
		for &pid in &self.pids {
			let status = wait_one(pid)?;
			debug!("pid {} finished: {:?}", pid, status);
			statuses.push(status);
		}
		Ok(statuses)
	}

	/// Prints the pids of a job left running in the background.
	pub fn report<W: Write>(&self, out: &mut W) -> io::Result<()> {
		if self.pids.len() == 1 {
			writeln!(out, "[{}]", self.pids[0])?;
		} else {
			write!(out, "Background process PIDs: ")?;
			for pid in &self.pids {
				write!(out, "[{}] ", pid)?;
			}
			writeln!(out)?;
		}
		out.flush()
	}
}

/// Collects any child that has already terminated, without blocking.
pub fn reap_finished() -> Vec<(Pid, WaitStatus)> {
	let mut reaped = vec![];
	loop {
		match wait::waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
			Ok(WaitStatus::StillAlive) => break,
			Ok(status) => match status.get_pid() {
				Some(pid) => {
					debug!("reaped background pid {}: {:?}", pid, status);
					reaped.push((pid, status));
				},
				None => break,
			},
			Err(Errno::EINTR) => continue,
			Err(_) => break,
		}
	}
	reaped
}

#[cfg(test)]
mod tests {
	use super::*;
	use nix::sys::signal::Signal;

	fn job(pids: &[i32]) -> Job {
		Job { pids: pids.iter().map(|&p| Pid::from_raw(p)).collect() }
	}

	#[test]
	fn report_single() {
		let mut out = vec![];
		job(&[4242]).report(&mut out).unwrap();
		assert_eq!(out, b"[4242]\n");
	}

	#[test]
	fn report_pipeline_in_spawn_order() {
		let mut out = vec![];
		job(&[10, 11, 12]).report(&mut out).unwrap();
		assert_eq!(out, b"Background process PIDs: [10] [11] [12] \n");
	}

	#[test]
	fn wait_keeps_one_entry_per_pid() {
		let child = std::process::Command::new("true").spawn().unwrap();
		let pid = Pid::from_raw(child.id() as i32);
		// pid 1 is never our child, so waitpid reports ECHILD for it.
		let statuses = job(&[1, pid.as_raw()]).wait().unwrap();
		assert_eq!(statuses, vec![None, Some(WaitStatus::Exited(pid, 0))]);
	}

	#[test]
	fn status_codes() {
		let pid = Pid::from_raw(1);
		assert_eq!(WaitStatus::Exited(pid, 3).code(), Some(3));
		assert_eq!(WaitStatus::Signaled(pid, Signal::SIGKILL, false).code(), Some(137));
		assert_eq!(WaitStatus::StillAlive.code(), None);
		assert_eq!(WaitStatus::Exited(pid, 0).get_pid(), Some(pid));
	}
}
