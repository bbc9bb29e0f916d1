use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Order { Reverse, Forward }

/// One program invocation. `argv[0]` is the program name.
#[derive(Debug, PartialEq, Eq)]
pub struct Stage {
	pub argv: Vec<OsString>,
	pub next: Option<Box<Stage>>,
}

impl Stage {
	pub fn new(argv: Vec<OsString>) -> Stage {
		Stage { argv: argv, next: None }
	}
}

#[derive(Debug)]
pub struct Pipeline {
	pub stages: Option<Box<Stage>>,
	pub order: Order,
	pub rstdin: Option<PathBuf>,
	pub rstdout: Option<PathBuf>,
	pub rstderr: Option<PathBuf>,
	pub is_background: bool,
}

impl Pipeline {
	pub fn new() -> Pipeline {
		Pipeline {
			stages: None,
			order: Order::Reverse,
			rstdin: None,
			rstdout: None,
			rstderr: None,
			is_background: false,
		}
	}

	/// Links `argv` in front of the chain, the way the parser builds it.
	pub fn push_front(&mut self, argv: Vec<OsString>) {
		let mut stage = Box::new(Stage::new(argv));
		stage.next = self.stages.take();
		self.stages = Some(stage);
	}

	pub fn is_empty(&self) -> bool {
		self.stages.is_none()
	}

	pub fn len(&self) -> usize {
		self.iter().count()
	}

	/// Walks the chain in its current link order.
	pub fn iter(&self) -> StageIter {
		StageIter { cur: self.stages.as_deref() }
	}

	/// Puts the chain into execution order. Reverses the links in place when
	/// they are still in parser order; a second call is a no-op.
	pub fn normalize(&mut self) {
		if self.order == Order::Forward {
			return;
		}
		self.stages = reverse(self.stages.take());
		self.order = Order::Forward;
	}
}

pub fn reverse(mut chain: Option<Box<Stage>>) -> Option<Box<Stage>> {
	let mut prev: Option<Box<Stage>> = None;
	while let Some(mut stage) = chain {
		chain = stage.next.take();
		stage.next = prev;
		prev = Some(stage);
	}
	prev
}

pub struct StageIter<'a> {
	cur: Option<&'a Stage>,
}

impl<'a> Iterator for StageIter<'a> {
	type Item = &'a Stage;

	fn next(&mut self) -> Option<&'a Stage> {
		let stage = self.cur?;
		self.cur = stage.next.as_deref();
		Some(stage)
	}
}

fn fmt_path(path: &Option<PathBuf>) -> String {
	match *path {
		Some(ref p) => p.display().to_string(),
		None => "<none>".to_string(),
	}
}

impl fmt::Display for Pipeline {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "------------------------------")?;
		writeln!(f, "Parse OK")?;
		writeln!(f, "stdin:      {}", fmt_path(&self.rstdin))?;
		writeln!(f, "stdout:     {}", fmt_path(&self.rstdout))?;
		writeln!(f, "stderr:     {}", fmt_path(&self.rstderr))?;
		writeln!(f, "background: {}", self.is_background)?;
		writeln!(f, "Pgms:")?;
		let mut stages: Vec<&Stage> = self.iter().collect();
		if self.order == Order::Reverse {
			stages.reverse();
		}
		for stage in stages {
			write!(f, "            * [ ")?;
			for arg in &stage.argv {
				write!(f, "{} ", arg.to_string_lossy())?;
			}
			writeln!(f, "]")?;
		}
		writeln!(f, "------------------------------")
	}
}
