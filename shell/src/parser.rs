use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Pipeline;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("empty redirect")]
	EmptyRedirect,
	#[error("redirect of descriptor {0} is not supported")]
	UnsupportedDescriptor(String),
	#[error("{0} redirected more than once")]
	DuplicateRedirect(&'static str),
	#[error("character after '&': '{0}'")]
	TrailingInput(char),
	#[error("unknown command separator: '{0}'")]
	UnknownSeparator(char),
}

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Target { Stdin, Stdout, Stderr }

impl Target {
	fn name(self) -> &'static str {
		match self {
			Target::Stdin => "stdin",
			Target::Stdout => "stdout",
			Target::Stderr => "stderr",
		}
	}
}

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn peek(&self) -> Option<u8> {
		self.line.get(self.i).cloned()
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.peek() {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' => true,
			_ => false,
		}
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn is_digit(c: u8) -> bool {
		c.is_ascii_digit()
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn parse_redirect(&mut self) -> ParseResult<Option<(Target, PathBuf)>> {
		let orig = self.i;
		self.proceed_while(Parser::is_digit);
		let num = &self.line[orig .. self.i];
		let unsupported = || ParseError::UnsupportedDescriptor(String::from_utf8_lossy(num).into_owned());

		let target = match self.peek() {
			Some(b'<') => match num {
				b"" | b"0" => Target::Stdin,
				_ => return Err(unsupported()),
			},
			Some(b'>') => match num {
				b"" | b"1" => Target::Stdout,
				b"2" => Target::Stderr,
				_ => return Err(unsupported()),
			},
			_ => {
				self.i = orig;
				return Ok(None);
			},
		};
		self.i += 1;

		self.skip_whitespaces();
		let path = self.read_word();
		if path.is_empty() {
			return Err(ParseError::EmptyRedirect);
		}
		Ok(Some((target, PathBuf::from(OsStr::from_bytes(path)))))
	}

	fn set_redirect(pipeline: &mut Pipeline, target: Target, path: PathBuf) -> ParseResult<()> {
		let slot = match target {
			Target::Stdin => &mut pipeline.rstdin,
			Target::Stdout => &mut pipeline.rstdout,
			Target::Stderr => &mut pipeline.rstderr,
		};
		if slot.is_some() {
			return Err(ParseError::DuplicateRedirect(target.name()));
		}
		*slot = Some(path);
		Ok(())
	}

	fn parse_command(&mut self, pipeline: &mut Pipeline) -> ParseResult<Vec<OsString>> {
		let mut argv: Vec<OsString> = vec![];
		loop {
			self.skip_whitespaces();
			if let Some((target, path)) = self.parse_redirect()? {
				Parser::set_redirect(pipeline, target, path)?;
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			argv.push(OsStr::from_bytes(word).to_os_string());
		}
		if argv.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(argv)
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline> {
		let mut pipeline = Pipeline::new();

		self.skip_whitespaces();
		if self.peek().is_none() {
			return Ok(pipeline);
		}

		loop {
			let argv = self.parse_command(&mut pipeline)?;
			pipeline.push_front(argv);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					pipeline.is_background = true;
					self.skip_whitespaces();
					if let Some(c) = self.peek() {
						return Err(ParseError::TrailingInput(c as char));
					} else {
						break;
					}
				},
				Some(c) => { return Err(ParseError::UnknownSeparator(c as char)); },
				None => { break; },
			}
		}
		Ok(pipeline)
	}
}

/// Parses one command line. Stages come back linked last-first.
pub fn parse(line: &[u8]) -> ParseResult<Pipeline> {
	let mut parser = Parser { line: line, i: 0 };
	parser.parse_pipeline()
}
