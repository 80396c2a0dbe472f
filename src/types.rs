use std::path::PathBuf;

use thiserror::Error;

/// A line at or beyond this length is fatal to the interpreter.
pub const MAX_LINE_LEN: usize = 1024;
/// Authoritative stage bound per pipeline.
pub const MAX_STAGES: usize = 10;
/// Argument bound per stage.
pub const MAX_ARGS: usize = 100;

/// One command of a pipeline: its argument vector plus optional file
/// redirections. A stage whose argv is empty (or whose name is blank) is
/// parsed but never launched.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stage {
	pub argv: Vec<String>,
	pub input_file: Option<PathBuf>,
	pub output_file: Option<PathBuf>,
	pub append: bool,
}

impl Stage {
	pub fn is_launchable(&self) -> bool {
		match self.argv.first() {
			Some(name) => !name.is_empty() && name.len() < MAX_LINE_LEN,
			None => false,
		}
	}
}

/// An ordered chain of stages. `background` applies to the whole pipeline:
/// `&` is only accepted as the final token of a line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub background: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("missing filename after `{0}`")]
	MissingFilename(&'static str),
	#[error("`&` must be the last token of the line")]
	BackgroundNotLast,
	#[error("pipeline exceeds {MAX_STAGES} stages")]
	TooManyStages,
	#[error("command exceeds {MAX_ARGS} arguments")]
	TooManyArgs,
}
