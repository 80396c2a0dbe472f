use std::mem;
use std::path::PathBuf;

use crate::types::{ParseError, Pipeline, Stage, MAX_ARGS, MAX_STAGES};

/// Split a line into whitespace-delimited words. No quoting or escaping;
/// operators are only recognized as standalone tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
	line.split_whitespace().collect()
}

fn push_stage(pipeline: &mut Pipeline, stage: Stage) -> Result<(), ParseError> {
	if pipeline.stages.len() == MAX_STAGES {
		return Err(ParseError::TooManyStages);
	}
	pipeline.stages.push(stage);
	Ok(())
}

/// Single left-to-right pass over the tokens, accumulating one stage at a
/// time. A parse error discards the whole line; a line with no words yields
/// an empty pipeline, which is not an error.
pub fn parse(tokens: &[&str]) -> Result<Pipeline, ParseError> {
	let mut pipeline = Pipeline::default();
	let mut current = Stage::default();

	let mut i = 0;
	while i < tokens.len() {
		match tokens[i] {
			"&" => {
				if i + 1 != tokens.len() {
					return Err(ParseError::BackgroundNotLast);
				}
				pipeline.background = true;
			},
			"<" => {
				i += 1;
				let target = tokens.get(i).ok_or(ParseError::MissingFilename("<"))?;
				current.input_file = Some(PathBuf::from(target));
			},
			">" => {
				i += 1;
				let target = tokens.get(i).ok_or(ParseError::MissingFilename(">"))?;
				current.output_file = Some(PathBuf::from(target));
				current.append = false;
			},
			">>" => {
				i += 1;
				let target = tokens.get(i).ok_or(ParseError::MissingFilename(">>"))?;
				current.output_file = Some(PathBuf::from(target));
				current.append = true;
			},
			"|" => {
				// an empty accumulator still becomes a stage; the
				// executor filters it out
				push_stage(&mut pipeline, mem::take(&mut current))?;
			},
			word => {
				if current.argv.len() == MAX_ARGS {
					return Err(ParseError::TooManyArgs);
				}
				current.argv.push(word.to_owned());
			},
		}
		i += 1;
	}

	if !current.argv.is_empty() {
		push_stage(&mut pipeline, current)?;
	}
	Ok(pipeline)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse_line(line: &str) -> Result<Pipeline, ParseError> {
		parse(&tokenize(line))
	}

	fn argv(stage: &Stage) -> Vec<&str> {
		stage.argv.iter().map(|s| s.as_str()).collect()
	}

	#[test]
	fn blank_line_yields_no_stages() {
		let p = parse_line("   \t  ").unwrap();
		assert!(p.stages.is_empty());
		assert!(!p.background);
	}

	#[test]
	fn single_command() {
		let p = parse_line("ls -l /tmp").unwrap();
		assert_eq!(p.stages.len(), 1);
		assert_eq!(argv(&p.stages[0]), ["ls", "-l", "/tmp"]);
		assert!(!p.background);
	}

	#[test]
	fn three_stage_pipeline() {
		let p = parse_line("cat f | sort | uniq -c").unwrap();
		assert_eq!(p.stages.len(), 3);
		assert_eq!(argv(&p.stages[0]), ["cat", "f"]);
		assert_eq!(argv(&p.stages[1]), ["sort"]);
		assert_eq!(argv(&p.stages[2]), ["uniq", "-c"]);
	}

	#[test]
	fn operators_must_be_standalone_tokens() {
		// no whitespace, so the pipe is part of the word
		let p = parse_line("ls|wc").unwrap();
		assert_eq!(p.stages.len(), 1);
		assert_eq!(argv(&p.stages[0]), ["ls|wc"]);
	}

	#[test]
	fn input_redirection() {
		let p = parse_line("wc -l < in.txt").unwrap();
		let s = &p.stages[0];
		assert_eq!(argv(s), ["wc", "-l"]);
		assert_eq!(s.input_file.as_deref(), Some("in.txt".as_ref()));
		assert_eq!(s.output_file, None);
	}

	#[test]
	fn output_redirection_truncates_by_default() {
		let p = parse_line("echo hi > out.txt").unwrap();
		let s = &p.stages[0];
		assert_eq!(s.output_file.as_deref(), Some("out.txt".as_ref()));
		assert!(!s.append);
	}

	#[test]
	fn append_redirection() {
		let p = parse_line("echo hi >> out.txt").unwrap();
		let s = &p.stages[0];
		assert_eq!(s.output_file.as_deref(), Some("out.txt".as_ref()));
		assert!(s.append);
	}

	#[test]
	fn later_redirection_wins() {
		let p = parse_line("cmd > a >> b").unwrap();
		let s = &p.stages[0];
		assert_eq!(s.output_file.as_deref(), Some("b".as_ref()));
		assert!(s.append);
	}

	#[test]
	fn redirection_attaches_to_its_stage() {
		let p = parse_line("cat < in | wc > out").unwrap();
		assert_eq!(p.stages[0].input_file.as_deref(), Some("in".as_ref()));
		assert_eq!(p.stages[0].output_file, None);
		assert_eq!(p.stages[1].output_file.as_deref(), Some("out".as_ref()));
		assert_eq!(p.stages[1].input_file, None);
	}

	#[test]
	fn missing_filename_aborts_the_line() {
		assert_eq!(parse_line("cat <"), Err(ParseError::MissingFilename("<")));
		assert_eq!(parse_line("cat f >"), Err(ParseError::MissingFilename(">")));
		assert_eq!(parse_line("a | b >>"), Err(ParseError::MissingFilename(">>")));
	}

	#[test]
	fn trailing_ampersand_marks_background() {
		let p = parse_line("sleep 5 &").unwrap();
		assert_eq!(p.stages.len(), 1);
		assert!(p.background);
	}

	#[test]
	fn background_applies_to_whole_pipeline() {
		let p = parse_line("cat f | sort &").unwrap();
		assert_eq!(p.stages.len(), 2);
		assert!(p.background);
	}

	#[test]
	fn ampersand_before_pipe_is_rejected() {
		assert_eq!(parse_line("a & | b"), Err(ParseError::BackgroundNotLast));
		assert_eq!(parse_line("a & b"), Err(ParseError::BackgroundNotLast));
	}

	#[test]
	fn empty_stage_is_kept_for_filtering() {
		let p = parse_line("echo hi | | cat").unwrap();
		assert_eq!(p.stages.len(), 3);
		assert!(!p.stages[1].is_launchable());
		assert!(p.stages[0].is_launchable());
		assert!(p.stages[2].is_launchable());
	}

	#[test]
	fn trailing_empty_accumulator_is_dropped() {
		// `a |` leaves an empty accumulator with no arguments
		let p = parse_line("echo hi |").unwrap();
		assert_eq!(p.stages.len(), 1);
		assert_eq!(argv(&p.stages[0]), ["echo", "hi"]);
	}

	#[test]
	fn stage_bound_is_a_parse_error() {
		let line = vec!["x"; MAX_STAGES + 1].join(" | ");
		assert_eq!(parse_line(&line), Err(ParseError::TooManyStages));
	}

	#[test]
	fn argument_bound_is_a_parse_error() {
		let words = vec!["x"; MAX_ARGS + 1].join(" ");
		assert_eq!(parse_line(&words), Err(ParseError::TooManyArgs));
	}

	#[test]
	fn stage_bound_allows_exactly_the_maximum() {
		let line = vec!["x"; MAX_STAGES].join(" | ");
		assert_eq!(parse_line(&line).unwrap().stages.len(), MAX_STAGES);
	}
}
