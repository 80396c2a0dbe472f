use std::process::exit;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use psh::eval;
use psh::job::JobTracker;
use psh::parser;
use psh::types::MAX_LINE_LEN;

const PROMPT: &str = "psh> ";

fn main() -> Result<()> {
	// the reaper must be listening before the first fork
	let tracker = JobTracker::spawn()?;
	let mut rl = DefaultEditor::new()?;

	loop {
		match rl.readline(PROMPT) {
			Ok(line) => {
				if line.len() >= MAX_LINE_LEN {
					eprintln!("psh: input line exceeds {} bytes", MAX_LINE_LEN);
					tracker.cleanup_stray_processes();
					exit(0);
				}
				let _ = rl.add_history_entry(line.as_str());

				match parser::parse(&parser::tokenize(&line)) {
					Ok(pipeline) => {
						if let Err(e) = eval::execute(&pipeline, &tracker) {
							eprintln!("psh: {}", e);
						}
					},
					Err(e) => eprintln!("psh: {}", e),
				}
				// runs once per line even when nothing was launched
				tracker.wait_for_foreground();
			},
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => break,
			Err(e) => {
				eprintln!("psh: {}", e);
				break;
			},
		}
	}

	tracker.cleanup_stray_processes();
	Ok(())
}
