use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;

use crate::job::JobTracker;
use crate::types::{Pipeline, Stage};

/// Pipeline-fatal failures: the remaining stages are not constructed, but
/// stages already launched keep running.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] Errno),
}

/// Stage-local failures: reported by the executor, which then moves on to
/// the next stage.
#[derive(Debug, Error)]
pub enum LaunchError {
	#[error("fork failed: {0}")]
	Fork(#[source] Errno),
	#[error("argument contains a nul byte")]
	Nul(#[from] NulError),
}

/// Run every launchable stage of the pipeline, wiring stage i's stdout to
/// stage i+1's stdin through a fresh pipe. The parent holds at most one
/// descriptor across iterations (the pending read end); `OwnedFd` drops
/// close it exactly once.
pub fn execute(pipeline: &Pipeline, tracker: &JobTracker) -> Result<(), ExecError> {
	let mut input: Option<OwnedFd> = None;
	for (i, stage) in pipeline.stages.iter().enumerate() {
		if !stage.is_launchable() {
			// no pipe is created or consumed for a skipped stage
			continue;
		}
		let is_last = i + 1 == pipeline.stages.len();
		let pipe = if is_last {
			None
		} else {
			Some(unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?)
		};

		match launch(stage, input.as_ref(), pipe.as_ref().map(|(_, w)| w)) {
			Ok(pid) => {
				if pipeline.background {
					println!("[Background PID {}]", pid);
					tracker.register_background(pid);
				} else {
					tracker.register_foreground(pid);
				}
			},
			Err(e) => {
				eprintln!("psh: {}: {}", stage.argv[0], e);
			},
		}

		// the child holds its own copies now; drop the spent input end
		// and the pipe's write end, carry the read end forward
		input = pipe.map(|(read, _write)| read);
	}
	Ok(())
}

/// Fork one stage. The child applies file redirection first, then rewires
/// the pipe ends onto stdin/stdout (pipe over file, preserving dup order),
/// then replaces itself with the target image. It never returns into the
/// parent's code paths: a failed exec terminates the child.
fn launch(stage: &Stage, input: Option<&OwnedFd>, output: Option<&OwnedFd>) -> Result<Pid, LaunchError> {
	let argv = stage
		.argv
		.iter()
		.map(|a| CString::new(a.as_str()))
		.collect::<Result<Vec<_>, NulError>>()?;

	match unsafe { unistd::fork() }.map_err(LaunchError::Fork)? {
		ForkResult::Parent { child } => Ok(child),
		ForkResult::Child => {
			setup_redirection(stage);
			if let Some(fd) = input {
				let _ = unistd::dup2(fd.as_raw_fd(), libc::STDIN_FILENO);
			}
			if let Some(fd) = output {
				let _ = unistd::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO);
			}
			exec_stage(&argv)
		},
	}
}

fn exec_stage(argv: &[CString]) -> ! {
	let err = match unistd::execvp(&argv[0], argv) {
		Ok(infallible) => match infallible {},
		Err(err) => err,
	};
	let _ = writeln!(io::stderr(), "psh: {}: {}", argv[0].to_string_lossy(), err);
	let code = if err == Errno::ENOENT { 127 } else { 126 };
	unsafe { libc::_exit(code) }
}

/// Runs in the child. An open failure reports the path and cause, then
/// terminates the child before it can reach exec.
fn setup_redirection(stage: &Stage) {
	if let Some(path) = &stage.input_file {
		match OpenOptions::new().read(true).open(path) {
			Ok(file) => {
				let fd = file.into_raw_fd();
				let _ = unistd::dup2(fd, libc::STDIN_FILENO);
				let _ = unistd::close(fd);
			},
			Err(e) => redirection_failed(path, e),
		}
	}
	if let Some(path) = &stage.output_file {
		let mut opts = OpenOptions::new();
		opts.write(true).create(true).mode(0o600);
		if stage.append {
			opts.append(true);
		} else {
			opts.truncate(true);
		}
		match opts.open(path) {
			Ok(file) => {
				let fd = file.into_raw_fd();
				let _ = unistd::dup2(fd, libc::STDOUT_FILENO);
				let _ = unistd::close(fd);
			},
			Err(e) => redirection_failed(path, e),
		}
	}
}

fn redirection_failed(path: &Path, err: io::Error) -> ! {
	let _ = writeln!(io::stderr(), "psh: open(\"{}\"): {}", path.display(), err);
	unsafe { libc::_exit(1) }
}
