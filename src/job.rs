use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use signal_hook::consts::SIGCHLD;
use signal_hook::iterator::Signals;

/// Bookkeeping for outstanding children. Exit notifications and pid
/// registration race against each other (a child can be reaped before the
/// parent's fork call has even returned control to the caller), so a pid
/// retired before it was registered is parked in `reaped_early` until the
/// registration arrives. Invariant: no pid stays in `foreground` after its
/// exit has been observed.
#[derive(Debug, Default)]
struct Ledger {
	foreground: Vec<Pid>,
	background: Vec<Pid>,
	reaped_early: Vec<Pid>,
}

fn remove(list: &mut Vec<Pid>, pid: Pid) -> bool {
	match list.iter().position(|&p| p == pid) {
		Some(i) => {
			list.remove(i);
			true
		},
		None => false,
	}
}

impl Ledger {
	fn register(&mut self, pid: Pid, foreground: bool) {
		if remove(&mut self.reaped_early, pid) {
			return;
		}
		if foreground {
			self.foreground.push(pid);
		} else {
			self.background.push(pid);
		}
	}

	/// Record an observed exit. Returns true when a foreground pid was
	/// retired and waiters should be woken.
	fn retire(&mut self, pid: Pid) -> bool {
		if remove(&mut self.foreground, pid) {
			return true;
		}
		if remove(&mut self.background, pid) {
			return false;
		}
		self.reaped_early.push(pid);
		false
	}
}

/// Process tracker. A dedicated reaper thread owns every `waitpid` call:
/// on each SIGCHLD it drains all already-exited children and retires them
/// in the ledger, waking the control thread's foreground wait. Having a
/// single reaping point is what keeps a foreground exit from being consumed
/// without its ledger entry being cleared.
pub struct JobTracker {
	ledger: Mutex<Ledger>,
	cond: Condvar,
}

impl JobTracker {
	/// Create the tracker and start its reaper thread. Must run before the
	/// first child is spawned so no SIGCHLD is missed.
	pub fn spawn() -> io::Result<Arc<JobTracker>> {
		let tracker = Arc::new(JobTracker {
			ledger: Mutex::new(Ledger::default()),
			cond: Condvar::new(),
		});
		let mut signals = Signals::new([SIGCHLD])?;
		let reaper = Arc::clone(&tracker);
		thread::Builder::new()
			.name("reaper".to_owned())
			.spawn(move || {
				for _ in signals.forever() {
					reaper.drain();
				}
			})?;
		Ok(tracker)
	}

	fn lock(&self) -> MutexGuard<'_, Ledger> {
		self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn register_foreground(&self, pid: Pid) {
		self.lock().register(pid, true);
	}

	pub fn register_background(&self, pid: Pid) {
		self.lock().register(pid, false);
	}

	/// Block until every registered foreground pid has exited. Returns
	/// immediately when nothing is registered; called once per input line.
	pub fn wait_for_foreground(&self) {
		let mut ledger = self.lock();
		while !ledger.foreground.is_empty() {
			ledger = self
				.cond
				.wait(ledger)
				.unwrap_or_else(PoisonError::into_inner);
		}
	}

	pub fn outstanding_foreground(&self) -> usize {
		self.lock().foreground.len()
	}

	pub fn outstanding_background(&self) -> usize {
		self.lock().background.len()
	}

	/// Non-blocking drain of every already-exited child, discarding the
	/// statuses. Also invoked at interpreter shutdown so no zombie outlives
	/// the shell.
	pub fn cleanup_stray_processes(&self) {
		self.drain();
	}

	fn drain(&self) {
		loop {
			match waitpid(None::<Pid>, Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) => break,
				Ok(status) => {
					if let Some(pid) = status.pid() {
						let woke = self.lock().retire(pid);
						if woke {
							self.cond.notify_all();
						}
					}
				},
				// ECHILD: no children remain to wait for
				Err(_) => break,
			}
		}
	}
}
