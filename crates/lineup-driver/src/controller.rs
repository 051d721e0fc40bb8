//! Process fan-out/fan-in.
//!
//! One OS process per partition; workers share no mutable state (each
//! owns a disjoint file set) so there is nothing to lock. The single
//! partition case runs in the current process instead of spawning, with
//! identical observable output.

use std::process::{Child, Command};

/// Controller lifecycle. Transitions run strictly forward:
/// `Idle -> Spawning -> Running -> Reaping -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Idle,
    Spawning,
    Running,
    Reaping,
    Done,
}

fn transition(state: &mut ControllerState, next: ControllerState) {
    tracing::debug!(from = ?state, to = ?next, "controller");
    *state = next;
}

/// How one worker's life ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Normal termination. The code is recorded but a worker's own
    /// failure exit does not fail the run.
    Exited(i32),
    /// Killed by a signal; always a run failure.
    Signaled(i32),
    /// The child process could not be started.
    SpawnFailed,
    /// Termination that is neither a normal exit nor a signal.
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerReport {
    pub index: usize,
    pub outcome: WorkerOutcome,
}

/// Aggregate result of one fan-out.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub workers: Vec<WorkerReport>,
    /// Set when the single-partition in-process pass failed. In that
    /// mode the worker is this process, so its failure is the run's.
    pub inline_failure: bool,
}

impl FanoutReport {
    /// The controller's exit decision: false iff any spawn failed, any
    /// child was signal-terminated, or the in-process pass failed.
    pub fn success(&self) -> bool {
        !self.inline_failure
            && self
                .workers
                .iter()
                .all(|w| matches!(w.outcome, WorkerOutcome::Exited(_)))
    }
}

fn classify(index: usize, child: &mut Child) -> WorkerOutcome {
    // Block on this specific child's handle. There is deliberately no
    // timeout here: a hung worker stalls the whole run, as it always has.
    match child.wait() {
        Ok(status) => {
            if let Some(code) = status.code() {
                if code == 0 {
                    tracing::info!(partition = index, "worker exited cleanly");
                } else {
                    tracing::error!(partition = index, code, "worker exited with failure");
                }
                WorkerOutcome::Exited(code)
            } else {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    if let Some(signal) = status.signal() {
                        tracing::error!(partition = index, signal, "worker killed by signal");
                        return WorkerOutcome::Signaled(signal);
                    }
                }
                tracing::error!(partition = index, "worker ended with unknown status");
                WorkerOutcome::Unknown
            }
        }
        Err(e) => {
            tracing::error!(partition = index, error = %e, "wait on worker failed");
            WorkerOutcome::Unknown
        }
    }
}

/// Fan a phase out over `partitions` workers and block until all of
/// them are done.
///
/// With one partition, `run_inline` executes the phase in this process
/// and no child is spawned. Otherwise `make_command` builds the command
/// for each partition index; a spawn failure is recorded and does not
/// cancel siblings already started, and whatever was spawned is still
/// reaped.
pub fn run_partitions(
    partitions: usize,
    run_inline: impl FnOnce() -> bool,
    mut make_command: impl FnMut(usize) -> Command,
) -> FanoutReport {
    let mut state = ControllerState::Idle;
    let mut report = FanoutReport::default();

    if partitions <= 1 {
        transition(&mut state, ControllerState::Running);
        let ok = run_inline();
        report.inline_failure = !ok;
        report.workers.push(WorkerReport {
            index: 0,
            outcome: WorkerOutcome::Exited(i32::from(!ok)),
        });
        transition(&mut state, ControllerState::Done);
        return report;
    }

    transition(&mut state, ControllerState::Spawning);
    let mut children: Vec<(usize, Child)> = Vec::with_capacity(partitions);
    for index in 0..partitions {
        match make_command(index).spawn() {
            Ok(child) => {
                tracing::debug!(partition = index, pid = child.id(), "worker spawned");
                children.push((index, child));
            }
            Err(e) => {
                tracing::error!(partition = index, error = %e, "spawn failed");
                report.workers.push(WorkerReport {
                    index,
                    outcome: WorkerOutcome::SpawnFailed,
                });
            }
        }
    }

    transition(&mut state, ControllerState::Running);
    transition(&mut state, ControllerState::Reaping);
    for (index, mut child) in children {
        let outcome = classify(index, &mut child);
        report.workers.push(WorkerReport { index, outcome });
    }

    transition(&mut state, ControllerState::Done);
    report
}
