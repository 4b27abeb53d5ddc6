//! Streaming execution of external commands.
//!
//! A [`CommandRunner`] runs at most one external process at a time on a
//! worker thread. The process's output and error streams share a single pipe,
//! so lines reach the `on_line` listener in exactly the order the process
//! wrote them, as soon as each line is complete. The final status is reported
//! once through `on_done`, after the last line.
//!
//! Listeners are called on the worker thread. Presentation code that owns
//! thread-bound state should forward them (for example over a channel) to its
//! own thread before touching that state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};

use crate::credential::Secret;
use crate::error::{Error, Result};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);
const OUTPUT_POLL_TIMEOUT_MS: u16 = 50;
const READ_CHUNK_SIZE: usize = 4096;

type LineListener = Box<dyn FnMut(String) + Send>;
type DoneListener = Box<dyn FnOnce(ExecutionOutcome) + Send>;

/// Lifecycle of one execution. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Moves to `next` if that is a forward transition. Returns whether the
    /// state changed.
    pub fn advance(&mut self, next: Self) -> bool {
        if next.rank() > self.rank() {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// Terminal result handed to the `on_done` listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { exit_code: i32 },
    Failed { error_message: String },
    Cancelled,
}

impl ExecutionOutcome {
    pub fn state(&self) -> ExecutionState {
        match self {
            Self::Completed { .. } => ExecutionState::Completed,
            Self::Failed { .. } => ExecutionState::Failed,
            Self::Cancelled => ExecutionState::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { exit_code: 0 })
    }
}

/// Options for a single [`CommandRunner::execute`] call.
#[derive(Default)]
pub struct ExecuteOptions {
    secret: Option<Secret>,
    environment: HashMap<String, String>,
    on_line: Option<LineListener>,
    on_done: Option<DoneListener>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential written to the process's input stream right after launch.
    pub fn secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.environment.insert(key.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn on_line(mut self, listener: impl FnMut(String) + Send + 'static) -> Self {
        self.on_line = Some(Box::new(listener));
        self
    }

    pub fn on_done(mut self, listener: impl FnOnce(ExecutionOutcome) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(listener));
        self
    }
}

struct ExecutionStatus {
    state: ExecutionState,
    exit_code: Option<i32>,
    child: Option<Child>,
    worker: Option<ThreadId>,
    cancel_requested: bool,
}

/// One external process invocation, shared between the worker and handles.
struct CommandExecution {
    argv: Vec<String>,
    secret_supplied: bool,
    status: Mutex<ExecutionStatus>,
    /// Held by the worker while it hands a line to `on_line`.
    delivery: Mutex<()>,
}

impl CommandExecution {
    fn new(argv: Vec<String>, secret_supplied: bool) -> Self {
        Self {
            argv,
            secret_supplied,
            status: Mutex::new(ExecutionStatus {
                state: ExecutionState::Pending,
                exit_code: None,
                child: None,
                worker: None,
                cancel_requested: false,
            }),
            delivery: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }

    fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Once this returns true no further line reaches `on_line`, unless it is
    /// called from inside `on_line` itself.
    fn cancel(&self) -> bool {
        let mut status = self.lock();
        if status.state.is_terminal() || status.cancel_requested {
            return false;
        }

        if let Some(child) = status.child.as_mut() {
            let leader_exited = match child.try_wait() {
                Ok(exit_status) => exit_status.is_some(),
                Err(e) => {
                    warn!("Could not check status of `{}`: {}", self.program(), e);
                    false
                }
            };
            // The group outlives its leader while anything it started still
            // runs and may be holding the output pipe open.
            if !terminate(child.id()) && leader_exited {
                return false;
            }
        }

        status.cancel_requested = true;
        info!("Cancelling `{}`", self.program());
        let worker = status.worker;
        drop(status);

        if worker != Some(thread::current().id()) {
            drop(self.delivery.lock().unwrap_or_else(PoisonError::into_inner));
        }
        true
    }

    /// Publishes the spawned child, terminating it at once if a cancel
    /// arrived while it was still pending.
    fn attach(&self, child: Child) {
        let mut status = self.lock();
        let pid = child.id();
        status.child = Some(child);
        status.worker = Some(thread::current().id());
        status.state.advance(ExecutionState::Running);
        if status.cancel_requested {
            terminate(pid);
        }
    }

    fn leader_exited(&self) -> bool {
        match self.lock().child.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    fn deliver(&self, raw: &[u8], on_line: &mut LineListener) {
        let _delivering = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_cancel_requested() {
            on_line(decode_line(raw));
        }
    }

    fn wait_for_exit(&self) -> std::io::Result<ExitStatus> {
        loop {
            {
                let mut status = self.lock();
                let Some(child) = status.child.as_mut() else {
                    return Err(std::io::Error::other("process handle missing"));
                };
                if let Some(exit_status) = child.try_wait()? {
                    return Ok(exit_status);
                }
            }
            thread::sleep(REAP_POLL_INTERVAL);
        }
    }

    fn abort(&self) {
        let pid = self.lock().child.as_ref().map(Child::id);
        if let Some(pid) = pid {
            terminate(pid);
            if let Err(e) = self.wait_for_exit() {
                warn!("Could not reap `{}`: {}", self.program(), e);
            }
        }
    }

    fn finish(&self, outcome: &ExecutionOutcome) {
        let mut status = self.lock();
        if !status.state.advance(outcome.state()) {
            warn!(
                "Ignoring transition of `{}` from {:?} to {:?}",
                self.program(),
                status.state,
                outcome.state()
            );
        }
        if let ExecutionOutcome::Completed { exit_code } = outcome {
            status.exit_code = Some(*exit_code);
        }
        status.child = None;
    }
}

/// Handle to an execution started by [`CommandRunner::execute`].
#[derive(Clone)]
pub struct ExecutionHandle(Arc<CommandExecution>);

impl ExecutionHandle {
    /// Requests termination of the process.
    ///
    /// Returns false when there was nothing to cancel: the execution already
    /// finished, the process and everything in its group already exited, or
    /// a cancel was already issued. A true result means a termination request
    /// was sent, not that the process has stopped; the outcome still arrives
    /// through `on_done`. No line is delivered to `on_line` after a true
    /// result, unless `cancel` was called from within `on_line`.
    pub fn cancel(&self) -> bool {
        self.0.cancel()
    }

    pub fn state(&self) -> ExecutionState {
        self.0.lock().state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.0.lock().exit_code
    }

    pub fn argv(&self) -> &[String] {
        &self.0.argv
    }

    pub fn secret_supplied(&self) -> bool {
        self.0.secret_supplied
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }
}

type ActiveSlot = Arc<Mutex<Option<Arc<CommandExecution>>>>;

/// Runs one external command at a time, streaming its output.
///
/// Clones share the same slot, so a second `execute` on any clone while an
/// execution is still running is rejected with [`Error::Busy`].
#[derive(Clone, Default)]
pub struct CommandRunner {
    active: ActiveSlot,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Arc<CommandExecution>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `argv` on a worker thread.
    ///
    /// Launch failures, pipe errors, the exit code and cancellation are all
    /// reported through the `on_done` listener rather than the return value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] if another execution has not finished yet,
    /// [`Error::EmptyCommand`] for an empty argv, and [`Error::LaunchFailed`]
    /// if the worker thread could not be started.
    pub fn execute(&self, argv: Vec<String>, options: ExecuteOptions) -> Result<ExecutionHandle> {
        if argv.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|current| !current.lock().state.is_terminal()) {
            return Err(Error::Busy);
        }

        let ExecuteOptions {
            secret,
            environment,
            on_line,
            on_done,
        } = options;

        debug!(
            "Executing {:?} (credential supplied: {})",
            argv,
            secret.is_some()
        );

        let execution = Arc::new(CommandExecution::new(argv, secret.is_some()));
        *active = Some(Arc::clone(&execution));
        drop(active);

        let slot = Arc::clone(&self.active);
        let worker_execution = Arc::clone(&execution);
        let spawned = thread::Builder::new()
            .name("aptdeck-runner".to_string())
            .spawn(move || {
                let on_line = on_line.unwrap_or_else(|| Box::new(|_| {}));
                let outcome = run(&worker_execution, secret, &environment, on_line);
                worker_execution.finish(&outcome);
                release(&slot, &worker_execution);
                info!("`{}` finished: {:?}", worker_execution.program(), outcome);
                if let Some(on_done) = on_done {
                    on_done(outcome);
                }
            });

        if let Err(e) = spawned {
            let error_message = format!("Failed to start worker thread: {e}");
            execution.finish(&ExecutionOutcome::Failed {
                error_message: error_message.clone(),
            });
            release(&self.active, &execution);
            return Err(Error::LaunchFailed(error_message));
        }

        Ok(ExecutionHandle(execution))
    }

    /// Cancels the running execution, if any. See [`ExecutionHandle::cancel`].
    pub fn cancel(&self) -> bool {
        let current = self.lock_active().clone();
        current.is_some_and(|execution| execution.cancel())
    }

    pub fn is_running(&self) -> bool {
        self.current().is_some_and(|handle| !handle.is_finished())
    }

    pub fn current(&self) -> Option<ExecutionHandle> {
        self.lock_active().clone().map(ExecutionHandle)
    }
}

fn release(slot: &ActiveSlot, execution: &Arc<CommandExecution>) {
    let mut active = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if active
        .as_ref()
        .is_some_and(|current| Arc::ptr_eq(current, execution))
    {
        *active = None;
    }
}

/// Sends SIGTERM to the process group led by `pid`. Returns whether any
/// member of the group was signalled.
fn terminate(pid: u32) -> bool {
    let Ok(raw_pid) = i32::try_from(pid) else {
        warn!("Process id {} out of range", pid);
        return false;
    };

    match signal::killpg(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(Errno::ESRCH) => {
            debug!("Process group {} has already exited", raw_pid);
            false
        }
        Err(e) => {
            warn!("Signalling process group {} failed: {}", raw_pid, e);
            false
        }
    }
}

/// Writes the credential, treating a process that closed its input without
/// reading it as a success.
fn supply_credential(
    program: &str,
    secret: Secret,
    input: &mut impl Write,
) -> std::io::Result<()> {
    match secret.write_line(input) {
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!("{} closed its input before reading the credential", program);
            Ok(())
        }
        written => written,
    }
}

/// Waits up to one poll interval for output. Returns whether there is data
/// to read or the pipe was closed.
fn wait_for_output(output: &File) -> nix::Result<bool> {
    let mut fds = [PollFd::new(output.as_fd(), PollFlags::POLLIN)];
    Ok(poll(&mut fds, OUTPUT_POLL_TIMEOUT_MS)? > 0)
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

fn failed(error_message: String) -> ExecutionOutcome {
    warn!("{}", error_message);
    ExecutionOutcome::Failed { error_message }
}

fn run(
    execution: &CommandExecution,
    secret: Option<Secret>,
    environment: &HashMap<String, String>,
    mut on_line: LineListener,
) -> ExecutionOutcome {
    let program = execution.program();

    if execution.is_cancel_requested() {
        return ExecutionOutcome::Cancelled;
    }

    let (reader, writer) = match unistd::pipe2(OFlag::O_CLOEXEC) {
        Ok(pipe) => pipe,
        Err(e) => return failed(format!("Failed to create output pipe for {program}: {e}")),
    };
    let error_writer = match writer.try_clone() {
        Ok(fd) => fd,
        Err(e) => return failed(format!("Failed to create output pipe for {program}: {e}")),
    };

    let mut command = Command::new(program);
    command
        .args(&execution.argv[1..])
        .envs(environment)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(error_writer))
        .process_group(0);

    let spawned = command.spawn();
    // The command holds our copies of the pipe's write end; the reader only
    // sees end-of-file once they are closed.
    drop(command);

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return failed(format!("Failed to spawn {program}: {e}")),
    };

    // Held open until the process exits; the process decides when it is done
    // reading.
    let mut stdin = child.stdin.take();
    execution.attach(child);

    if let (Some(secret), Some(input)) = (secret, stdin.as_mut()) {
        if let Err(e) = supply_credential(program, secret, input) {
            execution.abort();
            return failed(format!("Failed to write credential to {program}: {e}"));
        }
    }

    let mut output = File::from(reader);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        match wait_for_output(&output) {
            Ok(true) => {}
            Ok(false) => {
                // Whatever is left in the group ignored the termination
                // request; stop waiting for it to close the pipe.
                if execution.is_cancel_requested() && execution.leader_exited() {
                    debug!("Stopped reading output of {} after cancel", program);
                    break;
                }
                continue;
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                execution.abort();
                return failed(format!("Failed to read output of {program}: {e}"));
            }
        }

        match output.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                pending.extend_from_slice(&chunk[..read]);
                while let Some(end) = pending.iter().position(|byte| *byte == b'\n') {
                    let line: Vec<u8> = pending.drain(..=end).collect();
                    execution.deliver(&line, &mut on_line);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                execution.abort();
                return failed(format!("Failed to read output of {program}: {e}"));
            }
        }
    }
    if !pending.is_empty() {
        execution.deliver(&pending, &mut on_line);
    }

    let status = match execution.wait_for_exit() {
        Ok(status) => status,
        Err(e) => return failed(format!("Failed to wait for {program}: {e}")),
    };
    drop(stdin);

    if execution.is_cancel_requested() {
        ExecutionOutcome::Cancelled
    } else {
        ExecutionOutcome::Completed {
            exit_code: exit_code(status),
        }
    }
}
