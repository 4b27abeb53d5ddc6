//! Running one package action in the foreground.
//!
//! Output lines, the final outcome and the user's typed input are funnelled
//! into a single channel and handled on the calling thread, which plays the
//! role of the presentation thread. Typing `q` while a command runs offers to
//! terminate it. Declining hides the rest of its output, but the session still
//! drains the output until the command exits, since the command would be
//! killed by a closed pipe on its next write otherwise.

use std::io::{BufRead, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

use aptdeck_core::error::Result;
use aptdeck_core::runner::{CommandRunner, ExecuteOptions, ExecutionOutcome};
use log::debug;

use crate::prompts::is_yes;

/// How long to wait for a cancelled command to exit before giving up on it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const QUIT_COMMAND: &str = "q";

enum SessionEvent {
    Line(String),
    Done(ExecutionOutcome),
    Input(String),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Finished(ExecutionOutcome),
    /// The command was asked to terminate but did not exit within
    /// [`SHUTDOWN_GRACE`], or its outcome was never reported.
    Detached,
}

fn watch_input<R: BufRead + Send + 'static>(input: R, events: Sender<SessionEvent>) {
    let spawned = thread::Builder::new()
        .name("aptdeck-input".to_string())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else {
                    break;
                };
                if events.send(SessionEvent::Input(line)).is_err() {
                    break;
                }
            }
        });

    if let Err(e) = spawned {
        debug!("Input watcher not started, quitting is unavailable: {}", e);
    }
}

/// Runs `argv`, copying each output line to `out` as it arrives.
///
/// # Errors
///
/// Returns an error if the runner rejects the command (for example when it is
/// busy) or if writing to `out` fails.
pub fn run_session<R, W>(
    runner: &CommandRunner,
    argv: Vec<String>,
    options: ExecuteOptions,
    input: R,
    out: &mut W,
) -> Result<SessionEnd>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let (events, receiver) = channel();
    let line_events = events.clone();
    let done_events = events.clone();

    let options = options
        .on_line(move |line| {
            let _ = line_events.send(SessionEvent::Line(line));
        })
        .on_done(move |outcome| {
            let _ = done_events.send(SessionEvent::Done(outcome));
        });

    let handle = runner.execute(argv, options)?;
    watch_input(input, events);

    let mut awaiting_answer = false;
    loop {
        let Ok(event) = receiver.recv() else {
            return Ok(SessionEnd::Detached);
        };

        match event {
            SessionEvent::Line(line) => {
                writeln!(out, "{line}")?;
                out.flush()?;
            }
            SessionEvent::Done(outcome) => return Ok(SessionEnd::Finished(outcome)),
            SessionEvent::Input(answer) if awaiting_answer => {
                if !is_yes(&answer) {
                    writeln!(
                        out,
                        "The command keeps running, its output is hidden until it exits."
                    )?;
                    out.flush()?;
                    return wait_unwatched(&receiver);
                }
                if handle.cancel() {
                    writeln!(out, "Terminating...")?;
                    out.flush()?;
                }
                return drain_until_done(&receiver, out);
            }
            SessionEvent::Input(command) if command.trim() == QUIT_COMMAND => {
                if handle.is_finished() {
                    continue;
                }
                write!(
                    out,
                    "A process is still running. Do you want to terminate it? ([y]es/[N]o): "
                )?;
                out.flush()?;
                awaiting_answer = true;
            }
            SessionEvent::Input(_) => {}
        }
    }
}

fn drain_until_done<W: Write>(
    receiver: &Receiver<SessionEvent>,
    out: &mut W,
) -> Result<SessionEnd> {
    loop {
        match receiver.recv_timeout(SHUTDOWN_GRACE) {
            Ok(SessionEvent::Done(outcome)) => return Ok(SessionEnd::Finished(outcome)),
            Ok(SessionEvent::Line(line)) => writeln!(out, "{line}")?,
            Ok(SessionEvent::Input(_)) => {}
            Err(_) => return Ok(SessionEnd::Detached),
        }
    }
}

fn wait_unwatched(receiver: &Receiver<SessionEvent>) -> Result<SessionEnd> {
    for event in receiver.iter() {
        if let SessionEvent::Done(outcome) = event {
            return Ok(SessionEnd::Finished(outcome));
        }
    }
    Ok(SessionEnd::Detached)
}
