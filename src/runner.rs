//! runner.rs
//!
//! Shell command execution with line-streamed output and progress mapping.
//! The child's stdout and stderr are merged into a single event stream;
//! memory use is bounded by one line regardless of how chatty the child is.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::FlowError;
use crate::state::{CancelToken, Reporter};

/// Rough line count a generator run tends to produce. Only used to map
/// lines seen onto the progress sub-range; it does not need to be accurate,
/// just keep reported progress moving without overshooting the end.
const ESTIMATED_TOTAL_LINES: u64 = 50;

/// Idle wait between cancellation checks while no output is available.
const IDLE_WAIT: Duration = Duration::from_millis(100);

pub fn run_command(
    reporter: &Reporter,
    cancel: &CancelToken,
    command: &str,
    step_name: &str,
    progress_start: u8,
    progress_end: u8,
) -> Result<(), FlowError> {
    debug_assert!(progress_start <= progress_end && progress_end <= 100);

    reporter.info(format!("Starting: {step_name}"));

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (line_tx, line_rx) = mpsc::channel::<String>();
    let readers = spawn_readers(&mut child, line_tx)?;

    let mut lines_seen: u64 = 0;
    let progress_range = u64::from(progress_end - progress_start);

    loop {
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            join_readers(readers);
            return Err(FlowError::Cancelled);
        }

        match line_rx.recv_timeout(IDLE_WAIT) {
            Ok(line) => {
                lines_seen += 1;
                reporter.info(format!("{step_name}: {line}"));
                reporter.progress(scaled_progress(progress_start, progress_range, lines_seen));
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    join_readers(readers);
    let status = child.wait()?;

    if !status.success() {
        return Err(FlowError::CommandFailed {
            step: step_name.to_string(),
            command: command.to_string(),
        });
    }

    reporter.progress(progress_end);
    reporter.info(format!("Completed: {step_name}"));
    Ok(())
}

fn spawn_readers(
    child: &mut Child,
    line_tx: Sender<String>,
) -> io::Result<[JoinHandle<()>; 2]> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdout unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stderr unavailable"))?;

    let err_tx = line_tx.clone();
    Ok([
        spawn_reader(stdout, line_tx),
        spawn_reader(stderr, err_tx),
    ])
}

fn spawn_reader(stream: impl Read + Send + 'static, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

fn join_readers(readers: [JoinHandle<()>; 2]) {
    for handle in readers {
        let _ = handle.join();
    }
}

fn scaled_progress(start: u8, range: u64, lines_seen: u64) -> u8 {
    let scaled = (lines_seen * range / ESTIMATED_TOTAL_LINES).min(range);
    start + scaled as u8
}
