//! Bounded execution of the external tools the backends shell out to.

use std::io::{self, Read};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `cmd` to completion, killing it once `limit` has passed.
///
/// Output pipes are drained on helper threads so a chatty child never stalls
/// on a full pipe. Running out of time is reported as `ErrorKind::TimedOut`.
pub(crate) fn output_within(cmd: &mut Command, limit: Duration) -> io::Result<Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + limit;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        let now = Instant::now();
        if now >= deadline {
            kill(&mut child);
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("did not finish within {limit:?}"),
            ));
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    };

    // A grandchild that inherited the pipes can hold them open after the
    // child exits, so collection is bounded too.
    let grace = deadline
        .saturating_duration_since(Instant::now())
        .max(POLL_INTERVAL);
    Ok(Output {
        status,
        stdout: stdout.recv_timeout(grace).unwrap_or_default(),
        stderr: stderr.recv_timeout(grace).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if pipe.read_to_end(&mut buf).is_ok() {
                let _ = tx.send(buf);
            }
        });
    }
    rx
}

fn kill(child: &mut Child) {
    debug!("killing pid {} after timeout", child.id());
    if let Err(e) = child.kill() {
        debug!("kill of pid {} failed: {e}", child.id());
    }
    if let Err(e) = child.wait() {
        debug!("reaping pid {} failed: {e}", child.id());
    }
}

/// `true` when `e` came from [`output_within`] running out of time.
pub(crate) fn timed_out(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn collects_output_of_a_quick_command() {
        let out = output_within(
            Command::new("sh").args(["-c", "echo out; echo err >&2"]),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
    }

    #[test]
    fn hung_command_is_killed_at_the_limit() {
        let started = Instant::now();
        let err = output_within(
            Command::new("sleep").arg("5"),
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(timed_out(&err));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn grandchild_holding_the_pipe_does_not_block() {
        let started = Instant::now();
        let out = output_within(
            Command::new("sh").args(["-c", "sleep 5 & echo started"]),
            Duration::from_millis(300),
        )
        .unwrap();
        assert!(out.status.success());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = output_within(
            &mut Command::new("/nonexistent/baton-tool"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(!timed_out(&err));
    }
}
