//! Blocking subprocess execution with captured output and an optional deadline.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit status plus everything the child wrote.
#[derive(Debug)]
pub(crate) struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Last few lines of stderr, for error messages.
    pub fn stderr_tail(&self) -> String {
        tail(&self.stderr, 20)
    }
}

#[derive(Debug)]
pub(crate) enum RunError {
    Spawn(std::io::Error),
    Wait(std::io::Error),
    Timeout(Duration),
}

/// Run `cmd` to completion, feeding `stdin` and draining stdout/stderr on
/// helper threads so that neither pipe can fill up and stall the child.
///
/// When `timeout` elapses the child is killed and [`RunError::Timeout`]
/// is returned.
pub(crate) fn run_captured(
    mut cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<Captured, RunError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(RunError::Spawn)?;

    if let (Some(mut pipe), Some(bytes)) = (child.stdin.take(), stdin) {
        thread::spawn(move || {
            // A child that exits without reading its input is not an error here.
            let _ = pipe.write_all(&bytes);
        });
    }
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = wait_with_timeout(&mut child, timeout)?;

    Ok(Captured {
        status,
        stdout: join(stdout),
        stderr: join(stderr),
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, RunError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(RunError::Wait);
    };
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RunError::Timeout(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(RunError::Wait(e)),
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

pub(crate) fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// The platform shell invocation for a full command line.
pub(crate) fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("only", 5), "only");
        assert_eq!(tail("", 3), "");
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams_and_exit_code() {
        let captured = run_captured(shell("echo out; echo err 1>&2; exit 3"), None, None).unwrap();
        assert_eq!(captured.code(), 3);
        assert_eq!(captured.stdout.trim(), "out");
        assert_eq!(captured.stderr_tail(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn feeds_stdin() {
        let captured = run_captured(shell("cat"), Some(b"hello".to_vec()), None).unwrap();
        assert!(captured.status.success());
        assert_eq!(captured.stdout, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn kills_on_timeout() {
        let started = Instant::now();
        let err = run_captured(shell("exec sleep 5"), None, Some(Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = run_captured(Command::new("definitely-not-a-real-program-xyz"), None, None).unwrap_err();
        assert!(matches!(err, RunError::Spawn(_)));
    }
}
