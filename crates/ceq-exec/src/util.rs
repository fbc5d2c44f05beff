use std::{process::Stdio, time::Duration};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::CommandSpec;

/// Grace period between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Build a tokio command from a spec, with captured output and no stdin.
pub fn to_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(spec.args.iter().map(|s| s.as_str()));
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in spec.env.resolved() {
        cmd.env(k, v);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

/// Forward lines to tracing and keep up to `limit` bytes of them.
///
/// Reads until EOF regardless of encoding or the limit, so the child never sees a closed pipe.
/// Invalid UTF-8 is replaced, not rejected.
pub async fn drain_lines<R>(reader: R, stream: &'static str, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(target: "ceq.exec.proc.out", stream, error = %e, "read failed");
                break;
            }
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        debug!(target: "ceq.exec.proc.out", stream, %line);
        if captured.len() + line.len() < limit {
            captured.push_str(line);
            captured.push('\n');
        }
    }
    captured
}

#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
    if let Some(id) = child.id() {
        // SAFETY: plain syscall on a pid we spawned and still own.
        unsafe {
            libc::kill(id as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return Ok(());
        }
    }
    child.kill().await
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

/// Quote an argument for a POSIX shell; safe arguments are left unchanged.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_leaves_safe_args() {
        assert_eq!(shell_quote("gs://bucket/out/"), "gs://bucket/out/");
        assert_eq!(shell_quote("--max-idle=3600s"), "--max-idle=3600s");
    }

    #[test]
    fn quote_wraps_unsafe_args() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[tokio::test]
    async fn drain_lines_respects_limit() {
        let input: &[u8] = b"one\ntwo\nthree\n";
        let out = drain_lines(input, "stdout", 9).await;
        assert_eq!(out, "one\ntwo\n");
    }

    #[tokio::test]
    async fn drain_lines_keeps_reading_past_invalid_utf8() {
        let input: &[u8] = b"caf\xe9\nnext\r\nlast";
        let out = drain_lines(input, "stdout", 1024).await;
        assert_eq!(out, "caf\u{fffd}\nnext\nlast\n");
    }

    #[tokio::test]
    async fn drain_lines_reads_to_eof_after_limit() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for i in 0..2000 {
                tx.write_all(format!("line {i}\n").as_bytes()).await.unwrap();
            }
            tx.shutdown().await.unwrap();
        });
        let out = drain_lines(rx, "stdout", 16).await;
        assert_eq!(out, "line 0\nline 1\n");
        writer.await.unwrap();
    }
}
