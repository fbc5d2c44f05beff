use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    CommandOutput, CommandSpec, Executor,
    error::{ExecError, ExecResult},
    util::{drain_lines, kill_graceful, to_command},
};

/// Cap on captured bytes per output stream.
pub const CAPTURE_LIMIT: usize = 256 * 1024;

/// Executor that spawns real host processes.
///
/// Output lines are forwarded to tracing (`ceq.exec.proc.out`) and captured up to a limit,
/// so probes can parse them.
pub struct ProcExecutor;

impl ProcExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ProcExecutor {
    fn name(&self) -> &'static str {
        "proc"
    }

    async fn run(&self, spec: &CommandSpec, cancel: &CancellationToken) -> ExecResult<CommandOutput> {
        if spec.program.is_empty() {
            return Err(ExecError::MissingProgram);
        }
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        trace!(target: "ceq.exec.proc", program = %spec.program, args = ?spec.args, "spawn");
        let mut child = to_command(spec)
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", spec.program)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Io("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Io("stderr not captured".into()))?;
        let read_stdout = tokio::spawn(drain_lines(stdout, "stdout", CAPTURE_LIMIT));
        let read_stderr = tokio::spawn(drain_lines(stderr, "stderr", CAPTURE_LIMIT));

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                let output = CommandOutput {
                    code: status.code(),
                    stdout: read_stdout.await.unwrap_or_default(),
                    stderr: read_stderr.await.unwrap_or_default(),
                };

                if !status.success() && spec.fail_on_non_zero {
                    return Err(match status.code() {
                        Some(code) => {
                            debug!(target: "ceq.exec.proc", program = %spec.program, code, "exit non-zero");
                            ExecError::NonZeroExit {
                                program: spec.program.clone(),
                                code,
                                detail: output.stderr_tail().to_string(),
                            }
                        }
                        None => ExecError::KilledBySignal(spec.program.clone()),
                    });
                }

                trace!(target: "ceq.exec.proc", program = %spec.program, code = ?output.code, "exit");
                Ok(output)
            }
            _ = cancel.cancelled() => {
                debug!(target: "ceq.exec.proc", program = %spec.program, "cancelled; killing child");
                let _ = kill_graceful(&mut child).await;
                Err(ExecError::Cancelled)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let exec = ProcExecutor::new();
        let cmd = CommandSpec::shell("echo hello; echo warn 1>&2");
        let out = exec.run(&cmd, &CancellationToken::new()).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr_tail(), "warn");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_by_default() {
        let exec = ProcExecutor::new();
        let cmd = CommandSpec::shell("echo boom 1>&2; exit 3");
        let err = exec.run(&cmd, &CancellationToken::new()).await.unwrap_err();
        match err {
            ExecError::NonZeroExit { code, detail, .. } => {
                assert_eq!(code, 3);
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn allow_failure_reports_code() {
        let exec = ProcExecutor::new();
        let cmd = CommandSpec::shell("exit 2").allow_failure();
        let out = exec.run(&cmd, &CancellationToken::new()).await.unwrap();
        assert_eq!(out.code, Some(2));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let exec = ProcExecutor::new();
        let mut env = ceq_model::Env::new();
        env.push("CEQ_MARK", "yes");
        let cmd = CommandSpec::shell("echo $CEQ_MARK; pwd").envs(&env).cwd("/");
        let out = exec.run(&cmd, &CancellationToken::new()).await.unwrap();
        assert_eq!(out.stdout, "yes\n/\n");
    }

    #[tokio::test]
    async fn undecodable_output_does_not_break_the_pipe() {
        let exec = ProcExecutor::new();
        let cmd = CommandSpec::shell(
            "printf 'caf\\351\\n'; i=0; while [ $i -lt 4000 ]; do echo line $i; i=$((i+1)); done",
        );
        let out = exec.run(&cmd, &CancellationToken::new()).await.unwrap();
        assert!(out.success());
        assert!(out.stdout.starts_with("caf\u{fffd}\nline 0\n"));
        assert!(out.stdout.ends_with("line 3999\n"));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let exec = ProcExecutor::new();
        let cmd = CommandSpec::new("ceq-definitely-not-a-binary");
        let err = exec.run(&cmd, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn(_)));
    }

    #[tokio::test]
    async fn cancel_stops_the_child() {
        let exec = ProcExecutor::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = exec
            .run(&CommandSpec::new("sleep").arg("30"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_rejected() {
        let exec = ProcExecutor::new();
        let err = exec
            .run(&CommandSpec::new(""), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::MissingProgram));
    }
}
