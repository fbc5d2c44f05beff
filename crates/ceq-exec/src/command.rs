use std::path::PathBuf;

use ceq_model::Env;
use serde::{Deserialize, Serialize};

use crate::util::shell_quote;

/// Fully resolved process invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Env::is_empty")]
    pub env: Env,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Return an error if the exit code is not zero.
    pub fail_on_non_zero: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Env::new(),
            cwd: None,
            fail_on_non_zero: true,
        }
    }

    /// Run `script` through the platform shell (`sh -c` / `cmd /C`).
    pub fn shell(script: impl Into<String>) -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_family = "windows")] {
                let (shell, flag) = ("cmd", "/C");
            } else {
                let (shell, flag) = ("sh", "-c");
            }
        }
        Self::new(shell).arg(flag).arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `--flag=value` when `value` is present.
    pub fn opt_flag(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(format!("{flag}={v}")),
            None => self,
        }
    }

    pub fn envs(mut self, env: &Env) -> Self {
        self.env = self.env.merged(env);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Report non-zero exits in [`CommandOutput`] instead of failing.
    ///
    /// Used by probes, which inspect the exit code themselves.
    pub fn allow_failure(mut self) -> Self {
        self.fail_on_non_zero = false;
        self
    }

    /// Shell-quoted command line, for logs and dry runs.
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last non-empty stderr line, used as a short failure detail.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
    }
}
