use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("{program}: non-zero exit code {code}{}", fmt_detail(.detail))]
    NonZeroExit {
        program: String,
        code: i32,
        detail: String,
    },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("{0}: killed by signal")]
    KilledBySignal(String),
    #[error("missing program")]
    MissingProgram,
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

fn fmt_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_exit_message_includes_detail() {
        let e = ExecError::NonZeroExit {
            program: "gcloud".into(),
            code: 1,
            detail: "ERROR: quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "gcloud: non-zero exit code 1: ERROR: quota exceeded");

        let e = ExecError::NonZeroExit {
            program: "tmux".into(),
            code: 1,
            detail: String::new(),
        };
        assert_eq!(e.to_string(), "tmux: non-zero exit code 1");
    }
}
