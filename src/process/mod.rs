use std::fmt;
use std::io;

pub mod executor;
pub mod pipeline;
pub mod redirect;
pub mod signal;

pub use executor::ProcessExecutor;
pub use pipeline::{Pipeline, PipelineStage};
pub use redirect::{RedirectError, Redirections};
pub use signal::InterruptFlag;

#[derive(Debug)]
pub enum ProcessError {
    Fork(io::Error),
    Pipe(io::Error),
    Wait(io::Error),
    InvalidArgument(String),
    EmptyStage,
    BuiltinInPipeline(String),
    Redirect(RedirectError),
}

impl From<RedirectError> for ProcessError {
    fn from(e: RedirectError) -> Self {
        ProcessError::Redirect(e)
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Fork(e) => write!(f, "fork failed: {}", e),
            ProcessError::Pipe(e) => write!(f, "pipe failed: {}", e),
            ProcessError::Wait(e) => write!(f, "wait failed: {}", e),
            ProcessError::InvalidArgument(arg) => {
                write!(f, "argument contains a NUL byte: {:?}", arg)
            }
            ProcessError::EmptyStage => write!(f, "syntax error: empty command in pipeline"),
            ProcessError::BuiltinInPipeline(name) => {
                write!(f, "{}: builtin cannot be used in a pipeline", name)
            }
            ProcessError::Redirect(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProcessError {}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    /// Decodes a raw `waitpid` status; `None` for stopped or continued children.
    pub(crate) fn from_raw(status: libc::c_int) -> Option<Self> {
        if libc::WIFEXITED(status) {
            Some(ExitStatus::Exited(libc::WEXITSTATUS(status)))
        } else if libc::WIFSIGNALED(status) {
            Some(ExitStatus::Signaled(libc::WTERMSIG(status)))
        } else {
            None
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "process exited with status {}", code),
            ExitStatus::Signaled(signal) => write!(f, "process terminated by signal {}", signal),
        }
    }
}
