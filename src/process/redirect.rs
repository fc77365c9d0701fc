use std::ffi::{CStr, CString};
use std::fmt;
use std::io;

use libc::c_int;

pub const INPUT: &str = "<";
pub const OUTPUT: &str = ">";

#[derive(Debug, PartialEq, Eq)]
pub enum RedirectError {
    MissingTarget(String),
    InvalidTarget(String),
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectError::MissingTarget(op) => {
                write!(f, "syntax error: expected a file name after `{}`", op)
            }
            RedirectError::InvalidTarget(name) => {
                write!(f, "file name contains a NUL byte: {:?}", name)
            }
        }
    }
}

impl std::error::Error for RedirectError {}

/// Files a single command's standard input and output are bound to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirections {
    pub input: Option<String>,
    pub output: Option<String>,
}

impl Redirections {
    /// Removes the first `< file` and the first `> file` from `args`.
    ///
    /// `args[0]` is the command name and is never treated as an operator.
    /// Operators after the first of their kind are passed through untouched.
    pub fn extract(args: &[&str]) -> Result<(Vec<String>, Redirections), RedirectError> {
        let mut kept = Vec::with_capacity(args.len());
        let mut redirections = Redirections::default();

        let mut tokens = args.iter();
        if let Some(name) = tokens.next() {
            kept.push(name.to_string());
        }

        while let Some(&token) = tokens.next() {
            let slot = match token {
                INPUT if redirections.input.is_none() => &mut redirections.input,
                OUTPUT if redirections.output.is_none() => &mut redirections.output,
                _ => {
                    kept.push(token.to_string());
                    continue;
                }
            };
            let target = tokens
                .next()
                .ok_or_else(|| RedirectError::MissingTarget(token.to_string()))?;
            *slot = Some(target.to_string());
        }

        Ok((kept, redirections))
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    pub(crate) fn prepare(&self) -> Result<PreparedRedirections, RedirectError> {
        let target = |name: &String| {
            CString::new(name.as_str()).map_err(|_| RedirectError::InvalidTarget(name.clone()))
        };
        Ok(PreparedRedirections {
            input: self.input.as_ref().map(target).transpose()?,
            output: self.output.as_ref().map(target).transpose()?,
        })
    }
}

/// Redirections with their paths already converted for `open(2)`, so the
/// forked child only has to make system calls.
#[derive(Debug, Default)]
pub(crate) struct PreparedRedirections {
    input: Option<CString>,
    output: Option<CString>,
}

/// A file the child could not bind, with the `errno` of the failed call.
#[derive(Debug)]
pub(crate) struct InstallError<'a> {
    pub(crate) target: &'a CStr,
    pub(crate) errno: c_int,
}

impl PreparedRedirections {
    /// Installs the files as fd 0 and fd 1 of the calling process.
    pub(crate) fn apply(&self) -> Result<(), InstallError<'_>> {
        if let Some(path) = &self.input {
            install(path, libc::STDIN_FILENO, libc::O_RDONLY)?;
        }
        if let Some(path) = &self.output {
            install(
                path,
                libc::STDOUT_FILENO,
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
            )?;
        }
        Ok(())
    }
}

fn install(path: &CStr, target: c_int, flags: c_int) -> Result<(), InstallError<'_>> {
    let failed = || InstallError {
        target: path,
        errno: io::Error::last_os_error().raw_os_error().unwrap_or(0),
    };

    // SAFETY: `path` is a valid NUL-terminated string for the whole call.
    let fd = unsafe { libc::open(path.as_ptr(), flags, 0o666 as libc::c_uint) };
    if fd == -1 {
        return Err(failed());
    }
    if fd == target {
        return Ok(());
    }

    // SAFETY: both descriptors are open; `fd` is ours to close.
    let rc = unsafe { libc::dup2(fd, target) };
    let err = (rc == -1).then(failed);
    unsafe { libc::close(fd) };
    match err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
