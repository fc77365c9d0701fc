use std::ffi::{CStr, CString, OsStr};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::ptr;

use libc::{c_char, c_int, pid_t};

use super::pipeline::{Pipeline, PipelineStage};
use super::redirect::PreparedRedirections;
use super::{ExitStatus, ProcessError};
use crate::core::path::PathRegistry;
use crate::highlight::SyntaxHighlighter;

const EXIT_REDIRECT_FAILED: libc::c_int = 1;
const EXIT_NOT_EXECUTABLE: libc::c_int = 126;
const EXIT_NOT_FOUND: libc::c_int = 127;

/// Interpreter for executable files that have no `#!` line.
const SCRIPT_SHELL: &[u8] = b"/bin/sh";

/// Runs external commands in forked children and waits for them.
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    debug: bool,
    highlighter: SyntaxHighlighter,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ProcessExecutor {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            highlighter: SyntaxHighlighter::new(),
        }
    }

    /// Runs every stage of `pipeline` and blocks until all of them exit.
    /// The result is the status of the last stage.
    pub fn run(
        &self,
        pipeline: &Pipeline,
        registry: &PathRegistry,
    ) -> Result<ExitStatus, ProcessError> {
        let stages = pipeline
            .stages()
            .iter()
            .map(|stage| PreparedStage::new(stage, registry))
            .collect::<Result<Vec<_>, _>>()?;

        let pipes = (1..stages.len())
            .map(|_| Pipe::open())
            .collect::<Result<Vec<_>, _>>()?;
        let pipe_fds: Vec<RawFd> = pipes
            .iter()
            .flat_map(|pipe| [pipe.read.as_raw_fd(), pipe.write.as_raw_fd()])
            .collect();

        // Pending interpreter output must reach the terminal before the child's.
        io::stdout().flush().ok();
        io::stderr().flush().ok();

        let mut pids = Vec::with_capacity(stages.len());
        let mut spawn_error = None;
        for (index, stage) in stages.iter().enumerate() {
            let stdin = index
                .checked_sub(1)
                .map(|previous| pipes[previous].read.as_raw_fd());
            let stdout = pipes.get(index).map(|pipe| pipe.write.as_raw_fd());

            match self.spawn(stage, stdin, stdout, &pipe_fds) {
                Ok(pid) => pids.push(pid),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        // Readers only see end-of-file once every write end is closed here.
        drop(pipes);

        let mut last = Ok(ExitStatus::Exited(0));
        for pid in pids {
            last = wait_for(pid);
            if let Ok(status) = &last {
                self.trace(&format!("pid {} finished: {}", pid, status));
            }
        }

        match spawn_error {
            Some(e) => Err(e),
            None => last,
        }
    }

    fn spawn(
        &self,
        stage: &PreparedStage,
        stdin: Option<RawFd>,
        stdout: Option<RawFd>,
        pipe_fds: &[RawFd],
    ) -> Result<pid_t, ProcessError> {
        let argv = stage.argv_ptrs();
        let mut script_argv = stage.script_argv_ptrs();

        // SAFETY: the child only performs descriptor syscalls, raw writes to
        // fd 2, exec and _exit before it is replaced or terminated.
        match unsafe { libc::fork() } {
            -1 => Err(ProcessError::Fork(io::Error::last_os_error())),
            0 => stage.exec(stdin, stdout, pipe_fds, &argv, &mut script_argv),
            pid => {
                self.trace(&format!(
                    "forked pid {} for {} (candidates: {})",
                    pid,
                    stage.name,
                    stage.describe_candidates()
                ));
                Ok(pid)
            }
        }
    }

    fn trace(&self, message: &str) {
        if self.debug {
            eprintln!("{}", self.highlighter.highlight_hint(&format!("[debug] {}", message)));
        }
    }
}

/// Blocks until `pid` terminates. Stops and continues are not reported.
pub fn wait_for(pid: pid_t) -> Result<ExitStatus, ProcessError> {
    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid out-pointer for the duration of the call.
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ProcessError::Wait(err));
        }
        if let Some(exit) = ExitStatus::from_raw(status) {
            return Ok(exit);
        }
    }
}

struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    fn open() -> Result<Self, ProcessError> {
        let mut fds: [libc::c_int; 2] = [-1; 2];
        // SAFETY: `fds` has room for the two descriptors pipe(2) writes.
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(ProcessError::Pipe(io::Error::last_os_error()));
        }
        // SAFETY: both descriptors were just created and have no other owner.
        let pipe = unsafe {
            Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            }
        };
        set_cloexec(pipe.read.as_raw_fd())?;
        set_cloexec(pipe.write.as_raw_fd())?;
        Ok(pipe)
    }
}

/// Unrelated children must not inherit pipe ends, or readers never see EOF.
/// `dup2` clears the flag on the copies a stage installs as fd 0 and 1.
fn set_cloexec(fd: RawFd) -> Result<(), ProcessError> {
    // SAFETY: `fd` is an open descriptor owned by a live `Pipe`.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
        return Err(ProcessError::Pipe(io::Error::last_os_error()));
    }
    Ok(())
}

/// Everything a child needs, converted before `fork` so the child does not
/// have to build strings.
struct PreparedStage {
    name: String,
    argv: Vec<CString>,
    candidates: Vec<CString>,
    shell: CString,
    redirections: PreparedRedirections,
}

impl PreparedStage {
    fn new(stage: &PipelineStage, registry: &PathRegistry) -> Result<Self, ProcessError> {
        let argv = stage
            .args
            .iter()
            .map(|arg| c_string(arg.as_bytes(), arg))
            .collect::<Result<Vec<_>, _>>()?;

        let candidates = registry
            .candidates(stage.program())
            .iter()
            .map(|path| c_string(path.as_os_str().as_bytes(), stage.program()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: stage.program().to_string(),
            argv,
            candidates,
            shell: c_string(SCRIPT_SHELL, stage.program())?,
            redirections: stage.redirections.prepare()?,
        })
    }

    fn argv_ptrs(&self) -> Vec<*const c_char> {
        self.argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect()
    }

    /// `sh <candidate> args...`; slot 1 is filled in by the child once it
    /// knows which candidate needs the shell.
    fn script_argv_ptrs(&self) -> Vec<*const c_char> {
        std::iter::once(self.shell.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .chain(self.argv.iter().skip(1).map(|arg| arg.as_ptr()))
            .chain(std::iter::once(ptr::null()))
            .collect()
    }

    fn describe_candidates(&self) -> String {
        self.candidates
            .iter()
            .map(|path| OsStr::from_bytes(path.to_bytes()).to_string_lossy())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Child side of `fork`: wire descriptors, then replace the process image.
    fn exec(
        &self,
        stdin: Option<RawFd>,
        stdout: Option<RawFd>,
        pipe_fds: &[RawFd],
        argv: &[*const c_char],
        script_argv: &mut [*const c_char],
    ) -> ! {
        // SAFETY: every descriptor here is open in the child; failures leave
        // the inherited stream in place, which is the best the child can do.
        unsafe {
            if let Some(fd) = stdin {
                libc::dup2(fd, libc::STDIN_FILENO);
            }
            if let Some(fd) = stdout {
                libc::dup2(fd, libc::STDOUT_FILENO);
            }
            for &fd in pipe_fds {
                libc::close(fd);
            }
        }

        // Explicit redirections win over pipe ends.
        if let Err(err) = self.redirections.apply() {
            report(&[
                b"marrow: ",
                err.target.to_bytes(),
                b": ",
                describe_errno(err.errno).as_bytes(),
                b"\n",
            ]);
            // SAFETY: terminating the child without running parent-owned destructors.
            unsafe { libc::_exit(EXIT_REDIRECT_FAILED) }
        }

        let errno = self.try_exec(argv, script_argv);
        let code = if errno == libc::ENOENT {
            report(&[b"marrow: ", self.name.as_bytes(), b": command not found\n"]);
            EXIT_NOT_FOUND
        } else {
            report(&[
                b"marrow: ",
                self.name.as_bytes(),
                b": ",
                describe_errno(errno).as_bytes(),
                b"\n",
            ]);
            EXIT_NOT_EXECUTABLE
        };
        // SAFETY: as above.
        unsafe { libc::_exit(code) }
    }

    /// Tries each candidate in order and returns the `errno` worth reporting.
    /// A permission error beats "not found", and a file without an
    /// interpreter line is handed to `/bin/sh`, mirroring `execvp`.
    fn try_exec(&self, argv: &[*const c_char], script_argv: &mut [*const c_char]) -> c_int {
        let mut denied = false;
        for candidate in &self.candidates {
            exec_candidate(candidate, argv);
            match last_errno() {
                libc::ENOENT | libc::ENOTDIR => {}
                libc::EACCES => denied = true,
                libc::ENOEXEC => {
                    script_argv[1] = candidate.as_ptr();
                    exec_candidate(&self.shell, script_argv);
                    return libc::ENOEXEC;
                }
                errno => return errno,
            }
        }
        if denied {
            libc::EACCES
        } else {
            libc::ENOENT
        }
    }
}

fn exec_candidate(path: &CStr, argv: &[*const c_char]) {
    // SAFETY: `argv` is a NULL-terminated array of pointers into CStrings
    // owned by the stage, which outlives this call. execv only returns on error.
    unsafe {
        libc::execv(path.as_ptr(), argv.as_ptr());
    }
}

fn last_errno() -> c_int {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Writes straight to fd 2. Between `fork` and `exec` the child must not
/// take the stderr lock or allocate, since another thread may have held
/// either when the process was copied.
fn report(parts: &[&[u8]]) {
    for part in parts {
        // SAFETY: `part` is a valid buffer of `part.len()` bytes.
        unsafe { libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len()) };
    }
}

/// Static wording for the errors `open`, `dup2` and `execv` report.
fn describe_errno(errno: c_int) -> &'static str {
    match errno {
        libc::ENOENT => "No such file or directory",
        libc::ENOTDIR => "Not a directory",
        libc::EACCES => "Permission denied",
        libc::ENOEXEC => "Exec format error",
        libc::EISDIR => "Is a directory",
        libc::ETXTBSY => "Text file busy",
        libc::E2BIG => "Argument list too long",
        libc::ELOOP => "Too many levels of symbolic links",
        libc::ENAMETOOLONG => "File name too long",
        libc::ENOMEM => "Cannot allocate memory",
        libc::EROFS => "Read-only file system",
        libc::ENOSPC => "No space left on device",
        libc::EMFILE | libc::ENFILE => "Too many open files",
        _ => "Cannot execute",
    }
}

fn c_string(bytes: &[u8], context: &str) -> Result<CString, ProcessError> {
    CString::new(bytes).map_err(|_| ProcessError::InvalidArgument(context.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run(line: &str) -> Result<ExitStatus, ProcessError> {
        run_with(line, &PathRegistry::new())
    }

    fn run_with(line: &str, registry: &PathRegistry) -> Result<ExitStatus, ProcessError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let pipeline = Pipeline::parse(&tokens)?;
        ProcessExecutor::new(false).run(&pipeline, registry)
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run("true").unwrap(), ExitStatus::Exited(0));
        assert_eq!(run("false").unwrap(), ExitStatus::Exited(1));
    }

    #[test]
    fn test_signal_termination() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("die.sh");
        fs::write(&script, "kill -9 $$\n").unwrap();

        let status = run(&format!("sh {}", script.display())).unwrap();
        assert_eq!(status, ExitStatus::Signaled(libc::SIGKILL));
        assert!(!status.success());
    }

    #[test]
    fn test_command_not_found() {
        let status = run("definitely-not-a-real-program-4711").unwrap();
        assert_eq!(status, ExitStatus::Exited(EXIT_NOT_FOUND));
    }

    #[test]
    fn test_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "not a program").unwrap();

        let status = run(&file.display().to_string()).unwrap();
        assert_eq!(status, ExitStatus::Exited(EXIT_NOT_EXECUTABLE));
    }

    #[test]
    fn test_script_without_interpreter_line_runs_through_sh() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("noshebang");
        let marker = dir.path().join("ran");
        fs::write(&script, "touch \"$1\"\n").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        fs::set_permissions(&script, perms).unwrap();

        let mut registry = PathRegistry::new();
        registry.add(&dir.path().display().to_string()).unwrap();

        let status = run_with(&format!("noshebang {}", marker.display()), &registry).unwrap();
        assert_eq!(status, ExitStatus::Exited(0));
        assert!(marker.exists());
    }

    #[test]
    fn test_errno_wording_matches_the_os() {
        for errno in [libc::ENOENT, libc::EACCES, libc::ENOEXEC, libc::EISDIR] {
            let os = io::Error::from_raw_os_error(errno).to_string();
            assert!(os.starts_with(describe_errno(errno)), "{os}");
        }
    }

    #[test]
    fn test_output_redirection_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        run(&format!("echo hello world > {}", out.display())).unwrap();
        run(&format!("echo hello > {}", out.display())).unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
    }

    #[test]
    fn test_input_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "b\nc\na\n").unwrap();

        let status = run(&format!(
            "sort < {} > {}",
            input.display(),
            out.display()
        ))
        .unwrap();

        assert!(status.success());
        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_missing_input_never_runs_program() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");

        let status = run(&format!(
            "touch {} < {}",
            marker.display(),
            dir.path().join("missing.txt").display()
        ))
        .unwrap();

        assert_eq!(status, ExitStatus::Exited(EXIT_REDIRECT_FAILED));
        assert!(!marker.exists());
    }

    #[test]
    fn test_pipeline_connects_stages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "pear\napple\npear\n").unwrap();

        let status = run(&format!(
            "cat {} | sort | uniq > {}",
            input.display(),
            out.display()
        ))
        .unwrap();

        assert!(status.success());
        assert_eq!(fs::read_to_string(&out).unwrap(), "apple\npear\n");
    }

    #[test]
    fn test_pipeline_status_is_last_stage() {
        assert_eq!(run("true | false").unwrap(), ExitStatus::Exited(1));
        assert_eq!(run("false | true").unwrap(), ExitStatus::Exited(0));
    }

    #[test]
    fn test_registry_is_authoritative() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = PathRegistry::new();
        registry.add(&dir.path().display().to_string()).unwrap();

        // `true` exists on the inherited PATH but not in the registry.
        let status = run_with("true", &registry).unwrap();
        assert_eq!(status, ExitStatus::Exited(EXIT_NOT_FOUND));
    }

    #[test]
    fn test_registry_resolution_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let out = first.path().join("which.txt");

        for (dir, label) in [(&first, "first"), (&second, "second")] {
            let tool = dir.path().join("tool");
            fs::write(&tool, format!("#!/bin/sh\necho {}\n", label)).unwrap();
            let mut perms = fs::metadata(&tool).unwrap().permissions();
            std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
            fs::set_permissions(&tool, perms).unwrap();
        }

        let mut registry = PathRegistry::new();
        registry.add(&second.path().display().to_string()).unwrap();
        registry.add(&first.path().display().to_string()).unwrap();

        run_with(&format!("tool > {}", out.display()), &registry).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "second\n");
    }

    #[test]
    fn test_nul_in_argument_is_rejected_before_fork() {
        let pipeline = Pipeline::parse(&["echo", "a\0b"]).unwrap();
        let result = ProcessExecutor::new(false).run(&pipeline, &PathRegistry::new());
        assert!(matches!(result, Err(ProcessError::InvalidArgument(_))));
    }
}
