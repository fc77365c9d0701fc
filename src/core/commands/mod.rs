use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

mod cd;
mod exit;
mod path;

pub use cd::CdCommand;
pub use exit::ExitCommand;
pub use path::PathCommand;

use crate::core::path::{PathError, PathRegistry};
use crate::input::tokenize;
use crate::process::pipeline::PIPE;
use crate::process::{ExitStatus, Pipeline, ProcessError, ProcessExecutor};

#[derive(Debug)]
pub enum CommandError {
    InvalidUsage(String),
    ChangeDir { target: PathBuf, source: io::Error },
    Path(PathError),
    Process(ProcessError),
    IoError(io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::InvalidUsage(msg) => write!(f, "{}", msg),
            CommandError::ChangeDir { target, source } => {
                write!(f, "cd: {}: {}", target.display(), source)
            }
            CommandError::Path(err) => write!(f, "{}", err),
            CommandError::Process(err) => write!(f, "{}", err),
            CommandError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<io::Error> for CommandError {
    fn from(err: io::Error) -> Self {
        CommandError::IoError(err)
    }
}

impl From<PathError> for CommandError {
    fn from(err: PathError) -> Self {
        CommandError::Path(err)
    }
}

impl From<ProcessError> for CommandError {
    fn from(err: ProcessError) -> Self {
        CommandError::Process(err)
    }
}

/// What the read loop should do after a line has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
    Finished(ExitStatus),
}

/// State a builtin may touch.
pub struct Context<'a> {
    pub registry: &'a mut PathRegistry,
    pub out: &'a mut dyn Write,
}

pub trait Command {
    fn execute(&self, args: &[&str], ctx: &mut Context<'_>) -> Result<Outcome, CommandError>;
}

#[derive(Clone)]
enum CommandType {
    Cd(CdCommand),
    Exit(ExitCommand),
    Path(PathCommand),
}

impl Command for CommandType {
    fn execute(&self, args: &[&str], ctx: &mut Context<'_>) -> Result<Outcome, CommandError> {
        match self {
            CommandType::Cd(cmd) => cmd.execute(args, ctx),
            CommandType::Exit(cmd) => cmd.execute(args, ctx),
            CommandType::Path(cmd) => cmd.execute(args, ctx),
        }
    }
}

/// Routes an argument list to a builtin or to the process executor.
pub struct CommandExecutor {
    commands: BTreeMap<&'static str, CommandType>,
    registry: PathRegistry,
    process_executor: ProcessExecutor,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(ProcessExecutor::default())
    }
}

impl CommandExecutor {
    pub fn new(process_executor: ProcessExecutor) -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("cd", CommandType::Cd(CdCommand::new()));
        commands.insert("exit", CommandType::Exit(ExitCommand::new()));
        commands.insert("path", CommandType::Path(PathCommand::new()));

        Self {
            commands,
            registry: PathRegistry::new(),
            process_executor,
        }
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn is_builtin(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> Result<Outcome, CommandError> {
        let args = tokenize(line);
        self.execute(&args, out)
    }

    /// Dispatches one argument list. An empty list is a no-op.
    ///
    /// Builtins run in this process and see their arguments verbatim;
    /// redirection and pipes only apply to external programs.
    pub fn execute(&mut self, args: &[&str], out: &mut dyn Write) -> Result<Outcome, CommandError> {
        let Some(&name) = args.first() else {
            return Ok(Outcome::Continue);
        };

        if !args.contains(&PIPE) {
            if let Some(cmd) = self.commands.get(name) {
                let mut ctx = Context {
                    registry: &mut self.registry,
                    out,
                };
                return cmd.execute(&args[1..], &mut ctx);
            }
        }

        let pipeline = Pipeline::parse(args)?;
        if let Some(stage) = pipeline
            .stages()
            .iter()
            .find(|stage| self.is_builtin(stage.program()))
        {
            return Err(ProcessError::BuiltinInPipeline(stage.program().to_string()).into());
        }

        let status = self.process_executor.run(&pipeline, &self.registry)?;
        Ok(Outcome::Finished(status))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::Mutex;

    static CWD_LOCK: Mutex<()> = Mutex::new(());

    /// Runs `f` while holding the working-directory lock, restoring the
    /// directory afterwards.
    pub fn with_cwd_restored(f: impl FnOnce()) {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let before = env::current_dir().unwrap();
        f();
        env::set_current_dir(before).unwrap();
    }

    pub struct TestContext {
        pub registry: PathRegistry,
        pub out: Vec<u8>,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self {
                registry: PathRegistry::new(),
                out: Vec::new(),
            }
        }

        pub fn ctx(&mut self) -> Context<'_> {
            Context {
                registry: &mut self.registry,
                out: &mut self.out,
            }
        }

        pub fn output(&self) -> String {
            String::from_utf8_lossy(&self.out).into_owned()
        }
    }

    fn execute(executor: &mut CommandExecutor, line: &str) -> (Result<Outcome, CommandError>, String) {
        let mut out = Vec::new();
        let result = executor.execute_line(line, &mut out);
        (result, String::from_utf8_lossy(&out).into_owned())
    }

    #[test]
    fn test_blank_line_is_a_no_op() {
        let mut executor = CommandExecutor::default();
        for line in ["", "   ", "\t\r\n"] {
            let (result, out) = execute(&mut executor, line);
            assert_eq!(result.unwrap(), Outcome::Continue);
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_builtin_command_detection() {
        let executor = CommandExecutor::default();

        assert!(executor.is_builtin("cd"));
        assert!(executor.is_builtin("exit"));
        assert!(executor.is_builtin("path"));
        assert!(!executor.is_builtin("ls"));
        assert!(!executor.is_builtin(""));
        assert_eq!(
            executor.builtin_names().collect::<Vec<_>>(),
            ["cd", "exit", "path"]
        );
    }

    #[test]
    fn test_builtin_names_match_exactly() {
        let mut executor = CommandExecutor::default();
        // "exit2" is not the exit builtin; it is looked up as a program.
        let (result, _) = execute(&mut executor, "exit2");
        assert_eq!(result.unwrap(), Outcome::Finished(ExitStatus::Exited(127)));
    }

    #[test]
    fn test_exit() {
        let mut executor = CommandExecutor::default();
        let (result, _) = execute(&mut executor, "exit");
        assert_eq!(result.unwrap(), Outcome::Exit);
    }

    #[test]
    fn test_path_session() {
        let mut executor = CommandExecutor::default();
        execute(&mut executor, "path + /usr/bin").0.unwrap();
        execute(&mut executor, "path + /bin").0.unwrap();

        let (result, out) = execute(&mut executor, "path");
        assert_eq!(result.unwrap(), Outcome::Continue);
        assert_eq!(out, "Path: /usr/bin:/bin\n");

        execute(&mut executor, "path - /bin").0.unwrap();
        let (_, out) = execute(&mut executor, "path");
        assert_eq!(out, "Path: /usr/bin\n");

        let (result, _) = execute(&mut executor, "path - /nonexistent");
        assert!(matches!(result, Err(CommandError::Path(PathError::NotFound(_)))));
        assert_eq!(executor.registry().to_string(), "Path: /usr/bin");
    }

    #[test]
    fn test_builtins_ignore_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let mut executor = CommandExecutor::default();

        let (result, _) = execute(&mut executor, &format!("path > {}", target.display()));
        assert!(matches!(result, Err(CommandError::InvalidUsage(_))));
        assert!(!target.exists());
    }

    #[test]
    fn test_builtin_in_pipeline_is_rejected() {
        let mut executor = CommandExecutor::default();
        for line in ["path | cat", "echo hi | cd /tmp", "ls | exit"] {
            let (result, _) = execute(&mut executor, line);
            assert!(
                matches!(
                    result,
                    Err(CommandError::Process(ProcessError::BuiltinInPipeline(_)))
                ),
                "{line}"
            );
        }
    }

    #[test]
    fn test_external_command_output_goes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let mut executor = CommandExecutor::default();

        let line = format!("echo hello > {}", target.display());
        for _ in 0..2 {
            let (result, out) = execute(&mut executor, &line);
            assert_eq!(result.unwrap(), Outcome::Finished(ExitStatus::Exited(0)));
            assert!(out.is_empty());
        }
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello\n");
    }

    #[test]
    fn test_redirection_syntax_error() {
        let mut executor = CommandExecutor::default();
        let (result, _) = execute(&mut executor, "sort <");
        assert!(matches!(
            result,
            Err(CommandError::Process(ProcessError::Redirect(_)))
        ));
    }

    #[test]
    fn test_cd_then_external_sees_directory() {
        with_cwd_restored(|| {
            let dir = tempfile::tempdir().unwrap();
            let out = dir.path().join("pwd.txt");
            let mut executor = CommandExecutor::default();

            execute(&mut executor, &format!("cd {}", dir.path().display())).0.unwrap();
            execute(&mut executor, "pwd > pwd.txt").0.unwrap();

            let printed = fs::read_to_string(&out).unwrap();
            assert_eq!(
                printed.trim_end(),
                fs::canonicalize(dir.path()).unwrap().to_str().unwrap()
            );

            let before = env::current_dir().unwrap();
            let (result, _) = execute(&mut executor, "cd /does/not/exist");
            assert!(matches!(result, Err(CommandError::ChangeDir { .. })));
            assert_eq!(env::current_dir().unwrap(), before);
        });
    }
}
