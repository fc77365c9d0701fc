use std::io::{self, IsTerminal, Write};

use rustyline::{config::Configurer, error::ReadlineError, history::DefaultHistory, Editor};

use crate::{
    core::{
        commands::{CommandExecutor, Outcome},
        config::{ConfigLoader, ConfigPaths},
    },
    error::ShellError,
    flags::Flags,
    highlight::SyntaxHighlighter,
    input::{tokenize, ShellHelper},
    process::{InterruptFlag, ProcessExecutor},
};

pub const PROMPT: &str = "> ";

pub struct Shell {
    pub(crate) editor: Editor<ShellHelper, DefaultHistory>,
    pub(crate) executor: CommandExecutor,
    pub(crate) interrupt: InterruptFlag,
    pub(crate) highlighter: SyntaxHighlighter,
    pub(crate) flags: Flags,
    completion_revision: Option<u64>,
    /// rustyline only draws the prompt on a terminal.
    echo_prompt: bool,
}

impl Shell {
    pub fn new(flags: Flags) -> Result<Self, ShellError> {
        let highlighter = SyntaxHighlighter::new();
        let mut editor = Editor::<ShellHelper, DefaultHistory>::new()?;

        editor.set_helper(Some(ShellHelper::new(highlighter)));
        editor.set_auto_add_history(true);

        // Ctrl-C is recorded, never fatal to the interpreter
        let interrupt = InterruptFlag::register()?;

        let executor = CommandExecutor::new(ProcessExecutor::new(flags.is_set("debug")));

        Ok(Shell {
            editor,
            executor,
            interrupt,
            highlighter,
            flags,
            completion_revision: None,
            echo_prompt: !io::stdin().is_terminal(),
        })
    }

    pub fn run(&mut self) -> Result<(), ShellError> {
        if !self.source_config()? {
            return Ok(());
        }

        loop {
            self.refresh_completions();
            self.write_prompt();

            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    if !self.execute_line(&line) {
                        break;
                    }
                    self.check_interrupt();
                }
                Err(ReadlineError::Interrupted) => {
                    self.interrupt.take();
                    self.notice("Received Ctrl-C");
                }
                Err(ReadlineError::Eof) => {
                    self.notice("exit");
                    break;
                }
                // The undecodable line has been consumed; the next read is clean.
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                    eprintln!(
                        "{}",
                        self.highlighter
                            .highlight_error("marrow: input line is not valid UTF-8")
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Runs one input line and reports any failure. Returns `false` once
    /// `exit` has run.
    pub fn execute_line(&mut self, line: &str) -> bool {
        if self.flags.is_set("debug") {
            let args = tokenize(line);
            if !args.is_empty() {
                self.trace(&format!("dispatch {:?}", args));
            }
        }

        match self.executor.execute_line(line, &mut io::stdout()) {
            Ok(Outcome::Exit) => false,
            Ok(Outcome::Continue) => true,
            Ok(Outcome::Finished(status)) => {
                if !status.success() {
                    self.notice(&status.to_string());
                }
                true
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    self.highlighter.highlight_error(&format!("marrow: {}", e))
                );
                true
            }
        }
    }

    /// Runs the startup file. Returns `false` if it asked to exit.
    fn source_config(&mut self) -> Result<bool, ShellError> {
        let Some(paths) = ConfigPaths::new(self.flags.get_value("config")) else {
            return Ok(true);
        };

        for line in ConfigLoader::new(&paths).load_commands()? {
            if !self.execute_line(&line) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn write_prompt(&self) {
        if self.echo_prompt {
            let mut out = io::stdout().lock();
            out.write_all(PROMPT.as_bytes()).and_then(|_| out.flush()).ok();
        }
    }

    fn refresh_completions(&mut self) {
        let revision = self.executor.registry().revision();
        if self.completion_revision == Some(revision) {
            return;
        }

        if let Some(helper) = self.editor.helper_mut() {
            helper.refresh_commands(self.executor.builtin_names(), self.executor.registry());
        }
        self.completion_revision = Some(revision);
    }

    fn check_interrupt(&mut self) {
        if self.interrupt.take() {
            self.notice("Received Ctrl-C");
        }
    }

    fn notice(&self, message: &str) {
        if !self.flags.is_set("quiet") {
            eprintln!("{}", self.highlighter.highlight_notice(message));
        }
    }

    fn trace(&self, message: &str) {
        eprintln!("{}", self.highlighter.highlight_hint(&format!("[debug] {}", message)));
    }
}
