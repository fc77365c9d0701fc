use super::{Command, CommandError, Context, Outcome};

#[derive(Clone, Copy, Default)]
pub struct ExitCommand;

impl ExitCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Command for ExitCommand {
    /// Arguments are ignored; the interpreter always exits successfully.
    fn execute(&self, _args: &[&str], _ctx: &mut Context<'_>) -> Result<Outcome, CommandError> {
        Ok(Outcome::Exit)
    }
}
