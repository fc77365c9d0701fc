use super::{Command, CommandError, Context, Outcome};

pub const ADD: &str = "+";
pub const REMOVE: &str = "-";

/// `path`, `path + dir`, `path - dir`.
#[derive(Clone, Copy, Default)]
pub struct PathCommand;

impl PathCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Command for PathCommand {
    fn execute(&self, args: &[&str], ctx: &mut Context<'_>) -> Result<Outcome, CommandError> {
        match args {
            [] => writeln!(ctx.out, "{}", ctx.registry)?,
            [ADD, dir] => ctx.registry.add(dir)?,
            [REMOVE, dir] => ctx.registry.remove(dir)?,
            _ => {
                return Err(CommandError::InvalidUsage(
                    "Invalid usage of path command".to_string(),
                ))
            }
        }
        Ok(Outcome::Continue)
    }
}
