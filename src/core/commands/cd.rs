use super::{Command, CommandError, Context, Outcome};
use crate::core::path::PathExpander;
use std::env;

#[derive(Clone, Default)]
pub struct CdCommand {
    path_expander: PathExpander,
}

impl CdCommand {
    pub fn new() -> Self {
        Self {
            path_expander: PathExpander::new(),
        }
    }
}

impl Command for CdCommand {
    fn execute(&self, args: &[&str], _ctx: &mut Context<'_>) -> Result<Outcome, CommandError> {
        let target = match args.first() {
            Some(dir) => self.path_expander.expand(dir)?,
            None => self.path_expander.home_dir()?,
        };

        env::set_current_dir(&target)
            .map_err(|source| CommandError::ChangeDir { target, source })?;
        Ok(Outcome::Continue)
    }
}
