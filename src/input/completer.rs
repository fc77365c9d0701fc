use std::{borrow::Cow, collections::BTreeSet, fs};

use rustyline::{
    completion::{Completer, FilenameCompleter, Pair},
    highlight::{CmdKind, Highlighter},
    hint::Hinter,
    validate::Validator,
    Context, Helper,
};

use super::tokenizer::{tokenize, DELIMITERS};
use crate::core::path::PathRegistry;
use crate::highlight::SyntaxHighlighter;
use crate::process::pipeline::PIPE;

/// Line-editor helper: command and file name completion plus highlighting.
pub struct ShellHelper {
    commands: BTreeSet<String>,
    file_completer: FilenameCompleter,
    highlighter: SyntaxHighlighter,
}

impl ShellHelper {
    pub fn new(highlighter: SyntaxHighlighter) -> Self {
        ShellHelper {
            commands: BTreeSet::new(),
            file_completer: FilenameCompleter::new(),
            highlighter,
        }
    }

    /// Rebuilds the command list from the builtins and every directory the
    /// registry would search.
    pub fn refresh_commands<'a>(
        &mut self,
        builtins: impl IntoIterator<Item = &'a str>,
        registry: &PathRegistry,
    ) {
        self.commands.clear();
        self.commands.extend(builtins.into_iter().map(String::from));

        for dir in registry.search_dirs() {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.filter_map(Result::ok) {
                let is_candidate = entry
                    .file_type()
                    .map(|t| t.is_file() || t.is_symlink())
                    .unwrap_or(false);
                if !is_candidate {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    self.commands.insert(name.to_string());
                }
            }
        }
    }

    pub fn complete_command(&self, prefix: &str) -> Vec<Pair> {
        self.commands
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect()
    }
}

/// Whether the word ending at the cursor names a command rather than an argument.
fn in_command_position(before_word: &str) -> bool {
    tokenize(before_word)
        .last()
        .map_or(true, |token| *token == PIPE)
}

impl Helper for ShellHelper {}

impl Highlighter for ShellHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned(self.highlighter.highlight_command(line))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(self.highlighter.highlight_hint(hint))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Validator for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before_cursor = &line[..pos];
        let start = before_cursor
            .rfind(&DELIMITERS[..])
            .map_or(0, |index| index + 1);

        if in_command_position(&before_cursor[..start]) {
            Ok((start, self.complete_command(&before_cursor[start..])))
        } else {
            self.file_completer.complete_path(line, pos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn replacements(pairs: Vec<Pair>) -> Vec<String> {
        pairs.into_iter().map(|p| p.replacement).collect()
    }

    #[test]
    fn test_command_position() {
        assert!(in_command_position(""));
        assert!(in_command_position("  "));
        assert!(in_command_position("ls -l | "));
        assert!(!in_command_position("ls "));
        assert!(!in_command_position("sort < "));
    }

    #[test]
    fn test_refresh_uses_registry() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("pathtool");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(dir.path().join("pathdir")).unwrap();

        let mut registry = PathRegistry::new();
        registry.add(dir.path().to_str().unwrap()).unwrap();

        let mut helper = ShellHelper::new(SyntaxHighlighter::plain());
        helper.refresh_commands(["cd", "exit", "path"], &registry);

        assert_eq!(replacements(helper.complete_command("pa")), ["path", "pathtool"]);
        assert_eq!(replacements(helper.complete_command("e")), ["exit"]);
    }
}
