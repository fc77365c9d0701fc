use std::env;
use std::path::{Path, PathBuf};

use super::PathError;

#[derive(Clone)]
pub struct PathExpander;

impl Default for PathExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl PathExpander {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(&self, path: &str) -> Result<PathBuf, PathError> {
        if path == "~" {
            return self.home_dir();
        }
        match path.strip_prefix("~/") {
            Some(rest) => Ok(self.home_dir()?.join(rest)),
            // "~user" forms are left alone
            None => Ok(Path::new(path).to_path_buf()),
        }
    }

    /// `$HOME`, falling back to the platform's notion of the home directory.
    pub fn home_dir(&self) -> Result<PathBuf, PathError> {
        env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .ok_or(PathError::HomeDirNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_untouched() {
        let expander = PathExpander::new();
        assert_eq!(expander.expand("/tmp").unwrap(), PathBuf::from("/tmp"));
        assert_eq!(expander.expand("a/~b").unwrap(), PathBuf::from("a/~b"));
        assert_eq!(expander.expand("~other").unwrap(), PathBuf::from("~other"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        let expander = PathExpander::new();
        let home = expander.home_dir().unwrap();
        assert_eq!(expander.expand("~").unwrap(), home);
        assert_eq!(expander.expand("~/src").unwrap(), home.join("src"));
    }
}
