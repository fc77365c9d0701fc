use std::{fs, io};

use super::{ConfigError, ConfigPaths};

/// Reads the startup file into the command lines it contains.
pub struct ConfigLoader<'a> {
    paths: &'a ConfigPaths,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(paths: &'a ConfigPaths) -> Self {
        Self { paths }
    }

    /// Blank lines and `#` comments are dropped. A missing default file
    /// yields no commands; a missing explicit one is an error.
    pub fn load_commands(&self) -> Result<Vec<String>, ConfigError> {
        let content = match fs::read_to_string(&self.paths.rc_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.paths.explicit {
                    return Err(ConfigError::ConfigFileNotFound(self.paths.rc_path.clone()));
                }
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}
