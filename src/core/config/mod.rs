use std::fmt;
use std::path::PathBuf;

mod loader;
mod paths;

pub use loader::ConfigLoader;
pub use paths::ConfigPaths;

#[derive(Debug)]
pub enum ConfigError {
    ConfigFileNotFound(PathBuf),
    IoError(std::io::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ConfigFileNotFound(path) => {
                write!(f, "Config file not found: {}", path.display())
            }
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
