use std::fmt;

mod expander;
mod registry;

pub use expander::PathExpander;
pub use registry::{PathRegistry, DEFAULT_CAPACITY};

#[derive(Debug, PartialEq, Eq)]
pub enum PathError {
    Full { capacity: usize },
    NotFound(String),
    HomeDirNotFound,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Full { .. } => write!(f, "Path list is full. Cannot add more paths."),
            PathError::NotFound(_) => write!(f, "Path not found. Cannot remove."),
            PathError::HomeDirNotFound => write!(f, "Home directory not found"),
        }
    }
}

impl std::error::Error for PathError {}
