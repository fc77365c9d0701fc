use std::path::PathBuf;

use crate::core::path::PathExpander;

pub const RC_FILE: &str = ".marrowrc";

/// Where startup commands are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub rc_path: PathBuf,
    /// Named on the command line, so it must exist.
    pub explicit: bool,
}

impl ConfigPaths {
    /// `custom` wins; otherwise `~/.marrowrc`, or nothing without a home.
    pub fn new(custom: Option<&str>) -> Option<Self> {
        if let Some(path) = custom {
            return Some(ConfigPaths {
                rc_path: PathBuf::from(path),
                explicit: true,
            });
        }

        PathExpander::new()
            .home_dir()
            .ok()
            .map(|home| ConfigPaths {
                rc_path: home.join(RC_FILE),
                explicit: false,
            })
    }
}
