use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::SIGINT;

/// Records Ctrl-C instead of letting it terminate the interpreter.
///
/// The flag only reports that an interrupt arrived; the read loop checks it
/// after each command and after an interrupted read. Children reset the
/// handler on `exec` and receive the terminal's SIGINT themselves.
#[derive(Clone, Debug)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn register() -> io::Result<Self> {
        let raised = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, Arc::clone(&raised))?;
        Ok(Self { raised })
    }

    /// Returns whether an interrupt arrived since the last call, clearing it.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }
}
