use std::{
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{manager::observer::SupervisorObserver, models::state::SupervisorState};

/// Prints supervisor notifications into the raw-mode console.
#[derive(Default)]
pub struct ConsoleObserver {
    follow_logs: AtomicBool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles echoing each new server log record. Returns the new setting.
    pub fn toggle_follow(&self) -> bool {
        !self.follow_logs.fetch_xor(true, Ordering::SeqCst)
    }

    fn print(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "\r\n{}\r\n>>> ", text);
        let _ = stdout.flush();
    }
}

impl SupervisorObserver for ConsoleObserver {
    fn status_changed(&self, state: SupervisorState) {
        self.print(&format!("Server is {}.", state));
    }

    fn logs_updated(&self, logs: &[String]) {
        if !self.follow_logs.load(Ordering::SeqCst) {
            return;
        }
        if let Some(latest) = logs.last() {
            self.print(latest);
        }
    }

    fn auth_state_changed(&self) {
        self.print("Login finished; credentials may have changed.");
    }
}
