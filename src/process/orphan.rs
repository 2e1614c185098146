use std::{io, sync::Arc, thread, time::Duration};

use log::{debug, info, warn};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::{
    error::OrphanError,
    process::signal::{send_signal, Signal},
};

/// Capability to list and signal processes by command line.
pub trait ProcessTable: Send + Sync {
    /// Pids whose full command line contains `filter`, excluding the caller.
    fn find(&self, filter: &str) -> io::Result<Vec<u32>>;

    fn kill(&self, pid: u32, signal: Signal) -> io::Result<()>;
}

/// `sysinfo` for listing, `kill(2)` for signalling. The filter is a plain
/// substring, never a pattern.
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn find(&self, filter: &str) -> io::Result<Vec<u32>> {
        let refresh = ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always);
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

        let own_pid = std::process::id();
        let mut pids: Vec<u32> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter_map(|(pid, process)| {
                let cmdline = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");
                command_line_matches(&cmdline, filter).then(|| pid.as_u32())
            })
            .filter(|pid| *pid != own_pid)
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn kill(&self, pid: u32, signal: Signal) -> io::Result<()> {
        send_signal(pid, signal)
    }
}

fn command_line_matches(cmdline: &str, filter: &str) -> bool {
    !filter.is_empty() && cmdline.contains(filter)
}

/// Best-effort cleanup of server instances left behind by an earlier crash.
pub struct OrphanReclaimer {
    table: Arc<dyn ProcessTable>,
    settle_delay: Duration,
}

impl OrphanReclaimer {
    pub fn new(table: Arc<dyn ProcessTable>, settle_delay: Duration) -> Self {
        Self {
            table,
            settle_delay,
        }
    }

    /// Force-kills every process matching `filter` and returns how many were
    /// found. Sleeps for the settle delay only when something was killed, so
    /// the OS can release the binary and its ports. Never fails.
    pub fn reclaim(&self, filter: &str) -> usize {
        let pids = match self.table.find(filter) {
            Ok(pids) => pids,
            Err(e) => {
                warn!("{}", OrphanError::Scan(e));
                return 0;
            }
        };

        if pids.is_empty() {
            debug!("No orphaned '{}' processes found.", filter);
            return 0;
        }

        info!("Reclaiming {} orphaned '{}' process(es): {:?}", pids.len(), filter, pids);
        for &pid in &pids {
            if let Err(source) = self.table.kill(pid, Signal::Kill) {
                warn!("{}", OrphanError::Kill { pid, source });
            }
        }

        thread::sleep(self.settle_delay);
        pids.len()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    pub struct MockProcessTable {
        matches: Mutex<Vec<u32>>,
        kills: Mutex<Vec<(u32, Signal)>>,
        find_error: Mutex<Option<io::Error>>,
        failing_kills: Mutex<Vec<u32>>,
    }

    impl Default for MockProcessTable {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockProcessTable {
        pub fn new() -> Self {
            Self {
                matches: Mutex::new(Vec::new()),
                kills: Mutex::new(Vec::new()),
                find_error: Mutex::new(None),
                failing_kills: Mutex::new(Vec::new()),
            }
        }

        pub fn with_matches(self, pids: &[u32]) -> Self {
            self.matches.lock().unwrap().extend_from_slice(pids);
            self
        }

        pub fn with_find_error(self, error: io::Error) -> Self {
            *self.find_error.lock().unwrap() = Some(error);
            self
        }

        pub fn with_failing_kill(self, pid: u32) -> Self {
            self.failing_kills.lock().unwrap().push(pid);
            self
        }

        pub fn kills(&self) -> Vec<(u32, Signal)> {
            self.kills.lock().unwrap().clone()
        }
    }

    impl ProcessTable for MockProcessTable {
        fn find(&self, _filter: &str) -> io::Result<Vec<u32>> {
            if let Some(err) = self.find_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(self.matches.lock().unwrap().clone())
        }

        fn kill(&self, pid: u32, signal: Signal) -> io::Result<()> {
            if self.failing_kills.lock().unwrap().contains(&pid) {
                return Err(io::Error::from_raw_os_error(libc::EPERM));
            }
            self.kills.lock().unwrap().push((pid, signal));
            Ok(())
        }
    }
}
