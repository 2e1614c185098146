#![allow(dead_code)]

use std::{
    fs, io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use server_supervisor::process::{ProcessTable, Signal};
use server_supervisor::{SupervisorConfig, SupervisorObserver, SupervisorState};
use tempfile::TempDir;

pub const BINARY_NAME: &str = "fake-server";
pub const GRACEFUL_TIMEOUT: Duration = Duration::from_millis(500);

/// Temp resource directory with a server script and config file.
pub struct Fixture {
    pub dir: TempDir,
    pub config: SupervisorConfig,
}

impl Fixture {
    pub fn new(script_body: &str) -> Self {
        let fixture = Self::empty();
        fixture.write_server(script_body);
        fixture.write_config();
        fixture
    }

    /// No binary and no config file.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = fast_config(dir.path());
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_server(&self, body: &str) {
        write_script(&self.config.binary_path, body);
    }

    pub fn write_config(&self) {
        fs::write(&self.config.config_path, "port: 8317\n").unwrap();
    }
}

pub fn fast_config(dir: &Path) -> SupervisorConfig {
    SupervisorConfig::from_resource_dir(dir, BINARY_NAME)
        .with_readiness_delay(Duration::from_millis(300))
        .with_graceful_timeout(GRACEFUL_TIMEOUT)
        .with_poll_interval(Duration::from_millis(20))
        .with_orphan_settle_delay(Duration::from_millis(50))
        .with_auth_decision_delay(Duration::from_millis(500))
        .with_auth_settle_delay(Duration::from_millis(50))
}

pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

#[derive(Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<SupervisorState>>,
    log_updates: AtomicUsize,
    auth_changes: AtomicUsize,
}

impl RecordingObserver {
    pub fn statuses(&self) -> Vec<SupervisorState> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn log_updates(&self) -> usize {
        self.log_updates.load(Ordering::SeqCst)
    }

    pub fn auth_changes(&self) -> usize {
        self.auth_changes.load(Ordering::SeqCst)
    }
}

impl SupervisorObserver for RecordingObserver {
    fn status_changed(&self, state: SupervisorState) {
        self.statuses.lock().unwrap().push(state);
    }

    fn logs_updated(&self, _logs: &[String]) {
        self.log_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn auth_state_changed(&self) {
        self.auth_changes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Process table that reports fixed matches and records kills without
/// touching real processes.
#[derive(Default)]
pub struct FakeProcessTable {
    matches: Vec<u32>,
    filters: Mutex<Vec<String>>,
    kills: Mutex<Vec<(u32, Signal)>>,
}

impl FakeProcessTable {
    pub fn with_matches(pids: &[u32]) -> Self {
        Self {
            matches: pids.to_vec(),
            ..Self::default()
        }
    }

    pub fn filters(&self) -> Vec<String> {
        self.filters.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<(u32, Signal)> {
        self.kills.lock().unwrap().clone()
    }
}

impl ProcessTable for FakeProcessTable {
    fn find(&self, filter: &str) -> io::Result<Vec<u32>> {
        self.filters.lock().unwrap().push(filter.to_string());
        Ok(self.matches.clone())
    }

    fn kill(&self, pid: u32, signal: Signal) -> io::Result<()> {
        self.kills.lock().unwrap().push((pid, signal));
        Ok(())
    }
}

pub fn contains_record(logs: &[String], needle: &str) -> bool {
    logs.iter().any(|record| record.contains(needle))
}
