use std::{
    ffi::OsString,
    fmt,
    io::{ErrorKind, Read},
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info};

use crate::{
    error::LaunchError,
    process::signal::{send_signal, Signal},
    sync::mutex_lock_or_recover,
};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// How a process ended: an exit code, a terminating signal, or neither when
/// the wait itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

pub type OutputObserver = Arc<dyn Fn(StreamKind, &str) + Send + Sync>;
pub type ExitObserver = Box<dyn FnOnce(u32, ExitInfo) + Send>;

/// What to run. Environment overrides are layered over the inherited
/// environment.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
    pub attach_stdin: bool,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            attach_stdin: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn attach_stdin(mut self, attach: bool) -> Self {
        self.attach_stdin = attach;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(ExitInfo),
    TimedOut,
}

#[derive(Debug)]
enum Lifecycle {
    Running,
    Exited(ExitInfo),
}

#[derive(Debug)]
struct ExitState {
    lifecycle: Mutex<Lifecycle>,
    exited: Condvar,
}

impl ExitState {
    fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Running),
            exited: Condvar::new(),
        }
    }

    fn mark_exited(&self, info: ExitInfo) {
        let mut lifecycle = mutex_lock_or_recover(&self.lifecycle);
        if matches!(*lifecycle, Lifecycle::Running) {
            *lifecycle = Lifecycle::Exited(info);
        }
        self.exited.notify_all();
    }

    fn exit_info(&self) -> Option<ExitInfo> {
        match *mutex_lock_or_recover(&self.lifecycle) {
            Lifecycle::Running => None,
            Lifecycle::Exited(info) => Some(info),
        }
    }
}

/// One launched OS process with captured stdout and stderr.
///
/// Dropping the handle does not kill the process; owners terminate
/// explicitly.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    program: PathBuf,
    exit_state: Arc<ExitState>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    _stdin: Option<ChildStdin>,
}

impl ProcessHandle {
    /// Spawns the process. `on_output` receives every decoded chunk from
    /// either stream; `on_exit` runs once, on the waiter thread, after the
    /// exit status is recorded.
    pub fn launch(
        launch: LaunchSpec,
        on_output: OutputObserver,
        on_exit: ExitObserver,
    ) -> Result<Self, LaunchError> {
        if !launch.program.is_file() {
            return Err(LaunchError::NotFound { path: launch.program });
        }

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .envs(launch.envs.iter().map(|(key, value)| (key, value)))
            .stdin(if launch.attach_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            path: launch.program.clone(),
            source,
        })?;

        let pid = child.id();
        info!("Launched '{}' with pid {}.", launch.program.display(), pid);

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, StreamKind::Stdout, Arc::clone(&on_output)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, StreamKind::Stderr, on_output));
        }
        let stdin = child.stdin.take();

        let exit_state = Arc::new(ExitState::new());
        spawn_waiter(child, pid, Arc::clone(&exit_state), on_exit);

        Ok(Self {
            pid,
            program: launch.program,
            exit_state,
            readers: Mutex::new(readers),
            _stdin: stdin,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Advisory: the process may exit right after this returns true.
    pub fn is_running(&self) -> bool {
        self.exit_state.exit_info().is_none()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit_state.exit_info()
    }

    /// Sends `signal` without waiting. A process already reaped is left alone
    /// so a recycled pid is never signalled.
    pub fn terminate(&self, signal: Signal) -> std::io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        debug!("Sending {:?} to pid {}.", signal, self.pid);
        send_signal(self.pid, signal)
    }

    /// Polls liveness every `poll_interval` until the process exits or
    /// `timeout` elapses.
    pub fn wait_for_exit(&self, timeout: Duration, poll_interval: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(info) = self.exit_info() {
                return WaitOutcome::Exited(info);
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }

    /// Blocks until the OS reports exit. Only used after an unconditional
    /// kill or when the caller is prepared to wait indefinitely.
    pub fn wait_until_exit(&self) -> ExitInfo {
        let lifecycle = mutex_lock_or_recover(&self.exit_state.lifecycle);
        let lifecycle = self
            .exit_state
            .exited
            .wait_while(lifecycle, |state| matches!(state, Lifecycle::Running))
            .unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Exited(info) => info,
            Lifecycle::Running => ExitInfo::unknown(),
        }
    }

    /// Waits up to `timeout` for both stream readers to reach end of stream.
    /// Returns false if output may still be arriving.
    pub fn drain_output(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let finished = mutex_lock_or_recover(&self.readers)
                .iter()
                .all(|reader| reader.is_finished());
            if finished {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }
}

fn spawn_reader<R>(mut stream: R, kind: StreamKind, on_output: OutputObserver) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut pending = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    let text = take_decoded(&mut pending);
                    if !text.is_empty() {
                        on_output(kind, &text);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Stopped reading {}: {}", kind, e);
                    break;
                }
            }
        }
        if !pending.is_empty() {
            debug!("Dropped {} undecodable trailing byte(s) from {}.", pending.len(), kind);
        }
    })
}

fn spawn_waiter(mut child: Child, pid: u32, exit_state: Arc<ExitState>, on_exit: ExitObserver) {
    thread::spawn(move || {
        let info = match child.wait() {
            Ok(status) => ExitInfo::from_status(status),
            Err(e) => {
                error!("Failed to wait for process {}: {}", pid, e);
                ExitInfo::unknown()
            }
        };
        debug!("Process {} exited: {}.", pid, info);
        exit_state.mark_exited(info);
        on_exit(pid, info);
    });
}

/// Drains the decodable part of `pending`. Invalid byte sequences are
/// skipped; an incomplete sequence at the end stays in `pending` for the next
/// read.
fn take_decoded(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    let mut start = 0;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                start = pending.len();
            }
            Err(e) => {
                let valid_up_to = start + e.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[start..valid_up_to]));
                match e.error_len() {
                    Some(len) => start = valid_up_to + len,
                    None => {
                        start = valid_up_to;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
    text
}
