use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::{
    config::SupervisorConfig,
    manager::{log_aggregator::LogAggregator, observer::SupervisorObserver},
    models::auth::{AuthOutcome, AuthProvider},
    process::{
        ExitInfo, ExitObserver, LaunchSpec, OutputObserver, ProcessHandle, StreamKind,
        WaitOutcome,
    },
    sync::mutex_lock_or_recover,
};

/// Substrings the login helper prints once it has handed off to the browser.
/// Matching English output is fragile across helper versions and locales.
pub const BROWSER_MARKERS: [&str; 2] = ["Opening browser", "Visit the following URL"];

pub const BROWSER_HANDOFF_MESSAGE: &str =
    "Login started. Complete the authentication in the browser window that opened.";

const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Output captured for one login task. Never shared with the server log.
#[derive(Default)]
struct TaskCapture {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl TaskCapture {
    fn push(&self, kind: StreamKind, text: &str) {
        let buffer = match kind {
            StreamKind::Stdout => &self.stdout,
            StreamKind::Stderr => &self.stderr,
        };
        mutex_lock_or_recover(buffer).push_str(text);
    }

    fn stdout(&self) -> String {
        mutex_lock_or_recover(&self.stdout).clone()
    }

    fn stderr(&self) -> String {
        mutex_lock_or_recover(&self.stderr).clone()
    }
}

/// Runs one-shot login helpers. Tasks are independent of each other and of
/// the server supervisor.
#[derive(Clone)]
pub struct AuthTaskRunner {
    config: Arc<SupervisorConfig>,
    logs: Arc<LogAggregator>,
    observer: Arc<dyn SupervisorObserver>,
}

impl AuthTaskRunner {
    pub fn new(
        config: Arc<SupervisorConfig>,
        logs: Arc<LogAggregator>,
        observer: Arc<dyn SupervisorObserver>,
    ) -> Self {
        Self {
            config,
            logs,
            observer,
        }
    }

    /// Starts the login flow on its own thread and returns immediately.
    /// `on_outcome` is called exactly once.
    pub fn run<F>(&self, provider: AuthProvider, on_outcome: F)
    where
        F: FnOnce(AuthOutcome) + Send + 'static,
    {
        let runner = self.clone();
        thread::spawn(move || on_outcome(runner.run_blocking(provider)));
    }

    /// Same flow as [`run`](Self::run), on the calling thread. Returns after
    /// the decision delay at most (plus a short output drain).
    pub fn run_blocking(&self, provider: AuthProvider) -> AuthOutcome {
        if let Err(e) = self.config.validate_artifacts() {
            error!("Cannot start {} login: {}", provider, e);
            return AuthOutcome::rejected(e.to_string());
        }

        let capture = Arc::new(TaskCapture::default());
        let on_output: OutputObserver = {
            let capture = Arc::clone(&capture);
            Arc::new(move |kind: StreamKind, text: &str| capture.push(kind, text))
        };

        let launch = LaunchSpec::new(&self.config.binary_path)
            .arg("--config")
            .arg(&self.config.config_path)
            .arg(provider.flag())
            .attach_stdin(true);

        let handle = match ProcessHandle::launch(launch, on_output, self.exit_observer(provider)) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to launch {} login: {}", provider, e);
                return AuthOutcome::rejected(e.to_string());
            }
        };

        info!("Started {} login (pid {}).", provider, handle.pid());
        self.logs
            .record(format!("Started {} login (pid {})", provider, handle.pid()));

        match handle.wait_for_exit(self.config.auth_decision_delay, self.config.poll_interval) {
            WaitOutcome::TimedOut => {
                // Keep stdin open until the helper finishes.
                thread::spawn(move || {
                    let exit = handle.wait_until_exit();
                    debug!("{} login helper {} finished: {}.", provider, handle.pid(), exit);
                });
                AuthOutcome::accepted(BROWSER_HANDOFF_MESSAGE)
            }
            WaitOutcome::Exited(exit) => {
                if !handle.drain_output(OUTPUT_DRAIN_TIMEOUT) {
                    warn!("{} login output may be incomplete.", provider);
                }
                classify_early_exit(exit, &capture.stdout(), &capture.stderr())
            }
        }
    }

    fn exit_observer(&self, provider: AuthProvider) -> ExitObserver {
        let observer = Arc::clone(&self.observer);
        let settle_delay = self.config.auth_settle_delay;
        Box::new(move |pid, exit| {
            if exit.success() {
                info!("{} login helper {} succeeded.", provider, pid);
                // Let the helper's credential writes land first.
                thread::sleep(settle_delay);
                observer.auth_state_changed();
            } else {
                warn!("{} login helper {} ended with {}.", provider, pid, exit);
            }
        })
    }
}

/// Outcome for a helper that exited before the decision delay.
pub fn classify_early_exit(exit: ExitInfo, stdout: &str, stderr: &str) -> AuthOutcome {
    let opened_browser = BROWSER_MARKERS
        .iter()
        .any(|marker| stdout.contains(marker) || stderr.contains(marker));
    if opened_browser {
        return AuthOutcome::accepted(BROWSER_HANDOFF_MESSAGE);
    }

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return AuthOutcome::rejected(stderr);
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return AuthOutcome::rejected(stdout);
    }
    AuthOutcome::rejected(format!("Login process exited with {}", exit))
}
