use std::{
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::{
    config::SupervisorConfig,
    error::SupervisorError,
    manager::{log_aggregator::LogAggregator, observer::SupervisorObserver},
    models::{message::SupervisorMessage, state::SupervisorState},
    process::{ExitInfo, LaunchSpec, OrphanReclaimer, ProcessHandle, Signal, WaitOutcome},
    sync::mutex_lock_or_recover,
};

/// State owned by the supervisor worker thread. Only this thread touches the
/// active process handle.
pub struct SupervisorWorker {
    pub config: Arc<SupervisorConfig>,
    pub logs: Arc<LogAggregator>,
    pub observer: Arc<dyn SupervisorObserver>,
    pub reclaimer: OrphanReclaimer,
    pub sender: Sender<SupervisorMessage>,
    pub state: Arc<Mutex<SupervisorState>>,
    pub active: Option<ProcessHandle>,
}

pub fn spawn_worker_thread(
    mut worker: SupervisorWorker,
    receiver: Receiver<SupervisorMessage>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match receiver.recv() {
            Ok(message) => match message {
                SupervisorMessage::Start(reply) => {
                    let result = worker.handle_start();
                    reply(result);
                }
                SupervisorMessage::Stop(reply) => {
                    worker.handle_stop();
                    reply();
                }
                SupervisorMessage::ProcessExited { pid, exit } => worker.handle_exit(pid, exit),
                SupervisorMessage::Shutdown(reply) => {
                    worker.handle_shutdown();
                    reply();
                    break;
                }
            },
            Err(e) => {
                error!("Failed to receive message: {}", e);
                break;
            }
        }
    })
}

impl SupervisorWorker {
    fn handle_start(&mut self) -> Result<(), SupervisorError> {
        if self.active.is_some() {
            info!("Server already {}; ignoring start.", self.state());
            return Ok(());
        }

        self.set_state(SupervisorState::Starting);
        self.reclaimer.reclaim(&self.config.binary_name());

        if let Err(e) = self.config.validate_artifacts() {
            return Err(self.abort_start(e));
        }

        let launch = LaunchSpec::new(&self.config.binary_path)
            .arg("--config")
            .arg(&self.config.config_path);
        let exit_sender = self.sender.clone();
        let launched = ProcessHandle::launch(
            launch,
            self.logs.output_observer(),
            Box::new(move |pid, exit| {
                // The worker is gone once shut down; nothing left to notify.
                let _ = exit_sender.send(SupervisorMessage::ProcessExited { pid, exit });
            }),
        );
        let handle = match launched {
            Ok(handle) => handle,
            Err(e) => return Err(self.abort_start(e.into())),
        };

        let pid = handle.pid();
        self.logs.record(format!("Server starting (pid {})", pid));
        let handle = self.active.insert(handle);

        match handle.wait_for_exit(self.config.readiness_delay, self.config.poll_interval) {
            WaitOutcome::TimedOut => {
                info!("Server is running (pid {}).", pid);
                self.logs.record(format!("Server running (pid {})", pid));
                self.set_state(SupervisorState::Running);
                self.observer.status_changed(SupervisorState::Running);
                Ok(())
            }
            WaitOutcome::Exited(exit) => {
                self.active = None;
                error!("Server exited during startup: {}.", exit);
                self.logs
                    .record(format!("Server failed to start: exited during startup ({})", exit));
                self.set_state(SupervisorState::Stopped);
                Err(SupervisorError::ReadinessTimeout { exit })
            }
        }
    }

    fn abort_start(&self, err: SupervisorError) -> SupervisorError {
        error!("Failed to start server: {}", err);
        self.logs.record(format!("Server failed to start: {}", err));
        self.set_state(SupervisorState::Stopped);
        err
    }

    fn handle_stop(&mut self) {
        let Some(handle) = self.active.as_ref() else {
            debug!("Stop requested with no active server.");
            self.set_state(SupervisorState::Stopped);
            self.observer.status_changed(SupervisorState::Stopped);
            return;
        };

        let pid = handle.pid();
        self.set_state(SupervisorState::Stopping);
        info!("Stopping '{}' (pid {}).", handle.program().display(), pid);

        if let Err(e) = handle.terminate(Signal::Term) {
            warn!("Failed to send SIGTERM to {}: {}", pid, e);
        }

        let graceful = self.config.graceful_timeout;
        if handle.wait_for_exit(graceful, self.config.poll_interval) == WaitOutcome::TimedOut {
            warn!("Server {} still alive after {:?}; sending SIGKILL.", pid, graceful);
            self.logs
                .record("Server did not stop gracefully, forcing termination");
            if let Err(e) = handle.terminate(Signal::Kill) {
                error!("Failed to send SIGKILL to {}: {}", pid, e);
            }
        }

        let exit = handle.wait_until_exit();
        self.active = None;

        info!("Server {} stopped: {}.", pid, exit);
        self.logs.record(format!("Server stopped ({})", exit));
        self.set_state(SupervisorState::Stopped);
        self.observer.status_changed(SupervisorState::Stopped);
    }

    fn handle_exit(&mut self, pid: u32, exit: ExitInfo) {
        match &self.active {
            Some(handle) if handle.pid() == pid => {}
            _ => {
                debug!("Ignoring exit of inactive process {} ({}).", pid, exit);
                return;
            }
        }

        self.active = None;
        warn!("Server {} exited unexpectedly: {}.", pid, exit);
        self.logs.record(format!("Server exited ({})", exit));
        self.set_state(SupervisorState::Stopped);
        self.observer.status_changed(SupervisorState::Stopped);
    }

    fn handle_shutdown(&mut self) {
        info!("Supervisor shutting down.");
        if self.active.is_some() {
            self.handle_stop();
        }
        self.reclaimer.reclaim(&self.config.binary_name());
    }

    fn state(&self) -> SupervisorState {
        *mutex_lock_or_recover(&self.state)
    }

    fn set_state(&self, state: SupervisorState) {
        let mut current = mutex_lock_or_recover(&self.state);
        if *current != state {
            debug!("Supervisor state {} -> {}.", *current, state);
        }
        *current = state;
    }
}
