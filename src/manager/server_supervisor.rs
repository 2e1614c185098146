use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

use crossbeam_channel::{bounded, unbounded, SendError, Sender};
use log::{error, info};

use crate::{
    config::SupervisorConfig,
    error::SupervisorError,
    manager::{
        auth_runner::AuthTaskRunner, log_aggregator::LogAggregator,
        observer::SupervisorObserver,
    },
    models::{
        auth::{AuthOutcome, AuthProvider},
        message::SupervisorMessage,
        state::SupervisorState,
    },
    process::{OrphanReclaimer, ProcessTable, SystemProcessTable},
    sync::mutex_lock_or_recover,
    worker::worker::{spawn_worker_thread, SupervisorWorker},
};

/// Front door for the UI: start/stop the server, run logins, read logs.
///
/// Start and stop requests are queued to a single worker thread, so they are
/// applied one at a time and at most one server process exists. Dropping the
/// supervisor stops the server and reclaims orphans before returning.
pub struct ServerSupervisor {
    sender: Sender<SupervisorMessage>,
    state: Arc<Mutex<SupervisorState>>,
    logs: Arc<LogAggregator>,
    auth: AuthTaskRunner,
    worker: Option<JoinHandle<()>>,
}

impl ServerSupervisor {
    pub fn new(config: SupervisorConfig, observer: Arc<dyn SupervisorObserver>) -> Self {
        Self::with_process_table(config, observer, Arc::new(SystemProcessTable))
    }

    pub fn with_process_table(
        config: SupervisorConfig,
        observer: Arc<dyn SupervisorObserver>,
        table: Arc<dyn ProcessTable>,
    ) -> Self {
        let config = Arc::new(config);
        let logs = Arc::new(LogAggregator::new(config.log_capacity, Arc::clone(&observer)));
        let state = Arc::new(Mutex::new(SupervisorState::Stopped));
        let (sender, receiver) = unbounded();

        let worker = SupervisorWorker {
            config: Arc::clone(&config),
            logs: Arc::clone(&logs),
            observer: Arc::clone(&observer),
            reclaimer: OrphanReclaimer::new(table, config.orphan_settle_delay),
            sender: sender.clone(),
            state: Arc::clone(&state),
            active: None,
        };
        let worker = spawn_worker_thread(worker, receiver);

        let auth = AuthTaskRunner::new(config, Arc::clone(&logs), observer);

        Self {
            sender,
            state,
            logs,
            auth,
            worker: Some(worker),
        }
    }

    /// Starts the server and blocks until it is running or has failed.
    /// Succeeds without doing anything if a server is already up.
    pub fn start(&self) -> Result<(), SupervisorError> {
        let (tx, rx) = bounded(1);
        self.start_with(move |result| {
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Err(SupervisorError::WorkerUnavailable))
    }

    /// Queues a start and returns immediately; `on_done` runs on the worker
    /// thread with the outcome.
    pub fn start_with<F>(&self, on_done: F)
    where
        F: FnOnce(Result<(), SupervisorError>) + Send + 'static,
    {
        let message = SupervisorMessage::Start(Box::new(on_done));
        if let Err(SendError(SupervisorMessage::Start(on_done))) = self.sender.send(message) {
            on_done(Err(SupervisorError::WorkerUnavailable));
        }
    }

    /// Stops the server, escalating to SIGKILL after the graceful timeout.
    /// Blocks until the process is gone. Succeeds trivially when stopped.
    pub fn stop(&self) {
        let (tx, rx) = bounded(1);
        self.stop_with(move || {
            let _ = tx.send(());
        });
        let _ = rx.recv();
    }

    pub fn stop_with<F>(&self, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let message = SupervisorMessage::Stop(Box::new(on_done));
        if let Err(SendError(SupervisorMessage::Stop(on_done))) = self.sender.send(message) {
            on_done();
        }
    }

    pub fn state(&self) -> SupervisorState {
        *mutex_lock_or_recover(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == SupervisorState::Running
    }

    /// Current server log, oldest first.
    pub fn logs(&self) -> Vec<String> {
        self.logs.snapshot()
    }

    pub fn run_auth_command<F>(&self, provider: AuthProvider, on_outcome: F)
    where
        F: FnOnce(AuthOutcome) + Send + 'static,
    {
        self.auth.run(provider, on_outcome);
    }

    pub fn auth_runner(&self) -> &AuthTaskRunner {
        &self.auth
    }

    /// Synchronous stop plus an orphan sweep. Later requests fail with
    /// [`SupervisorError::WorkerUnavailable`].
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let (tx, rx) = bounded(1);
        let message = SupervisorMessage::Shutdown(Box::new(move || {
            let _ = tx.send(());
        }));
        if self.sender.send(message).is_ok() {
            let _ = rx.recv();
        }
        if worker.join().is_err() {
            error!("Supervisor worker panicked.");
        }
        info!("Supervisor shut down.");
    }
}

impl Drop for ServerSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
