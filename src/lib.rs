//! Supervision of a long-running local server process and its one-shot
//! login helpers.

pub mod app;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod process;
pub mod sync;
pub mod worker;

pub use config::SupervisorConfig;
pub use error::{ArtifactKind, LaunchError, OrphanError, SupervisorError};
pub use manager::auth_runner::AuthTaskRunner;
pub use manager::observer::{NoopObserver, SupervisorObserver};
pub use manager::server_supervisor::ServerSupervisor;
pub use models::auth::{AuthOutcome, AuthProvider};
pub use models::log_buffer::BoundedLogBuffer;
pub use models::state::SupervisorState;
