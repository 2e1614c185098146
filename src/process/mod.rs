pub mod handle;
pub mod orphan;
pub mod signal;

pub use handle::{
    ExitInfo, ExitObserver, LaunchSpec, OutputObserver, ProcessHandle, StreamKind, WaitOutcome,
};
pub use orphan::{OrphanReclaimer, ProcessTable, SystemProcessTable};
pub use signal::Signal;
