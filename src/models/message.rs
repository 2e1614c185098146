use crate::{error::SupervisorError, process::ExitInfo};

pub type StartReply = Box<dyn FnOnce(Result<(), SupervisorError>) + Send>;
pub type StopReply = Box<dyn FnOnce() + Send>;

/// Everything the supervisor worker reacts to. Requests carry their reply;
/// exit events come from process waiter threads.
pub enum SupervisorMessage {
    Start(StartReply),
    Stop(StopReply),
    ProcessExited { pid: u32, exit: ExitInfo },
    Shutdown(StopReply),
}
