pub mod cli;
pub mod console_observer;
pub mod logging;
