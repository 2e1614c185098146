pub mod auth_runner;
pub mod log_aggregator;
pub mod observer;
pub mod server_supervisor;
