pub mod auth;
pub mod log_buffer;
pub mod message;
pub mod state;
