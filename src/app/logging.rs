use env_logger::Env;

/// Diagnostic logging for the supervisor itself. `RUST_LOG` overrides
/// `default_level`.
pub fn init_logging(default_level: &str) {
    let env = Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized.");
    }
}
