use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Cooperative termination (SIGTERM).
    Term,
    /// Unconditional termination (SIGKILL).
    Kill,
}

impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Term => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let pid_t: libc::pid_t = pid
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "PID out of range"))?;

    let result = unsafe { libc::kill(pid_t, signal.as_raw()) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_variants() {
        assert_ne!(Signal::Term, Signal::Kill);
        assert_eq!(Signal::Term.as_raw(), libc::SIGTERM);
        assert_eq!(Signal::Kill.as_raw(), libc::SIGKILL);
    }

    #[test]
    fn test_rejects_out_of_range_pid() {
        let err = send_signal(u32::MAX, Signal::Term).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
