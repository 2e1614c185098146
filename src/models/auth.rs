use std::{fmt, str::FromStr};

/// Login flows the server binary can run as a one-shot helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProvider {
    Gemini,
    Codex,
    Claude,
    Qwen,
    IFlow,
}

impl AuthProvider {
    pub const ALL: [AuthProvider; 5] = [
        AuthProvider::Gemini,
        AuthProvider::Codex,
        AuthProvider::Claude,
        AuthProvider::Qwen,
        AuthProvider::IFlow,
    ];

    /// Command-line flag that selects this login flow.
    pub fn flag(self) -> &'static str {
        match self {
            AuthProvider::Gemini => "--login",
            AuthProvider::Codex => "--codex-login",
            AuthProvider::Claude => "--claude-login",
            AuthProvider::Qwen => "--qwen-login",
            AuthProvider::IFlow => "--iflow-login",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AuthProvider::Gemini => "gemini",
            AuthProvider::Codex => "codex",
            AuthProvider::Claude => "claude",
            AuthProvider::Qwen => "qwen",
            AuthProvider::IFlow => "iflow",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        AuthProvider::ALL
            .into_iter()
            .find(|provider| provider.name() == lowered)
            .ok_or_else(|| format!("Unknown provider '{}'", s))
    }
}

/// Result of launching a login helper.
///
/// `accepted` is optimistic: it means the flow was handed off to the browser,
/// not that credentials were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub accepted: bool,
    pub message: String,
}

impl AuthOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}
