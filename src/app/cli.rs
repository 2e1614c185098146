use std::{
    io::{self, Write},
    sync::Arc,
};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyModifiers},
    execute, terminal,
};

use crate::{
    app::console_observer::ConsoleObserver,
    manager::server_supervisor::ServerSupervisor,
    models::auth::AuthProvider,
};

const DEFAULT_LOG_TAIL: usize = 20;

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Status,
    Logs(usize),
    Follow,
    Login(AuthProvider),
    Help,
    Exit,
}

/// Parses one console line. `Ok(None)` for blank input.
pub fn parse_command(input: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut args = input.split_whitespace();
    let Some(command) = args.next() else {
        return Ok(None);
    };

    let parsed = match command {
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "status" => ConsoleCommand::Status,
        "logs" => match args.next() {
            Some(count) => ConsoleCommand::Logs(
                count
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid line count '{}'.", count))?,
            ),
            None => ConsoleCommand::Logs(DEFAULT_LOG_TAIL),
        },
        "follow" => ConsoleCommand::Follow,
        "login" => match args.next() {
            Some(provider) => ConsoleCommand::Login(provider.parse()?),
            None => return Err("Provider must be specified.".to_string()),
        },
        "help" => ConsoleCommand::Help,
        "exit" | "quit" => ConsoleCommand::Exit,
        other => return Err(format!("Unknown command: {}. Type 'help'.", other)),
    };
    Ok(Some(parsed))
}

pub fn run_cli(mut supervisor: ServerSupervisor, observer: Arc<ConsoleObserver>) -> io::Result<()> {
    println!("Server supervisor started. Type 'help' for commands or 'exit' to quit.");
    let mut history: Vec<String> = Vec::new();

    terminal::enable_raw_mode()?;
    let result = command_loop(&supervisor, &observer, &mut history);
    terminal::disable_raw_mode()?;

    println!("Stopping server...");
    supervisor.shutdown();
    result
}

fn command_loop(
    supervisor: &ServerSupervisor,
    observer: &ConsoleObserver,
    history: &mut Vec<String>,
) -> io::Result<()> {
    loop {
        let Some(input) = read_line(history)? else {
            return Ok(());
        };
        if !input.trim().is_empty() {
            history.push(input.clone());
        }

        let command = match parse_command(&input) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                print_line(&message);
                continue;
            }
        };

        match command {
            ConsoleCommand::Start => {
                print_line("Starting server...");
                supervisor.start_with(|result| match result {
                    Ok(()) => print_line("Server started."),
                    Err(e) => print_line(&format!("Start failed: {}", e)),
                });
            }
            ConsoleCommand::Stop => {
                print_line("Stopping server...");
                supervisor.stop_with(|| print_line("Server stopped."));
            }
            ConsoleCommand::Status => {
                print_line(&format!("Server is {}.", supervisor.state()));
            }
            ConsoleCommand::Logs(count) => {
                let logs = supervisor.logs();
                if logs.is_empty() {
                    print_line("No log records.");
                }
                for record in &logs[logs.len().saturating_sub(count)..] {
                    print_line(record);
                }
            }
            ConsoleCommand::Follow => {
                let following = observer.toggle_follow();
                print_line(if following {
                    "Following server logs."
                } else {
                    "Stopped following server logs."
                });
            }
            ConsoleCommand::Login(provider) => {
                print_line(&format!("Starting {} login...", provider));
                supervisor.run_auth_command(provider, move |outcome| {
                    let verdict = if outcome.accepted { "accepted" } else { "failed" };
                    print_line(&format!("{} login {}: {}", provider, verdict, outcome.message));
                });
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Exit => {
                print_line("Exiting the program...");
                return Ok(());
            }
        }
    }
}

/// Reads one line with Up/Down history. `None` on Ctrl-C or Ctrl-D.
fn read_line(history: &[String]) -> io::Result<Option<String>> {
    let mut input = String::new();
    let mut history_index = history.len();
    redraw(&input)?;

    loop {
        let Event::Key(key_event) = event::read()? else {
            continue;
        };
        match key_event.code {
            KeyCode::Enter => {
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(Some(input));
            }
            KeyCode::Char('c') | KeyCode::Char('d')
                if key_event.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(None);
            }
            KeyCode::Up => {
                if history_index > 0 {
                    history_index -= 1;
                    input = history[history_index].clone();
                    redraw(&input)?;
                }
            }
            KeyCode::Down => {
                if history_index < history.len() {
                    history_index += 1;
                    input = history.get(history_index).cloned().unwrap_or_default();
                    redraw(&input)?;
                }
            }
            KeyCode::Char(c) => {
                input.push(c);
                print!("{}", c);
                io::stdout().flush()?;
            }
            KeyCode::Backspace => {
                input.pop();
                redraw(&input)?;
            }
            _ => {}
        }
    }
}

fn redraw(input: &str) -> io::Result<()> {
    execute!(
        io::stdout(),
        cursor::MoveToColumn(0),
        terminal::Clear(terminal::ClearType::CurrentLine)
    )?;
    print!(">>> {}", input);
    io::stdout().flush()
}

fn print_line(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r{}\r\n", text);
    let _ = stdout.flush();
}

fn print_help() {
    print_line("Commands:");
    print_line("  start            launch the server");
    print_line("  stop             stop the server");
    print_line("  status           show server state");
    print_line("  logs [n]         show the last n log records");
    print_line("  follow           toggle live log output");
    print_line("  login <provider> run a login flow (gemini, codex, claude, qwen, iflow)");
    print_line("  exit             stop the server and quit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("start"), Ok(Some(ConsoleCommand::Start)));
        assert_eq!(parse_command("  stop "), Ok(Some(ConsoleCommand::Stop)));
        assert_eq!(parse_command("quit"), Ok(Some(ConsoleCommand::Exit)));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_logs_count() {
        assert_eq!(
            parse_command("logs"),
            Ok(Some(ConsoleCommand::Logs(DEFAULT_LOG_TAIL)))
        );
        assert_eq!(parse_command("logs 5"), Ok(Some(ConsoleCommand::Logs(5))));
        assert!(parse_command("logs five").is_err());
    }

    #[test]
    fn test_parse_login() {
        assert_eq!(
            parse_command("login qwen"),
            Ok(Some(ConsoleCommand::Login(AuthProvider::Qwen)))
        );
        assert!(parse_command("login").is_err());
        assert!(parse_command("login myspace").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        let err = parse_command("restart").unwrap_err();
        assert!(err.contains("Unknown command: restart"));
    }
}
