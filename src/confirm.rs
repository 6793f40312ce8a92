use std::io::{self, BufRead, IsTerminal, Write};

/// Asks the operator a yes/no question.
pub trait Prompter: Send + Sync {
    fn ask_yes_no(&self, prompt: &str, default: bool) -> bool;
}

/// Prompts on stderr and reads stdin. Without a terminal the default is returned at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask_yes_no(&self, prompt: &str, default: bool) -> bool {
        if !io::stdin().is_terminal() {
            return default;
        }

        let read = || {
            let mut stderr = io::stderr();
            let _ = write!(stderr, "{prompt}");
            let _ = stderr.flush();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        };

        // We are inside the runtime; let it move other work off this thread while we block.
        let answer = match tokio::runtime::Handle::try_current() {
            Ok(_) => tokio::task::block_in_place(read),
            Err(_) => read(),
        };

        match answer {
            Ok(line) => parse_yes_no(&line, default),
            Err(_) => default,
        }
    }
}

pub fn parse_yes_no(answer: &str, default: bool) -> bool {
    let s = answer.trim().to_lowercase();
    if s.is_empty() {
        return default;
    }
    s == "y" || s == "yes"
}
