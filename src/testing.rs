//! Scripted stand-ins for the external seams, shared by unit tests.

use crate::error::Result;
use crate::process::{CommandSpec, Executor};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

struct Rule<T> {
    pattern: String,
    replies: VecDeque<T>,
}

/// Replies are popped in order; the last one repeats.
fn next_reply<T: Clone>(rules: &mut [Rule<T>], line: &str) -> Option<T> {
    let rule = rules.iter_mut().find(|r| line.contains(&r.pattern))?;
    if rule.replies.len() > 1 {
        rule.replies.pop_front()
    } else {
        rule.replies.front().cloned()
    }
}

#[derive(Default)]
pub struct FakeExecutor {
    dry_run: bool,
    runs: Mutex<Vec<Rule<Result<String>>>>,
    probes: Mutex<Vec<Rule<bool>>>,
    calls: Mutex<Vec<CommandSpec>>,
    probe_calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Commands whose line contains `pattern` get these replies. Unmatched commands succeed empty.
    pub fn on_run(self, pattern: &str, replies: Vec<Result<String>>) -> Self {
        self.runs.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    /// Probes whose line contains `pattern` get these answers. Unmatched probes fail.
    pub fn on_probe(self, pattern: &str, replies: Vec<bool>) -> Self {
        self.probes.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    pub fn probe_lines(&self) -> Vec<String> {
        self.probe_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn run(&self, cmd: &CommandSpec) -> Result<String> {
        let line = cmd.command_line();
        self.calls.lock().unwrap().push(cmd.clone());
        next_reply(&mut self.runs.lock().unwrap(), &line).unwrap_or_else(|| Ok(String::new()))
    }

    async fn probe(&self, program: &str, args: &[&str]) -> bool {
        let mut line = program.to_string();
        for a in args {
            line.push(' ');
            line.push_str(a);
        }
        self.probe_calls.lock().unwrap().push(line.clone());
        next_reply(&mut self.probes.lock().unwrap(), &line).unwrap_or(false)
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}
