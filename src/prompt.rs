// src/prompt.rs

//! Interactive prompts
//!
//! Plain yes/no questions block indefinitely on an interactive terminal
//! and return their default immediately in non-interactive mode. The
//! abort/retry/ignore prompt used around removable media takes a timeout,
//! after which the default answer is taken.

use std::collections::VecDeque;
use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Answer to an abort/retry/ignore prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAction {
    Abort,
    Retry,
    Ignore,
}

impl PromptAction {
    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "a" | "abort" => Some(PromptAction::Abort),
            "r" | "retry" => Some(PromptAction::Retry),
            "i" | "ignore" => Some(PromptAction::Ignore),
            _ => None,
        }
    }
}

/// Interactive-prompt collaborator
pub trait Prompt {
    /// Ask a yes/no question
    fn confirm(&self, question: &str, default: bool) -> bool;

    /// Ask abort/retry/ignore, falling back to `default` after `timeout`
    fn abort_retry_ignore(
        &self,
        question: &str,
        timeout: Option<Duration>,
        default: PromptAction,
    ) -> PromptAction;
}

/// Prompt reading answers from standard input
pub struct StdinPrompt {
    non_interactive: bool,
}

impl StdinPrompt {
    pub fn new(non_interactive: bool) -> Self {
        // Piped stdin cannot answer questions
        let non_interactive = non_interactive || !io::stdin().is_terminal();
        Self { non_interactive }
    }

    pub fn is_interactive(&self) -> bool {
        !self.non_interactive
    }
}

fn read_answer() -> Option<String> {
    let mut input = String::new();
    match io::stdin().lock().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input),
    }
}

impl Prompt for StdinPrompt {
    fn confirm(&self, question: &str, default: bool) -> bool {
        let choices = if default { "[y/n] (y)" } else { "[y/n] (n)" };

        if self.non_interactive {
            println!("{} {}: {}", question, choices, if default { "y" } else { "n" });
            return default;
        }

        loop {
            print!("{} {}: ", question, choices);
            let _ = io::stdout().flush();

            let Some(input) = read_answer() else {
                return default;
            };
            match input.trim().to_lowercase().as_str() {
                "" => return default,
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => println!("Invalid answer '{}'.", input.trim()),
            }
        }
    }

    fn abort_retry_ignore(
        &self,
        question: &str,
        timeout: Option<Duration>,
        default: PromptAction,
    ) -> PromptAction {
        if self.non_interactive {
            println!("{} [a/r/i]: {:?}", question, default);
            return default;
        }

        print!("{} [a/r/i]: ", question);
        let _ = io::stdout().flush();

        let Some(timeout) = timeout else {
            return read_answer()
                .and_then(|a| PromptAction::parse(&a))
                .unwrap_or(default);
        };

        // The reader thread stays parked on stdin if the timeout fires first;
        // it exits with the next line of input or at process end.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Some(answer) = read_answer() {
                let _ = tx.send(answer);
            }
        });

        match rx.recv_timeout(timeout) {
            Ok(answer) => PromptAction::parse(&answer).unwrap_or(default),
            Err(_) => {
                debug!("Prompt timed out after {:?}, using {:?}", timeout, default);
                println!();
                default
            }
        }
    }
}

/// Prompt answering from a fixed script, for non-terminal drivers and tests
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    confirms: RefCell<VecDeque<bool>>,
    actions: RefCell<VecDeque<PromptAction>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirms(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.confirms.borrow_mut().extend(answers);
        self
    }

    pub fn with_actions(self, answers: impl IntoIterator<Item = PromptAction>) -> Self {
        self.actions.borrow_mut().extend(answers);
        self
    }

    /// Questions asked so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, question: &str, default: bool) -> bool {
        self.asked.borrow_mut().push(question.to_string());
        self.confirms.borrow_mut().pop_front().unwrap_or(default)
    }

    fn abort_retry_ignore(
        &self,
        question: &str,
        _timeout: Option<Duration>,
        default: PromptAction,
    ) -> PromptAction {
        self.asked.borrow_mut().push(question.to_string());
        self.actions.borrow_mut().pop_front().unwrap_or(default)
    }
}
