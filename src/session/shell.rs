// src/session/shell.rs

//! Interactive shell: many commands over one session
//!
//! Lines are split shell-style, parsed as a command without the program
//! name, and run through the normal workflow. Latched state carries over
//! between lines; per-command state does not.

use super::Session;
use crate::cli::{Command, parse_shell_line};
use crate::error::{Error, Result};
use crate::exit_code::ExitCode;
use std::io::{BufRead, Write};
use tracing::debug;

/// Split a command line into words
///
/// Supports single quotes (literal), double quotes (backslash escapes
/// `"` and `\`) and backslash escapes outside quotes.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated('\'')),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(unterminated('"')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated('"')),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn unterminated(quote: char) -> Error {
    Error::SyntaxError(format!("Unterminated quote ({}) in command line.", quote))
}

/// Read commands from `input` until end of input or `quit`
///
/// Returns the exit code of the last command run.
pub fn run_shell(session: &mut Session, input: impl BufRead, show_prompt: bool) -> ExitCode {
    session.enter_shell();
    let mut last = ExitCode::Ok;
    let mut lines = input.lines();

    loop {
        if show_prompt {
            print!("pkgctl> ");
            // a prompt that fails to show is not fatal
            let _ = std::io::stdout().flush();
        }

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                debug!("Shell input failed: {}", e);
                break;
            }
            None => break,
        };

        let words = match tokenize(&line) {
            Ok(words) => words,
            Err(e) => {
                session.output().report(&e);
                last = e.exit_code();
                continue;
            }
        };
        if words.is_empty() {
            continue;
        }

        last = match parse_shell_line(&words) {
            Ok(Command::Quit) => break,
            Ok(Command::Shell) => {
                session
                    .output()
                    .warning("You already are running pkgctl's shell.");
                ExitCode::Ok
            }
            Ok(command) => session.run_workflow(command),
            Err(signal) => session.handle_signal(signal),
        };
        debug!("Shell command finished with {}", last);
        session.reset_for_next_shell_command();
    }

    last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        tokenize(line).unwrap()
    }

    #[test]
    fn test_tokenize_plain_words() {
        assert_eq!(words("  refresh   -f oss "), vec!["refresh", "-f", "oss"]);
        assert!(words("   ").is_empty());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            words(r#"mr -N 'Main Repo' "oss \"x\"""#),
            vec!["mr", "-N", "Main Repo", "oss \"x\""]
        );
        assert_eq!(words(r"se foo\ bar ''"), vec!["se", "foo bar", ""]);
    }

    #[test]
    fn test_tokenize_unterminated_quote() {
        let err = tokenize("se 'vim").unwrap_err();
        assert!(matches!(err, Error::SyntaxError(_)));
        assert_eq!(err.exit_code(), ExitCode::Syntax);
    }
}
