//! Command expansion
//!
//! Turns a phase's declared commands into concrete invocations: variables
//! are substituted into the command line, the line is split into words the
//! way a shell would, and the full environment for the child is computed.
//! Expansion is pure; nothing here touches the disk or spawns processes.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::core::package::{CommandSpec, PackageDescriptor};
use crate::core::phase::Phase;
use crate::error::ExpandError;

/// Variable name to value
pub type Bindings = BTreeMap<String, String>;

/// A fully resolved command ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableCommand {
    /// Phase the command belongs to
    pub phase: Phase,
    /// Command line as declared, before substitution
    pub raw: String,
    /// Program to run
    pub program: String,
    /// Arguments, without the program
    pub args: Vec<String>,
    /// Complete environment for the child process
    pub env: Bindings,
}

impl ExecutableCommand {
    /// Program and arguments joined for display
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
            .expect("Invalid variable pattern")
    })
}

/// Substitute `${NAME}` and `$NAME` references.
///
/// Unknown names expand to the empty string.
pub fn substitute(input: &str, bindings: &Bindings) -> String {
    match variable_pattern().replace_all(input, |caps: &Captures<'_>| {
        let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        bindings.get(name).cloned().unwrap_or_default()
    }) {
        Cow::Borrowed(unchanged) => unchanged.to_string(),
        Cow::Owned(replaced) => replaced,
    }
}

/// Split a command line into words.
///
/// Whitespace separates words. Single quotes keep their content literally,
/// double quotes group and honour `\"`, `\\` and `\$`, and a backslash
/// outside quotes escapes the next character.
pub fn split_words(line: &str) -> Result<Vec<String>, ExpandError> {
    let unterminated = || ExpandError::UnterminatedQuote {
        command: line.to_string(),
    };

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated()),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '\\' | '$')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(unterminated()),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next().unwrap_or('\\'));
            }
            _ => {
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

/// Expand a single command against the build bindings
pub fn expand_command(
    phase: Phase,
    spec: &CommandSpec,
    bindings: &Bindings,
) -> Result<ExecutableCommand, ExpandError> {
    let mut env = bindings.clone();
    for (key, value) in &spec.env_overrides {
        env.insert(key.clone(), substitute(value, bindings));
    }

    let line = substitute(&spec.command_line, &env);
    let mut words = split_words(&line)?.into_iter();
    let program = words.next().ok_or_else(|| ExpandError::EmptyCommand {
        command: spec.command_line.clone(),
    })?;

    Ok(ExecutableCommand {
        phase,
        raw: spec.command_line.clone(),
        program,
        args: words.collect(),
        env,
    })
}

/// Expand every command registered for `phase`, in declaration order
pub fn expand(
    descriptor: &PackageDescriptor,
    phase: Phase,
    bindings: &Bindings,
) -> Result<Vec<ExecutableCommand>, ExpandError> {
    descriptor
        .commands(phase)
        .iter()
        .map(|spec| expand_command(phase, spec, bindings))
        .collect()
}
