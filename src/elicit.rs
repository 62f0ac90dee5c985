//! elicit.rs
//!
//! Interactive confirmation boundary. The workflow only ever sees
//! accept/decline outcomes; how the question reaches the operator is the
//! implementation's business, which keeps every coordinator path scriptable
//! in tests.

use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElicitOutcome {
    Accept(String),
    Decline,
}

pub trait Elicit {
    /// Ask the operator a question, optionally constrained to a fixed set
    /// of allowed answers.
    fn elicit(&mut self, message: &str, options: Option<&[String]>) -> ElicitOutcome;
}

/// Stdin-backed elicitation for interactive runs. An empty line or EOF
/// counts as a decline; constrained questions accept either a 1-based index
/// or a case-insensitive match against an allowed answer.
pub struct ConsoleElicit;

impl Elicit for ConsoleElicit {
    fn elicit(&mut self, message: &str, options: Option<&[String]>) -> ElicitOutcome {
        let mut out = io::stdout();
        let _ = writeln!(out, "{message}");
        if let Some(opts) = options {
            for (i, opt) in opts.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, opt);
            }
        }
        let _ = write!(out, "> ");
        let _ = out.flush();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => return ElicitOutcome::Decline,
            Ok(_) => {}
        }

        let answer = line.trim().trim_matches('"').to_string();
        if answer.is_empty() {
            return ElicitOutcome::Decline;
        }

        let Some(opts) = options else {
            return ElicitOutcome::Accept(answer);
        };

        if let Ok(idx) = answer.parse::<usize>() {
            if (1..=opts.len()).contains(&idx) {
                return ElicitOutcome::Accept(opts[idx - 1].clone());
            }
        }

        match opts.iter().find(|o| o.eq_ignore_ascii_case(&answer)) {
            Some(hit) => ElicitOutcome::Accept(hit.clone()),
            None => ElicitOutcome::Decline,
        }
    }
}

/// Canned responses consumed in order; anything past the script declines.
#[cfg(test)]
pub struct ScriptedElicit {
    responses: std::collections::VecDeque<ElicitOutcome>,
}

#[cfg(test)]
impl ScriptedElicit {
    pub fn new(responses: Vec<ElicitOutcome>) -> Self {
        Self {
            responses: responses.into(),
        }
    }

    pub fn accept(data: &str) -> ElicitOutcome {
        ElicitOutcome::Accept(data.to_string())
    }
}

#[cfg(test)]
impl Elicit for ScriptedElicit {
    fn elicit(&mut self, _message: &str, _options: Option<&[String]>) -> ElicitOutcome {
        self.responses.pop_front().unwrap_or(ElicitOutcome::Decline)
    }
}
