//! Interactive prompt protocol
//!
//! The engine asks a [`Responder`] for one line per prompt and parses it into
//! a [`Response`]. Blocking console I/O lives entirely behind the trait.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ops::Op;

/// Shown after an answer that could not be parsed.
pub const USAGE: &str = "Enter Y, n, a (allow all), e.g. 10s for seconds, or 10 for count.";

/// Prompt line for one pending operation.
pub fn question(op: Op, path: &str) -> String {
    format!("[canaryfs] Allow {op} {path}? (Y/n/a or <Ns>/<N>): ")
}

/// A parsed prompt answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Empty input, `y` or `Y`.
    AllowOnce,
    Deny,
    /// Approve everything for the rest of the session.
    AllowAll,
    /// `<N>s`
    AllowFor(Duration),
    /// `<N>`
    AllowTimes(u64),
}

impl Response {
    /// Parse one answer line. Returns `None` for anything unrecognised,
    /// including zero durations and counts. Numbers too large for `u64`
    /// saturate.
    pub fn parse(input: &str) -> Option<Self> {
        let answer = input.trim();
        match answer {
            "" | "y" | "Y" => return Some(Response::AllowOnce),
            "n" | "N" => return Some(Response::Deny),
            "a" | "A" => return Some(Response::AllowAll),
            _ => {}
        }
        if let Some(seconds) = answer.strip_suffix('s') {
            return positive(seconds).map(|secs| Response::AllowFor(Duration::from_secs(secs)));
        }
        positive(answer).map(Response::AllowTimes)
    }
}

fn positive(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // only overflow can fail once every byte is a digit
    let n = digits.parse::<u64>().unwrap_or(u64::MAX);
    (n > 0).then_some(n)
}

/// Source of prompt answers
pub trait Responder: Send {
    /// Show `question` and block until one line of input arrives.
    /// `Ok(None)` signals end of input.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>>;

    /// Tell the user how to answer after an invalid response.
    fn remind(&mut self, usage: &str);
}

/// Prompts on stdout and reads answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleResponder;

impl Responder for ConsoleResponder {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;
        drop(stdout);

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }

    fn remind(&mut self, usage: &str) {
        println!("{usage}");
    }
}

#[derive(Debug, Default)]
struct Script {
    answers: VecDeque<String>,
    questions: Vec<String>,
    reminders: usize,
}

/// Answers prompts from a prepared queue; an empty queue reads as end of
/// input. Clones share the same queue, so a handle kept outside the engine
/// can feed answers and inspect what was asked.
#[derive(Debug, Default, Clone)]
pub struct ScriptedResponder {
    script: Arc<Mutex<Script>>,
}

impl ScriptedResponder {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responder = Self::default();
        for answer in answers {
            responder.push(answer);
        }
        responder
    }

    pub fn push(&self, answer: impl Into<String>) {
        if let Ok(mut script) = self.script.lock() {
            script.answers.push_back(answer.into());
        }
    }

    /// Every question asked so far, in order.
    pub fn questions(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|script| script.questions.clone())
            .unwrap_or_default()
    }

    pub fn prompts(&self) -> usize {
        self.script.lock().map(|script| script.questions.len()).unwrap_or(0)
    }

    pub fn reminders(&self) -> usize {
        self.script.lock().map(|script| script.reminders).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|script| script.answers.len()).unwrap_or(0)
    }
}

impl Responder for ScriptedResponder {
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| io::Error::other("prompt script poisoned"))?;
        script.questions.push(question.to_string());
        Ok(script.answers.pop_front())
    }

    fn remind(&mut self, _usage: &str) {
        if let Ok(mut script) = self.script.lock() {
            script.reminders += 1;
        }
    }
}
