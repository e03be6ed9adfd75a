//! Lexical statement splitter for bootstrap scripts.
//!
//! This is not a SQL parser. It tracks just enough state to know whether a
//! `;` ends a statement: single-quoted literals and `$$`-delimited bodies
//! are opaque, and `--` line comments are dropped.
//!
//! Only the anonymous `$$` delimiter is recognized. Tagged delimiters such as
//! `$body$` are copied as plain text, so a `;` inside a tagged body splits the
//! statement.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based position in the script.
    pub ordinal: usize,
    pub text: String,
}

impl Statement {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Normal,
    InSingleQuote,
    InDollarBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ToggleDollar,
    ToggleQuote,
    LineComment,
    Terminate,
    Copy,
}

/// Transition table. Earlier arms win, so `$$` beats `'` and both beat `--`.
fn transition(state: ScanState, ch: char, next: Option<char>) -> Action {
    use ScanState::*;

    match (state, ch, next) {
        (Normal | InDollarBlock, '$', Some('$')) => Action::ToggleDollar,
        (Normal | InSingleQuote, '\'', _) => Action::ToggleQuote,
        (Normal, '-', Some('-')) => Action::LineComment,
        (Normal, ';', _) => Action::Terminate,
        _ => Action::Copy,
    }
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    state: ScanState,
    buf: String,
    out: Vec<Statement>,
}

impl<'a> Scanner<'a> {
    fn new(script: &'a str) -> Self {
        Self {
            chars: script.chars().peekable(),
            state: ScanState::Normal,
            buf: String::new(),
            out: Vec::new(),
        }
    }

    fn flush(&mut self) {
        let text = self.buf.trim();
        if !text.is_empty() {
            let ordinal = self.out.len() + 1;
            self.out.push(Statement {
                ordinal,
                text: text.to_string(),
            });
        }
        self.buf.clear();
    }

    fn skip_line(&mut self) {
        for ch in self.chars.by_ref() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn run(mut self) -> Vec<Statement> {
        while let Some(ch) = self.chars.next() {
            let next = self.chars.peek().copied();
            match transition(self.state, ch, next) {
                Action::ToggleDollar => {
                    self.chars.next();
                    self.buf.push_str("$$");
                    self.state = match self.state {
                        ScanState::InDollarBlock => ScanState::Normal,
                        _ => ScanState::InDollarBlock,
                    };
                }
                Action::ToggleQuote => {
                    self.buf.push(ch);
                    self.state = match self.state {
                        ScanState::InSingleQuote => ScanState::Normal,
                        _ => ScanState::InSingleQuote,
                    };
                }
                Action::LineComment => self.skip_line(),
                Action::Terminate => self.flush(),
                Action::Copy => self.buf.push(ch),
            }
        }
        // Unterminated tail, including an unclosed quote or dollar block.
        self.flush();
        self.out
    }
}

/// Splits a cleaned script into trimmed, non-empty statements in source order.
pub fn tokenize(script: &str) -> Vec<Statement> {
    Scanner::new(script).run()
}
