//! Protocol messages

use std::fmt;

use crate::word::{Request, Response, Word};
use crate::{Error, Result};

/// A single protocol line: one word followed by zero or more arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    word: Word,
    args: Vec<String>,
}

impl Message {
    pub fn new(word: impl Into<Word>) -> Self {
        Self {
            word: word.into(),
            args: Vec::new(),
        }
    }

    /// Shorthand for a request message
    pub fn request(rq: Request) -> Self {
        Self::new(rq)
    }

    /// Shorthand for a response message
    pub fn response(rs: Response) -> Self {
        Self::new(rs)
    }

    /// Build a message from a tokenised line
    pub fn from_words(words: Vec<String>) -> Result<Self> {
        let mut words = words.into_iter();
        let word = words.next().ok_or(Error::EmptyMessage)?;
        Ok(Self {
            word: Word::parse(&word),
            args: words.collect(),
        })
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn word(&self) -> &Word {
        &self.word
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// True for `WHAT` and `FAIL` responses
    pub fn is_failure(&self) -> bool {
        self.word.is_failure()
    }

    /// Fail unless the message carries exactly `expected` arguments
    pub fn expect_args(&self, expected: usize) -> Result<&[String]> {
        if self.args.len() != expected {
            return Err(Error::ArgumentCount {
                word: self.word.to_string(),
                expected,
                actual: self.args.len(),
            });
        }
        Ok(&self.args)
    }

    /// The word followed by all arguments
    pub fn to_words(&self) -> Vec<String> {
        std::iter::once(self.word.to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}
