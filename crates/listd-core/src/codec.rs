//! Line codec
//!
//! The wire format is one message per `\n`-terminated line, words separated by
//! whitespace. Words may be quoted:
//!
//! - `'...'` quotes literally, nothing is special until the closing quote
//! - `"..."` quotes with backslash escapes
//! - outside quotes, `\` escapes the following byte
//!
//! Quotes can appear mid-word, so `a'b c'd` is the single word `ab cd`.
//! [`pack`] always emits single-quoted words where quoting is needed, which
//! every tokeniser understands.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Message, Result, DEFAULT_MAX_LINE_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Incremental tokeniser
///
/// Feed it arbitrary chunks of a byte stream; it returns every line completed
/// by that chunk and keeps partial state (including open quotes) for the next.
#[derive(Debug)]
pub struct Tokeniser {
    quote: Quote,
    escaping: bool,
    in_word: bool,
    word: Vec<u8>,
    words: Vec<String>,
    line_len: usize,
    max_line_length: usize,
}

impl Tokeniser {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            quote: Quote::None,
            escaping: false,
            in_word: false,
            word: Vec::new(),
            words: Vec::new(),
            line_len: 0,
            max_line_length,
        }
    }

    /// Tokenise a chunk, returning the completed lines as word lists
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Vec<String>>> {
        let mut lines = Vec::new();

        for &byte in data {
            self.line_len += 1;
            if self.line_len > self.max_line_length {
                let len = self.line_len;
                self.reset();
                return Err(Error::LineTooLong {
                    len,
                    max: self.max_line_length,
                });
            }

            if self.escaping {
                self.escaping = false;
                self.push(byte);
                continue;
            }

            match self.quote {
                Quote::Single => match byte {
                    b'\'' => self.quote = Quote::None,
                    _ => self.push(byte),
                },
                Quote::Double => match byte {
                    b'"' => self.quote = Quote::None,
                    b'\\' => self.escaping = true,
                    _ => self.push(byte),
                },
                Quote::None => match byte {
                    b'\'' => {
                        self.quote = Quote::Single;
                        self.in_word = true;
                    }
                    b'"' => {
                        self.quote = Quote::Double;
                        self.in_word = true;
                    }
                    b'\\' => {
                        self.escaping = true;
                        self.in_word = true;
                    }
                    b'\n' => {
                        self.end_word()?;
                        self.line_len = 0;
                        if !self.words.is_empty() {
                            lines.push(std::mem::take(&mut self.words));
                        }
                    }
                    b if b.is_ascii_whitespace() => self.end_word()?,
                    _ => self.push(byte),
                },
            }
        }

        Ok(lines)
    }

    /// Discard any partially read line
    pub fn reset(&mut self) {
        self.quote = Quote::None;
        self.escaping = false;
        self.in_word = false;
        self.word.clear();
        self.words.clear();
        self.line_len = 0;
    }

    fn push(&mut self, byte: u8) {
        self.in_word = true;
        self.word.push(byte);
    }

    fn end_word(&mut self) -> Result<()> {
        if !self.in_word {
            return Ok(());
        }
        self.in_word = false;
        let bytes = std::mem::take(&mut self.word);
        match String::from_utf8(bytes) {
            Ok(word) => {
                self.words.push(word);
                Ok(())
            }
            Err(_) => {
                self.reset();
                Err(Error::InvalidUtf8)
            }
        }
    }
}

impl Default for Tokeniser {
    fn default() -> Self {
        Self::new()
    }
}

fn needs_quoting(word: &str) -> bool {
    word.is_empty()
        || word
            .bytes()
            .any(|b| b.is_ascii_whitespace() || matches!(b, b'\'' | b'"' | b'\\'))
}

fn put_word(buf: &mut BytesMut, word: &str) {
    if !needs_quoting(word) {
        buf.put_slice(word.as_bytes());
        return;
    }
    buf.put_u8(b'\'');
    for (i, piece) in word.split('\'').enumerate() {
        if i > 0 {
            buf.put_slice(b"'\\''");
        }
        buf.put_slice(piece.as_bytes());
    }
    buf.put_u8(b'\'');
}

/// Pack a message into a single newline-terminated line
pub fn pack(message: &Message) -> Bytes {
    let capacity = message
        .args()
        .iter()
        .map(|a| a.len() + 3)
        .sum::<usize>()
        + message.word().as_str().len()
        + 1;
    let mut buf = BytesMut::with_capacity(capacity);

    put_word(&mut buf, message.word().as_str());
    for arg in message.args() {
        buf.put_u8(b' ');
        put_word(&mut buf, arg);
    }
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Tokenise a buffer that is expected to hold whole lines only
pub fn decode_lines(data: &[u8]) -> Result<Vec<Message>> {
    let mut tokeniser = Tokeniser::new();
    tokeniser
        .feed(data)?
        .into_iter()
        .map(Message::from_words)
        .collect()
}
