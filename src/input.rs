//! Line-oriented producer input.
//!
//! Every record becomes one message:
//!
//! - without a key delimiter the whole record is the value
//! - with a key delimiter the key is the text before its first occurrence
//!   and the value the text after it
//! - a line ending in `\` continues on the next line; the backslash is
//!   dropped and the lines are joined with `\n`
//! - empty records are skipped
//!
//! Malformed records are reported as [`SyntaxError`]s with 1-based line and
//! column (in characters).

use anyhow::Context;
use kfktools_client::Message;
use kfktools_syntax::SyntaxError;
use std::io::{BufRead, Lines};

/// Iterator of messages read from `R`.
pub struct MessageReader<R> {
    lines: Lines<R>,
    topic: String,
    key_delimiter: Option<char>,
    line_no: u64,
}

impl<R: BufRead> MessageReader<R> {
    pub fn new(reader: R, topic: impl Into<String>, key_delimiter: Option<char>) -> Self {
        Self {
            lines: reader.lines(),
            topic: topic.into(),
            key_delimiter,
            line_no: 0,
        }
    }

    /// Read one logical record. Returns the line it starts on, or `None` at
    /// the end of input.
    fn read_record(&mut self, record: &mut String) -> anyhow::Result<Option<u64>> {
        let mut start = None;
        loop {
            let Some(line) = self.lines.next() else {
                return match start {
                    Some(_) => Err(SyntaxError::at_eof("unterminated line continuation").into()),
                    None => Ok(None),
                };
            };
            let line =
                line.with_context(|| format!("Failed to read input line {}", self.line_no + 1))?;
            self.line_no += 1;

            if start.is_some() {
                record.push('\n');
            } else {
                start = Some(self.line_no);
            }
            match line.strip_suffix('\\') {
                Some(head) => record.push_str(head),
                None => {
                    record.push_str(&line);
                    return Ok(start);
                }
            }
        }
    }

    fn parse(&self, start: u64, record: &str) -> Result<Message, SyntaxError> {
        let Some(delimiter) = self.key_delimiter else {
            return Ok(Message::new(self.topic.as_str(), record));
        };

        match record.find(delimiter) {
            None => {
                // Point just past the end of the record's last line
                let last = record.rsplit('\n').next().unwrap_or(record);
                Err(SyntaxError::new(
                    format!("missing key delimiter '{delimiter}'"),
                    self.line_no,
                    last.chars().count() as u64 + 1,
                ))
            }
            Some(0) => Err(SyntaxError::new("empty message key", start, 1)),
            Some(index) => Ok(Message::keyed(
                self.topic.as_str(),
                &record[..index],
                &record[index + delimiter.len_utf8()..],
            )),
        }
    }
}

impl<R: BufRead> Iterator for MessageReader<R> {
    type Item = anyhow::Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = String::new();
        loop {
            record.clear();
            let start = match self.read_record(&mut record) {
                Ok(Some(start)) => start,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            if record.is_empty() {
                continue;
            }
            return Some(self.parse(start, &record).map_err(Into::into));
        }
    }
}
