//! Structure repair — rewrites near-valid model JSON into strictly valid JSON.
//!
//! Handles the mistakes models actually make: trailing or doubled commas,
//! missing commas and colons, bare keys, single-quoted strings, raw control
//! characters inside strings, `//` and `/* */` comments, Python-style
//! literals, and output cut off mid-value. Valid input is returned untouched;
//! anything else is re-emitted as compact JSON by a single forward scan.

use std::fmt::Write as _;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("unrepairable structure: {0}")]
    UnrepairableStructure(String),
}

/// Returns text that `serde_json` parses, or `UnrepairableStructure`.
pub fn repair(text: &str) -> Result<String, RepairError> {
    if serde_json::from_str::<Value>(text).is_ok() {
        return Ok(text.to_string());
    }

    let repaired = Scanner::new(text).run()?;

    match serde_json::from_str::<Value>(&repaired) {
        Ok(_) => {
            debug!(
                "Repaired malformed JSON ({} bytes in, {} bytes out)",
                text.len(),
                repaired.len()
            );
            Ok(repaired)
        }
        Err(e) => Err(RepairError::UnrepairableStructure(e.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Object,
    Array,
}

/// What the enclosing container expects to see next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Object: a key (or the closer). Never used for arrays.
    Key,
    /// Object: a key has been written, the colon has not.
    Colon,
    /// A value (after a colon, after `[`, or after an array comma).
    Value,
    /// A complete member has been written; a comma or the closer is due.
    Next,
}

#[derive(Debug)]
struct Frame {
    kind: Kind,
    slot: Slot,
    members: usize,
    /// Output length before the latest key (and its comma) were written.
    /// Truncating to it drops a key that never received a value.
    rollback: usize,
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    out: String,
    stack: Vec<Frame>,
    root_closed: bool,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            out: String::with_capacity(text.len()),
            stack: Vec::new(),
            root_closed: false,
        }
    }

    fn run(mut self) -> Result<String, RepairError> {
        while let Some(c) = self.peek() {
            if self.root_closed {
                break;
            }
            if self.stack.is_empty() {
                // Prose before the root container is dropped.
                if c == '{' || c == '[' {
                    self.open(c)?;
                } else {
                    self.pos += 1;
                }
                continue;
            }
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if matches!(self.peek_at(1), Some('/') | Some('*')) => self.skip_comment(),
                '{' | '[' => self.open(c)?,
                '}' | ']' => self.close(c),
                ',' => self.comma(),
                ':' => self.colon(),
                '"' | '\'' => {
                    let content = self.read_string(c);
                    self.place_string(&content)?;
                }
                _ => self.bare()?,
            }
        }

        if self.out.is_empty() {
            return Err(RepairError::UnrepairableStructure(
                "no JSON object or array found".to_string(),
            ));
        }

        // Truncated output: close everything that is still open.
        while !self.stack.is_empty() {
            self.close_top(true);
        }

        Ok(self.out)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn in_key_position(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame {
                kind: Kind::Object,
                slot: Slot::Key | Slot::Next,
                ..
            })
        )
    }

    fn open(&mut self, c: char) -> Result<(), RepairError> {
        if !self.stack.is_empty() {
            self.begin_value()?;
        }
        let kind = if c == '{' { Kind::Object } else { Kind::Array };
        self.out.push(c);
        self.stack.push(Frame {
            kind,
            slot: if kind == Kind::Object { Slot::Key } else { Slot::Value },
            members: 0,
            rollback: self.out.len(),
        });
        self.pos += 1;
        Ok(())
    }

    fn close(&mut self, c: char) {
        self.pos += 1;
        let kind = if c == '}' { Kind::Object } else { Kind::Array };

        if !self.stack.iter().any(|f| f.kind == kind) {
            debug!("Skipping stray '{c}' at offset {}", self.pos - 1);
            return;
        }

        // Mismatched closer: auto-close inner containers until the match.
        while let Some(top) = self.stack.last() {
            let matched = top.kind == kind;
            self.close_top(false);
            if matched {
                break;
            }
        }
    }

    fn close_top(&mut self, truncated: bool) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if frame.kind == Kind::Object {
            match (frame.slot, truncated) {
                (Slot::Colon | Slot::Value, true) => self.out.truncate(frame.rollback),
                (Slot::Colon, false) => self.out.push_str(":null"),
                (Slot::Value, false) => self.out.push_str("null"),
                _ => {}
            }
        }
        self.out.push(match frame.kind {
            Kind::Object => '}',
            Kind::Array => ']',
        });
        if self.stack.is_empty() {
            self.root_closed = true;
        }
    }

    fn comma(&mut self) {
        self.pos += 1;
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        match (frame.kind, frame.slot) {
            (Kind::Object, Slot::Next) => frame.slot = Slot::Key,
            (Kind::Object, Slot::Colon) => {
                self.out.push_str(":null");
                frame.members += 1;
                frame.slot = Slot::Key;
            }
            (Kind::Object, Slot::Value) => {
                self.out.push_str("null");
                frame.members += 1;
                frame.slot = Slot::Key;
            }
            (Kind::Array, Slot::Next) => frame.slot = Slot::Value,
            // Leading or doubled comma.
            _ => {}
        }
    }

    fn colon(&mut self) {
        self.pos += 1;
        if let Some(frame) = self.stack.last_mut() {
            if frame.kind == Kind::Object && frame.slot == Slot::Colon {
                self.out.push(':');
                frame.slot = Slot::Value;
            }
        }
    }

    /// Writes whatever separator the top frame needs before a value.
    fn begin_value(&mut self) -> Result<(), RepairError> {
        let Some(frame) = self.stack.last_mut() else {
            return Ok(());
        };
        match (frame.kind, frame.slot) {
            (Kind::Object, Slot::Key | Slot::Next) => {
                return Err(RepairError::UnrepairableStructure(format!(
                    "value where an object key was expected at offset {}",
                    self.pos
                )));
            }
            (Kind::Object, Slot::Colon) => self.out.push(':'),
            (Kind::Object, Slot::Value) => {}
            (Kind::Array, _) => {
                if frame.members > 0 {
                    self.out.push(',');
                }
            }
        }
        frame.slot = Slot::Next;
        frame.members += 1;
        Ok(())
    }

    fn begin_key(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.rollback = self.out.len();
            if frame.members > 0 {
                self.out.push(',');
            }
            frame.slot = Slot::Colon;
        }
    }

    /// `content` is already escaped for a double-quoted JSON string.
    fn place_string(&mut self, content: &str) -> Result<(), RepairError> {
        if self.in_key_position() {
            self.begin_key();
        } else {
            self.begin_value()?;
        }
        self.out.push('"');
        self.out.push_str(content);
        self.out.push('"');
        Ok(())
    }

    /// Reads a quoted string starting at the opening quote `q` and returns its
    /// body escaped for a double-quoted JSON string. An unterminated string
    /// runs to the end of input.
    fn read_string(&mut self, q: char) -> String {
        self.pos += 1;
        let mut body = String::new();

        while let Some(c) = self.peek() {
            match c {
                '\\' => match self.peek_at(1) {
                    None => {
                        self.pos += 1;
                    }
                    Some('\'') => {
                        body.push('\'');
                        self.pos += 2;
                    }
                    Some(e @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                        body.push('\\');
                        body.push(e);
                        self.pos += 2;
                    }
                    Some('u') if self.has_hex4(2) => {
                        body.push_str("\\u");
                        self.pos += 2;
                    }
                    Some(_) => {
                        // Invalid escape: keep the backslash as a literal.
                        body.push_str("\\\\");
                        self.pos += 1;
                    }
                },
                c if c == q => {
                    self.pos += 1;
                    if self.quote_closes_string() {
                        return body;
                    }
                    // Unescaped quote inside the string.
                    if q == '"' {
                        body.push_str("\\\"");
                    } else {
                        body.push('\'');
                    }
                }
                '"' => {
                    body.push_str("\\\"");
                    self.pos += 1;
                }
                c => {
                    push_escaped_char(&mut body, c);
                    self.pos += 1;
                }
            }
        }

        debug!("Closing string left open by truncated output");
        body
    }

    /// Called with `pos` just past a quote. The quote closes the string when
    /// what follows is structural, a line break, the end of input, or a quoted
    /// key (a member whose comma went missing). A comma only counts when the
    /// text after it starts another member or element.
    fn quote_closes_string(&self) -> bool {
        let i = self.skip_inline_space(self.pos);
        match self.chars.get(i) {
            None | Some('\n' | '\r' | ':' | '}' | ']') => true,
            Some(',') => self.member_follows(i + 1),
            Some('"' | '\'') => self.quoted_key_at(i),
            Some(_) => false,
        }
    }

    fn skip_inline_space(&self, mut i: usize) -> usize {
        while matches!(self.chars.get(i), Some(' ' | '\t')) {
            i += 1;
        }
        i
    }

    /// True when the text at `i` opens a new member or element rather than
    /// continuing prose after a comma.
    fn member_follows(&self, i: usize) -> bool {
        let i = self.skip_inline_space(i);
        match self.chars.get(i) {
            None | Some('\n' | '\r' | '"' | '\'' | '{' | '[' | '}' | ']' | ',') => true,
            Some('/') => matches!(self.chars.get(i + 1), Some('/' | '*')),
            Some(_) => {
                let end = (i..self.chars.len())
                    .find(|&j| matches!(self.chars[j], ',' | ':' | '}' | ']' | '"' | '\n' | '\r'))
                    .unwrap_or(self.chars.len());
                if self.chars.get(end) == Some(&':') {
                    // Bare key.
                    return true;
                }
                let token: String = self.chars[i..end].iter().collect();
                literal(token.trim()).is_some()
            }
        }
    }

    /// True when a quoted string starts at `i` and is followed by a colon on
    /// the same line.
    fn quoted_key_at(&self, i: usize) -> bool {
        let q = self.chars[i];
        let Some(len) = self.chars[i + 1..]
            .iter()
            .position(|&c| c == q || c == '\n')
        else {
            return false;
        };
        let close = i + 1 + len;
        if self.chars[close] != q {
            return false;
        }
        let after = self.skip_inline_space(close + 1);
        self.chars.get(after) == Some(&':')
    }

    fn has_hex4(&self, offset: usize) -> bool {
        (0..4).all(|i| {
            self.peek_at(offset + i)
                .is_some_and(|c| c.is_ascii_hexdigit())
        })
    }

    /// An unquoted token: a bare key, a literal, a number, or unquoted text.
    fn bare(&mut self) -> Result<(), RepairError> {
        let key_position = self.in_key_position();
        let start = self.pos;

        while let Some(c) = self.peek() {
            let structural = matches!(c, ',' | '{' | '}' | '[' | ']' | '"' | '\n' | '\r')
                || (c == ':' && key_position);
            let comment = c == '/'
                && matches!(self.peek_at(1), Some('/') | Some('*'))
                && (self.pos == start || self.chars[self.pos - 1].is_whitespace());
            if structural || comment {
                break;
            }
            self.pos += 1;
        }

        let token: String = self.chars[start..self.pos].iter().collect();
        let token = token.trim();
        if token.is_empty() {
            return Ok(());
        }

        if key_position {
            self.begin_key();
            self.out.push('"');
            for c in token.chars() {
                push_escaped_char(&mut self.out, c);
            }
            self.out.push('"');
            return Ok(());
        }

        self.begin_value()?;
        match literal(token) {
            Some(json) => self.out.push_str(json),
            None => {
                self.out.push('"');
                for c in token.chars() {
                    push_escaped_char(&mut self.out, c);
                }
                self.out.push('"');
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        let block = self.peek_at(1) == Some('*');
        self.pos += 2;
        while let Some(c) = self.peek() {
            if block && c == '*' && self.peek_at(1) == Some('/') {
                self.pos += 2;
                return;
            }
            if !block && c == '\n' {
                return;
            }
            self.pos += 1;
        }
    }
}

/// JSON text for a bare literal or number, including Python and JS spellings.
fn literal(token: &str) -> Option<&str> {
    match token {
        "true" | "True" | "TRUE" => Some("true"),
        "false" | "False" | "FALSE" => Some("false"),
        "null" | "None" | "NULL" | "undefined" | "NaN" => Some("null"),
        t if serde_json::from_str::<serde_json::Number>(t).is_ok() => Some(t),
        _ => None,
    }
}

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => {
            let _ = write!(out, "\\u{:04x}", c as u32);
        }
        c => out.push(c),
    }
}
