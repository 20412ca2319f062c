//! Safe evaluation of literal argument blocks.
//!
//! Accepts the data-only subset generators emit after `Tool Arguments:`:
//! dicts, lists, tuples, quoted strings, integers, floats and the constants
//! `True`/`False`/`None` (JSON spellings are accepted too). Nothing is ever
//! executed, and any input outside the subset is an error. There is no
//! partial recovery.

use serde_json::{Number, Value};

use crate::error::ParseError;
use crate::types::ArgumentMap;

/// Deepest container nesting accepted.
pub const MAX_DEPTH: usize = 64;

/// Evaluate `input` as a literal mapping.
pub fn parse_mapping(input: &str) -> Result<ArgumentMap, ParseError> {
    let mut parser = LiteralParser::new(input);
    let value = parser.value()?;
    parser.skip_ws();
    if let Some(offset) = parser.peek_offset() {
        return Err(ParseError::Literal {
            offset,
            reason: "trailing characters after literal".into(),
        });
    }
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::Literal {
            offset: 0,
            reason: "expected a mapping".into(),
        }),
    }
}

struct LiteralParser {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
    depth: usize,
}

impl LiteralParser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.char_indices().collect(),
            pos: 0,
            len: src.len(),
            depth: 0,
        }
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|(i, _)| *i).unwrap_or(self.len)
    }

    fn peek_offset(&self) -> Option<usize> {
        self.chars.get(self.pos).map(|(i, _)| *i)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn error<T>(&self, reason: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError::Literal {
            offset: self.offset(),
            reason: reason.into(),
        })
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => self.error(format!("expected '{}', found '{}'", want, c)),
            None => self.error(format!("expected '{}', found end of input", want)),
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.nested(|p| p.mapping()),
            Some('[') => self.nested(|p| p.sequence('[', ']')),
            Some('(') => self.nested(|p| p.sequence('(', ')')),
            Some('\'') | Some('"') => Ok(Value::String(self.string()?)),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.constant(),
            Some(c) => self.error(format!("unexpected character '{}'", c)),
            None => self.error("unexpected end of input"),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, ParseError>,
    ) -> Result<Value, ParseError> {
        if self.depth >= MAX_DEPTH {
            return self.error("nesting too deep");
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn mapping(&mut self) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = ArgumentMap::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return self.error("mapping keys must be strings or numbers"),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return self.error(format!("expected ',' or '}}', found '{}'", c)),
                None => return self.error("unterminated mapping"),
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Value, ParseError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => {
                    return self.error(format!("expected ',' or '{}', found '{}'", close, c))
                }
                None => return self.error("unterminated sequence"),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        // Adjacent literals concatenate: 'a' 'b' == 'ab'.
        loop {
            let Some(quote) = self.bump() else {
                return self.error("expected string");
            };
            loop {
                match self.bump() {
                    None => return self.error("unterminated string"),
                    Some('\n') => return self.error("newline in string literal"),
                    Some(c) if c == quote => break,
                    Some('\\') => out.push(self.escape()?),
                    Some(c) => out.push(c),
                }
            }
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => continue,
                _ => {
                    self.pos = save;
                    return Ok(out);
                }
            }
        }
    }

    fn escape(&mut self) -> Result<char, ParseError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('u') => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = self
                        .bump()
                        .and_then(|c| c.to_digit(16))
                        .ok_or(ParseError::Literal {
                            offset: self.offset(),
                            reason: "invalid \\u escape".into(),
                        })?;
                    code = code * 16 + digit;
                }
                char::from_u32(code).map_or_else(|| self.error("invalid code point"), Ok)
            }
            Some(c) => self.error(format!("unsupported escape '\\{}'", c)),
            None => self.error("unterminated escape"),
        }
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_') {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        let cleaned = text.replace('_', "");
        if let Ok(int) = cleaned.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        let is_float_syntax = cleaned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
        if is_float_syntax {
            if let Some(n) = cleaned.parse::<f64>().ok().and_then(Number::from_f64) {
                return Ok(Value::Number(n));
            }
        }
        self.pos = start;
        self.error(format!("invalid number '{}'", text))
    }

    fn constant(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => {
                self.pos = start;
                self.error(format!("'{}' is not a literal", word))
            }
        }
    }
}
