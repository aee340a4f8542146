use std::ops::Range;

use crate::error::{PdfError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Null,
    True,
    False,
    Int(i64),
    Real(f64),

    /// `( ... )` with escapes resolved
    String(Vec<u8>),
    /// `< ... >` decoded to bytes
    HexString(Vec<u8>),
    /// Without the leading '/', `#xx` escapes resolved
    Name(String),

    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,

    Obj,
    EndObj,
    Stream,
    EndStream,
    /// The `R` closing an `N G R` reference
    Ref,

    XRef,
    Trailer,
    StartXRef,
}

/// PDF whitespace, NUL and form feed included
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C | 0x00)
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn parse_error(position: usize, message: impl Into<String>) -> PdfError {
    PdfError::Parse {
        position,
        message: message.into(),
    }
}

/// Byte-level tokenizer over a borrowed buffer
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// True if the remaining input starts with `literal`
    pub fn at(&self, literal: &[u8]) -> bool {
        self.rest().starts_with(literal)
    }

    /// Consume the single end-of-line marker that follows `stream`
    pub fn skip_eol(&mut self) {
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(b) if is_whitespace(b) => self.pos += 1,
                Some(b'%') => {
                    let line = self.rest();
                    self.pos += line
                        .iter()
                        .position(|&b| b == b'\n' || b == b'\r')
                        .map_or(line.len(), |p| p + 1);
                }
                _ => return,
            }
        }
    }

    /// Next token together with the byte range it was read from
    pub fn next_spanned(&mut self) -> Result<Option<(Token, Range<usize>)>> {
        self.skip_whitespace();
        let start = self.pos;
        Ok(self.next_token()?.map(|tok| (tok, start..self.pos)))
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let token = match b {
            b'[' => self.punct(1, Token::ArrayStart),
            b']' => self.punct(1, Token::ArrayEnd),
            b'<' if self.at(b"<<") => self.punct(2, Token::DictStart),
            b'>' if self.at(b">>") => self.punct(2, Token::DictEnd),
            b'<' => Token::HexString(self.read_hex_string()?),
            b'(' => Token::String(self.read_literal_string()?),
            b'/' => Token::Name(self.read_name()),
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number()?,
            b'a'..=b'z' | b'A'..=b'Z' => self.read_keyword()?,
            _ => return Err(parse_error(self.pos, format!("Unexpected byte: 0x{:02X}", b))),
        };

        Ok(Some(token))
    }

    fn rest(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Result<u8> {
        let b = self
            .peek()
            .ok_or_else(|| parse_error(self.pos, "Unexpected end of file"))?;
        self.pos += 1;
        Ok(b)
    }

    fn punct(&mut self, len: usize, token: Token) -> Token {
        self.pos += len;
        token
    }

    /// Bytes from the cursor while `pred` holds
    fn take_while(&mut self, mut pred: impl FnMut(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&mut pred) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }

        let mut seen_dot = false;
        self.take_while(|b| {
            let dot = b == b'.' && !seen_dot;
            seen_dot |= dot;
            b.is_ascii_digit() || dot
        });

        // Only ASCII sign, digits and dot were consumed
        let text = String::from_utf8_lossy(&self.data[start..self.pos]);
        let invalid = || parse_error(start, format!("Invalid number: {:?}", text));

        if text.contains('.') {
            text.parse().map(Token::Real).map_err(|_| invalid())
        } else {
            text.parse().map(Token::Int).map_err(|_| invalid())
        }
    }

    fn read_keyword(&mut self) -> Result<Token> {
        let start = self.pos;
        let word = self.take_while(|b| b.is_ascii_alphabetic());

        Ok(match word {
            b"null" => Token::Null,
            b"true" => Token::True,
            b"false" => Token::False,
            b"obj" => Token::Obj,
            b"endobj" => Token::EndObj,
            b"stream" => Token::Stream,
            b"endstream" => Token::EndStream,
            b"R" => Token::Ref,
            b"xref" => Token::XRef,
            b"trailer" => Token::Trailer,
            b"startxref" => Token::StartXRef,
            _ => {
                return Err(parse_error(
                    start,
                    format!("Unknown keyword: {}", String::from_utf8_lossy(word)),
                ));
            }
        })
    }

    /// `( ... )` with balanced parentheses and backslash escapes
    fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1usize;

        loop {
            match self.bump()? {
                b'(' => {
                    depth += 1;
                    out.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b')');
                }
                b'\\' => self.read_escape(&mut out)?,
                b => out.push(b),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let b = self.bump()?;
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'0'..=b'7' => {
                // Up to three octal digits, high bits dropped
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') => {
                            self.pos += 1;
                            value = value * 8 + u32::from(d - b'0');
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
            }
            // Escaped line break: continuation, nothing emitted
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            // \( \) \\ and unknown escapes stand for themselves
            other => out.push(other),
        }
        Ok(())
    }

    /// `< ... >`; whitespace ignored, an odd final digit padded with 0
    fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let b = self.bump()?;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let nibble = hex_digit(b)
                .ok_or_else(|| parse_error(self.pos - 1, format!("Invalid hex char: 0x{:02X}", b)))?;
            match high.take() {
                Some(h) => out.push(h << 4 | nibble),
                None => high = Some(nibble),
            }
        }

        if let Some(h) = high {
            out.push(h << 4);
        }
        Ok(out)
    }

    /// Names are decoded byte-per-char so they survive a parse/serialize
    /// cycle unchanged, whatever their encoding.
    fn read_name(&mut self) -> String {
        self.pos += 1;
        let raw = self.take_while(|b| !is_whitespace(b) && !is_delimiter(b));

        let mut name = String::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            let escaped = (raw[i] == b'#')
                .then(|| Some(hex_digit(*raw.get(i + 1)?)? << 4 | hex_digit(*raw.get(i + 2)?)?))
                .flatten();
            match escaped {
                Some(b) => {
                    name.push(char::from(b));
                    i += 3;
                }
                // A '#' without two hex digits is kept as-is
                None => {
                    name.push(char::from(raw[i]));
                    i += 1;
                }
            }
        }
        name
    }
}
