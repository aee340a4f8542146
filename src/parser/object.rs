use std::collections::VecDeque;
use std::ops::Range;

use crate::error::{PdfError, Result};
use crate::parser::lexer::{Lexer, Token};
use crate::types::{Dict, ObjRef, PdfObject};

/// Builds values from tokens, looking up to two tokens ahead for `N G R`
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Tokens lexed but not yet consumed, with their spans
    ahead: VecDeque<(Token, Range<usize>)>,
    /// End of the dictionary of the last stream parsed
    stream_dict_end: Option<usize>,
}

fn parse_error(position: usize, message: impl Into<String>) -> PdfError {
    PdfError::Parse {
        position,
        message: message.into(),
    }
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            ahead: VecDeque::new(),
            stream_dict_end: None,
        }
    }

    /// Start of the next unconsumed token, or the lexer cursor
    pub fn position(&self) -> usize {
        self.ahead
            .front()
            .map_or(self.lexer.position(), |(_, span)| span.start)
    }

    pub fn seek(&mut self, pos: usize) {
        self.lexer.seek(pos);
        self.ahead.clear();
    }

    /// Byte offset where the dictionary of the most recent stream ended
    pub fn stream_dict_end(&self) -> Option<usize> {
        self.stream_dict_end
    }

    /// Skip whitespace and comments, then test for a literal at the cursor
    pub fn at(&mut self, literal: &[u8]) -> bool {
        let pos = self.position();
        self.seek(pos);
        self.lexer.skip_whitespace();
        self.lexer.at(literal)
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.next_spanned()?.map(|(tok, _)| tok))
    }

    fn next_spanned(&mut self) -> Result<Option<(Token, Range<usize>)>> {
        match self.ahead.pop_front() {
            Some(item) => Ok(Some(item)),
            None => self.lexer.next_spanned(),
        }
    }

    /// The `n`th unconsumed token, lexing as far as needed
    fn lookahead(&mut self, n: usize) -> Result<Option<&Token>> {
        while self.ahead.len() <= n {
            match self.lexer.next_spanned()? {
                Some(item) => self.ahead.push_back(item),
                None => return Ok(None),
            }
        }
        Ok(self.ahead.get(n).map(|(tok, _)| tok))
    }

    /// Parse a single value; `None` at end of input
    pub fn parse_object(&mut self) -> Result<Option<PdfObject>> {
        let Some((token, span)) = self.next_spanned()? else {
            return Ok(None);
        };

        let value = match token {
            Token::Null => PdfObject::Null,
            Token::True => PdfObject::Bool(true),
            Token::False => PdfObject::Bool(false),
            Token::Real(f) => PdfObject::Real(f),
            Token::String(s) | Token::HexString(s) => PdfObject::String(s),
            Token::Name(n) => PdfObject::Name(n),
            Token::Int(n) => self.int_or_ref(n)?,
            Token::ArrayStart => self.parse_array(span.start)?,
            Token::DictStart => self.parse_dict_or_stream(span.start)?,
            other => {
                return Err(parse_error(
                    span.start,
                    format!("Unexpected token: {:?}", other),
                ));
            }
        };

        Ok(Some(value))
    }

    fn expect_object(&mut self, context: &str) -> Result<PdfObject> {
        let pos = self.position();
        self.parse_object()?
            .ok_or_else(|| parse_error(pos, format!("Unterminated {}", context)))
    }

    /// `42` or the start of `42 0 R`
    fn int_or_ref(&mut self, first: i64) -> Result<PdfObject> {
        let generation = match self.lookahead(0)? {
            Some(Token::Int(g)) => *g,
            _ => return Ok(PdfObject::Int(first)),
        };
        if self.lookahead(1)? != Some(&Token::Ref) {
            return Ok(PdfObject::Int(first));
        }

        match (u32::try_from(first), u16::try_from(generation)) {
            (Ok(obj_num), Ok(gen_num)) => {
                self.ahead.pop_front();
                self.ahead.pop_front();
                Ok(PdfObject::Ref(ObjRef::new(obj_num, gen_num)))
            }
            _ => Ok(PdfObject::Int(first)),
        }
    }

    fn parse_array(&mut self, start: usize) -> Result<PdfObject> {
        let mut items = Vec::new();

        loop {
            let at_end = self.lookahead(0)?.map(|tok| *tok == Token::ArrayEnd);
            match at_end {
                None => return Err(parse_error(start, "Unterminated array")),
                Some(true) => {
                    self.ahead.pop_front();
                    return Ok(PdfObject::Array(items));
                }
                Some(false) => items.push(self.expect_object("array")?),
            }
        }
    }

    fn parse_dict_or_stream(&mut self, start: usize) -> Result<PdfObject> {
        let mut dict = Dict::new();

        let dict_end = loop {
            let Some((token, span)) = self.next_spanned()? else {
                return Err(parse_error(start, "Unterminated dictionary"));
            };

            match token {
                Token::DictEnd => break span.end,
                Token::Name(key) => {
                    let value = self.expect_object("dictionary")?;
                    dict.insert(key, value);
                }
                other => {
                    return Err(parse_error(
                        span.start,
                        format!("Dictionary key must be name, got {:?}", other),
                    ));
                }
            }
        };

        if self.lookahead(0)? != Some(&Token::Stream) {
            return Ok(PdfObject::Dict(dict));
        }

        // Only the `stream` keyword is buffered here
        let Some((_, keyword)) = self.ahead.pop_front() else {
            return Ok(PdfObject::Dict(dict));
        };
        self.lexer.seek(keyword.end);
        self.stream_dict_end = Some(dict_end);

        let data = self.read_stream_data(&dict)?;
        Ok(PdfObject::Stream { dict, data })
    }

    /// Stream bytes after the `stream` keyword, through `endstream`
    fn read_stream_data(&mut self, dict: &Dict) -> Result<Vec<u8>> {
        // Exactly one EOL separates the keyword from the data
        self.lexer.skip_eol();
        let start = self.lexer.position();
        let data = self.lexer.data();

        // A direct Length is trusted only when endstream follows it
        let by_length = match dict.get("Length") {
            Some(PdfObject::Int(n)) => usize::try_from(*n)
                .ok()
                .and_then(|n| start.checked_add(n))
                .filter(|&end| end <= data.len()),
            _ => None,
        };
        if let Some(end) = by_length {
            self.lexer.seek(end);
            if matches!(self.lexer.next_token(), Ok(Some(Token::EndStream))) {
                return Ok(data[start..end].to_vec());
            }
        }

        // Otherwise search for the marker; the EOL before it is not data
        let marker = b"endstream";
        let found = data[start..]
            .windows(marker.len())
            .position(|w| w == marker)
            .map(|p| start + p)
            .ok_or_else(|| parse_error(start, "Could not find endstream"))?;

        let mut end = found;
        if end > start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && data[end - 1] == b'\r' {
            end -= 1;
        }

        self.lexer.seek(found + marker.len());
        Ok(data[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> PdfObject {
        Parser::new(input).parse_object().unwrap().unwrap()
    }

    #[test]
    fn test_parse_primitives() {
        let mut parser = Parser::new(b"null true false 42 3.14 (s) <41>");

        let mut values = Vec::new();
        while let Some(value) = parser.parse_object().unwrap() {
            values.push(value);
        }
        assert_eq!(
            values,
            vec![
                PdfObject::Null,
                PdfObject::Bool(true),
                PdfObject::Bool(false),
                PdfObject::Int(42),
                PdfObject::Real(3.14),
                PdfObject::String(b"s".to_vec()),
                PdfObject::String(b"A".to_vec()),
            ]
        );
    }

    #[test]
    fn test_reference_versus_integers() {
        assert_eq!(
            parse(b"[5 0 R 1 2 7 0 R 3]"),
            PdfObject::Array(vec![
                PdfObject::Ref(ObjRef::new(5, 0)),
                PdfObject::Int(1),
                PdfObject::Int(2),
                PdfObject::Ref(ObjRef::new(7, 0)),
                PdfObject::Int(3),
            ])
        );
    }

    #[test]
    fn test_parse_nested_dict() {
        let obj = parse(b"<< /Type /Pages /Kids [1 0 R 2 0 R] /Res << /F 3 0 R >> >>");
        let dict = obj.as_dict().unwrap();

        assert_eq!(dict.get("Type"), Some(&PdfObject::name("Pages")));
        assert_eq!(dict.get("Kids").unwrap().as_array().unwrap().len(), 2);
        let res = dict.get("Res").unwrap().as_dict().unwrap();
        assert_eq!(res.get("F"), Some(&PdfObject::reference(3)));
    }

    #[test]
    fn test_position_after_lookahead() {
        let mut parser = Parser::new(b"12 endobj");
        assert_eq!(parser.parse_object().unwrap(), Some(PdfObject::Int(12)));
        // `endobj` was looked at but not consumed
        assert_eq!(parser.position(), 3);
        assert_eq!(parser.next_token().unwrap(), Some(Token::EndObj));
        assert_eq!(parser.position(), 9);
    }

    #[test]
    fn test_unterminated_dict() {
        let mut parser = Parser::new(b"<< /Type /Page");
        assert!(parser.parse_object().is_err());
    }

    #[test]
    fn test_non_name_key() {
        let mut parser = Parser::new(b"<< 1 2 >>");
        assert!(parser.parse_object().is_err());
    }

    #[test]
    fn test_stream_with_direct_length() {
        let mut parser = Parser::new(b"<< /Length 4 >>\nstream\n\x00 ab\nendstream");
        let obj = parser.parse_object().unwrap().unwrap();

        let (dict, data) = obj.as_stream().unwrap();
        assert_eq!(dict.get("Length"), Some(&PdfObject::Int(4)));
        assert_eq!(data, b"\x00 ab");
        assert_eq!(parser.stream_dict_end(), Some(15));
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let obj = parse(b"<< /Length 9 0 R >>\r\nstream\r\n  q Q\r\nendstream");
        assert_eq!(obj.as_stream().unwrap().1, b"  q Q");
    }

    #[test]
    fn test_stream_with_wrong_length() {
        let obj = parse(b"<< /Length 99 >>\nstream\nBT ET\nendstream");
        assert_eq!(obj.as_stream().unwrap().1, b"BT ET");
    }

    #[test]
    fn test_unterminated_stream() {
        let mut parser = Parser::new(b"<< /Length 1 0 R >>\nstream\nBT");
        assert!(parser.parse_object().is_err());
    }
}
