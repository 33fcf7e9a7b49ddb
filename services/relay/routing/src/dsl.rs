//! Route definition language.
//!
//! ```text
//! route     := ["route" "add"] channel arrow channel modifier*
//! arrow     := "to" | "->" | "<->"
//! modifier  := name [ "(" [arg ("," arg)*] ")" ]
//! arg       := key "=" value
//! value     := int | "true" | "false" | quoted | bare
//! ```
//!
//! Quoted strings support `\"`, `\\`, `\n` and `\t` escapes. Anything else
//! without whitespace, `,`, `(`, `)` or `=` is a bare string.

use crate::error::DslError;
use crate::modifier::{ArgValue, RouteModifier};
use crate::route::Route;

/// Parse a full route definition
pub fn parse_route(input: &str) -> Result<Route, DslError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if parser.peek_word().eq_ignore_ascii_case("route") {
        parser.word();
        parser.skip_ws();
        let verb = parser.word();
        if !verb.eq_ignore_ascii_case("add") {
            return Err(parser.unexpected("'add'", &verb));
        }
    }

    let source = parser.channel("source channel")?;
    let two_way = parser.arrow()?;
    let destination = parser.channel("destination channel")?;

    let mut modifiers = Vec::new();
    loop {
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        modifiers.push(parser.modifier()?);
    }

    Ok(Route {
        id: 0,
        source,
        destination,
        two_way,
        modifiers,
    })
}

/// Parse a single argument value literal
pub fn parse_value(input: &str) -> Result<ArgValue, DslError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.unexpected("end of value", &parser.rest()));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

fn is_bare_char(c: char) -> bool {
    !(c.is_whitespace() || matches!(c, ',' | '(' | ')' | '=' | '"'))
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> String {
        self.input[self.pos..].chars().take(16).collect()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn peek_word(&self) -> &'a str {
        let rest = &self.input[self.pos..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        &rest[..end]
    }

    fn word(&mut self) -> String {
        self.take_while(|c| !c.is_whitespace()).to_string()
    }

    fn unexpected(&self, expected: &str, found: &str) -> DslError {
        DslError::Unexpected {
            pos: self.pos,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    fn expect_char(&mut self, wanted: char, what: &str) -> Result<(), DslError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.unexpected(what, &c.to_string())),
            None => Err(DslError::UnexpectedEnd(what.to_string())),
        }
    }

    /// A channel token: no whitespace outside parentheses
    fn channel(&mut self, what: &str) -> Result<String, DslError> {
        self.skip_ws();
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if c.is_whitespace() && depth == 0 => break,
                _ => {}
            }
            self.bump();
        }
        if depth != 0 {
            return Err(DslError::UnexpectedEnd(format!("')' closing {}", what)));
        }
        let token = &self.input[start..self.pos];
        if token.is_empty() {
            return match self.peek() {
                None => Err(DslError::UnexpectedEnd(what.to_string())),
                Some(c) => Err(self.unexpected(what, &c.to_string())),
            };
        }
        Ok(token.to_string())
    }

    /// Returns whether the route is two-way
    fn arrow(&mut self) -> Result<bool, DslError> {
        self.skip_ws();
        let at = self.pos;
        let word = self.word();
        match word.to_ascii_lowercase().as_str() {
            "to" | "->" => Ok(false),
            "<->" => Ok(true),
            "" => Err(DslError::UnexpectedEnd("'to', '->' or '<->'".to_string())),
            _ => Err(DslError::Unexpected {
                pos: at,
                expected: "'to', '->' or '<->'".to_string(),
                found: word,
            }),
        }
    }

    fn name(&mut self, what: &str) -> Result<String, DslError> {
        let name = self.take_while(is_name_char);
        if name.is_empty() {
            return match self.peek() {
                None => Err(DslError::UnexpectedEnd(what.to_string())),
                Some(c) => Err(self.unexpected(what, &c.to_string())),
            };
        }
        Ok(name.to_string())
    }

    fn modifier(&mut self) -> Result<RouteModifier, DslError> {
        let name = self.name("modifier name")?;
        let mut modifier = RouteModifier::new(&name);
        if self.peek() != Some('(') {
            return Ok(modifier);
        }
        self.bump();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(modifier);
        }
        loop {
            self.skip_ws();
            let key = self.name("argument name")?;
            self.skip_ws();
            self.expect_char('=', "'='")?;
            self.skip_ws();
            let value = self.value()?;
            modifier.args.push((key, value));
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.unexpected("',' or ')'", &c.to_string()));
                }
                None => return Err(DslError::UnexpectedEnd("',' or ')'".to_string())),
            }
        }
        Ok(modifier)
    }

    fn value(&mut self) -> Result<ArgValue, DslError> {
        match self.peek() {
            None => Err(DslError::UnexpectedEnd("value".to_string())),
            Some('"') => self.quoted().map(ArgValue::Str),
            Some(c) if is_bare_char(c) => {
                let token = self.take_while(is_bare_char);
                classify(token)
            }
            Some(c) => Err(self.unexpected("value", &c.to_string())),
        }
    }

    fn quoted(&mut self) -> Result<String, DslError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(DslError::UnterminatedString(start)),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(DslError::UnterminatedString(start)),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

fn classify(token: &str) -> Result<ArgValue, DslError> {
    match token {
        "true" => return Ok(ArgValue::Bool(true)),
        "false" => return Ok(ArgValue::Bool(false)),
        _ => {}
    }
    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return token
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| DslError::InvalidNumber(token.to_string()));
    }
    Ok(ArgValue::Str(token.to_string()))
}
