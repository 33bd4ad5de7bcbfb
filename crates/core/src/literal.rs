//! Strict literal evaluation of raw configuration strings.
//!
//! Accepted forms: integers (decimal, `0x`, `0o`, `0b`, `_` separators),
//! floats, quoted strings (single, double, triple, `r` prefix), `True`,
//! `False`, `None`, `[...]` / `(...)` sequences and `{key: value}` maps.
//! An unquoted word is never treated as a string.

use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    value::{MapKey, TypedValue},
};

const MAX_DEPTH: usize = 128;

/// Coerce a raw configuration string into a [`TypedValue`].
pub fn coerce(raw: &str) -> Result<TypedValue> {
    let mut parser = Parser { src: raw, pos: 0 };
    parser
        .parse_document()
        .map_err(|reason| Error::malformed(raw, reason))
}

type ParseResult<T> = std::result::Result<T, String>;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn parse_document(&mut self) -> ParseResult<TypedValue> {
        self.skip_ws();
        if self.at_end() {
            return Err("empty value".into());
        }
        let value = self.parse_value(0)?;
        self.skip_ws();
        match self.peek() {
            None => Ok(value),
            Some(c) => Err(format!("unexpected '{c}' at offset {}", self.pos)),
        }
    }

    fn parse_value(&mut self, depth: usize) -> ParseResult<TypedValue> {
        if depth > MAX_DEPTH {
            return Err("nesting too deep".into());
        }
        match self.peek() {
            None => Err("unexpected end of input".into()),
            Some('[') => {
                self.bump();
                self.parse_sequence(']', depth).map(TypedValue::List)
            },
            Some('(') => {
                self.bump();
                self.parse_parenthesized(depth)
            },
            Some('{') => {
                self.bump();
                self.parse_map(depth)
            },
            Some(q @ ('\'' | '"')) => self.parse_string(q, false).map(TypedValue::Str),
            Some(sign @ ('+' | '-')) => {
                self.bump();
                self.skip_ws();
                match self.peek() {
                    Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(sign == '-'),
                    _ => Err(format!("unary '{sign}' must be followed by a number")),
                }
            },
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(false),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name(),
            Some(c) => Err(format!("unexpected '{c}' at offset {}", self.pos)),
        }
    }

    /// Comma-separated values up to `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: char, depth: usize) -> ParseResult<Vec<TypedValue>> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_value(depth + 1)?);
            self.skip_ws();
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(',')?;
        }
    }

    /// `()` and `(a,)` are sequences; `(a)` is just `a`.
    fn parse_parenthesized(&mut self, depth: usize) -> ParseResult<TypedValue> {
        self.skip_ws();
        if self.eat(')') {
            return Ok(TypedValue::List(Vec::new()));
        }
        let first = self.parse_value(depth + 1)?;
        self.skip_ws();
        if self.eat(')') {
            return Ok(first);
        }
        self.expect(',')?;
        let mut items = vec![first];
        items.extend(self.parse_sequence(')', depth)?);
        Ok(TypedValue::List(items))
    }

    fn parse_map(&mut self, depth: usize) -> ParseResult<TypedValue> {
        let mut map = BTreeMap::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(TypedValue::Map(map));
            }
            let key = self.parse_value(depth + 1)?;
            self.skip_ws();
            if !self.eat(':') {
                return Err(match self.peek() {
                    Some(',' | '}') => "set literals are not supported".into(),
                    _ => format!("expected ':' at offset {}", self.pos),
                });
            }
            self.skip_ws();
            let value = self.parse_value(depth + 1)?;
            map.insert(map_key(key)?, value);
            self.skip_ws();
            if self.eat('}') {
                return Ok(TypedValue::Map(map));
            }
            self.expect(',')?;
        }
    }

    fn parse_name(&mut self) -> ParseResult<TypedValue> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let src = self.src;
        let name = &src[start..self.pos];
        match (name, self.peek()) {
            ("True", _) => Ok(TypedValue::Bool(true)),
            ("False", _) => Ok(TypedValue::Bool(false)),
            ("None", _) => Ok(TypedValue::None),
            ("r" | "R", Some(q @ ('\'' | '"'))) => {
                self.parse_string(q, true).map(TypedValue::Str)
            },
            ("u" | "U", Some(q @ ('\'' | '"'))) => {
                self.parse_string(q, false).map(TypedValue::Str)
            },
            _ => Err(format!("unquoted word '{name}' is not a literal")),
        }
    }

    fn parse_number(&mut self, negative: bool) -> ParseResult<TypedValue> {
        let start = self.pos;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && (prev == 'e' || prev == 'E')
                && !self.src[start..self.pos].starts_with("0x")
                && !self.src[start..self.pos].starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.bump();
            } else {
                break;
            }
        }
        let token = &self.src[start..self.pos];
        number(token, negative)
    }

    fn parse_string(&mut self, quote: char, raw: bool) -> ParseResult<String> {
        let triple: String = std::iter::repeat_n(quote, 3).collect();
        let is_triple = self.rest().starts_with(&triple);
        self.pos += if is_triple { 3 } else { 1 };

        let mut out = String::new();
        loop {
            if is_triple && self.rest().starts_with(&triple) {
                self.pos += 3;
                return Ok(out);
            }
            let Some(c) = self.bump() else {
                return Err("unterminated string".into());
            };
            match c {
                c if c == quote && !is_triple => return Ok(out),
                '\n' if !is_triple => return Err("newline in single-quoted string".into()),
                '\\' if raw => {
                    // Raw strings keep the backslash but still cannot end on an escaped quote.
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                },
                '\\' => self.parse_escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> ParseResult<()> {
        let Some(c) = self.bump() else {
            return Err("unterminated string".into());
        };
        match c {
            '\n' => {},
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        },
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or("invalid octal escape")?);
            },
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                out.push('\\');
                out.push(other);
            },
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize) -> ParseResult<char> {
        let digits = self.rest().get(..len).ok_or("truncated escape")?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("bad escape '{digits}'"));
        }
        let code = u32::from_str_radix(digits, 16).map_err(|_| format!("bad escape '{digits}'"))?;
        self.pos += len;
        char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        if self.eat(expected) {
            return Ok(());
        }
        match self.peek() {
            Some(c) => Err(format!(
                "expected '{expected}', found '{c}' at offset {}",
                self.pos
            )),
            None => Err(format!("expected '{expected}', found end of input")),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }
}

fn map_key(value: TypedValue) -> ParseResult<MapKey> {
    match value {
        TypedValue::Str(s) => Ok(MapKey::Str(s)),
        TypedValue::Int(i) => Ok(MapKey::Int(i)),
        TypedValue::Bool(b) => Ok(MapKey::Bool(b)),
        other => Err(format!("{} cannot be used as a map key", other.kind())),
    }
}

fn number(token: &str, negative: bool) -> ParseResult<TypedValue> {
    if !valid_underscores(token) {
        return Err(format!("invalid number '{token}'"));
    }
    let digits = token.replace('_', "");
    let lower = digits.to_ascii_lowercase();

    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return integer(&lower[2..], radix, negative, token);
    }

    if lower.contains(['.', 'e']) {
        let value: f64 = lower
            .parse()
            .map_err(|_| format!("invalid float '{token}'"))?;
        if !lower.starts_with(|c: char| c.is_ascii_digit() || c == '.') || !value.is_finite() {
            return Err(format!("invalid float '{token}'"));
        }
        return Ok(TypedValue::Float(if negative { -value } else { value }));
    }

    if lower.len() > 1 && lower.starts_with('0') && lower.bytes().any(|b| b != b'0') {
        return Err(format!("leading zeros in decimal integer '{token}'"));
    }
    integer(&lower, 10, negative, token)
}

fn integer(digits: &str, radix: u32, negative: bool, token: &str) -> ParseResult<TypedValue> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(format!("invalid integer '{token}'"));
    }
    let magnitude = i128::from_str_radix(digits, radix)
        .map_err(|_| format!("integer '{token}' out of range"))?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed)
        .map(TypedValue::Int)
        .map_err(|_| format!("integer '{token}' out of range"))
}

/// Underscores may only sit between two digits (after an optional radix prefix).
fn valid_underscores(token: &str) -> bool {
    let (body, is_digit): (&str, fn(&u8) -> bool) =
        match token.get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x" | "0o" | "0b") => (token.get(2..).unwrap_or(""), u8::is_ascii_hexdigit),
            _ => (token, u8::is_ascii_digit),
        };
    let bytes = body.as_bytes();
    bytes.iter().enumerate().all(|(i, b)| {
        *b != b'_'
            || (i > 0
                && i + 1 < bytes.len()
                && is_digit(&bytes[i - 1])
                && is_digit(&bytes[i + 1]))
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn ok(raw: &str) -> TypedValue {
        coerce(raw).unwrap_or_else(|e| panic!("{raw:?} should coerce: {e}"))
    }

    fn malformed(raw: &str) {
        match coerce(raw) {
            Err(Error::MalformedLiteral { .. }) => {},
            other => panic!("{raw:?} should be malformed, got {other:?}"),
        }
    }

    #[test]
    fn integers() {
        assert_eq!(ok("7"), TypedValue::Int(7));
        assert_eq!(ok("-7"), TypedValue::Int(-7));
        assert_eq!(ok("+ 7"), TypedValue::Int(7));
        assert_eq!(ok("0"), TypedValue::Int(0));
        assert_eq!(ok("1_000"), TypedValue::Int(1000));
        assert_eq!(ok("0xff"), TypedValue::Int(255));
        assert_eq!(ok("0o17"), TypedValue::Int(15));
        assert_eq!(ok("0b101"), TypedValue::Int(5));
        assert_eq!(ok("-9223372036854775808"), TypedValue::Int(i64::MIN));
        malformed("9223372036854775808");
        malformed("007");
        malformed("1__0");
        malformed("0xZZ");
    }

    #[test]
    fn floats() {
        assert_eq!(ok("10.5"), TypedValue::Float(10.5));
        assert_eq!(ok("-2.5"), TypedValue::Float(-2.5));
        assert_eq!(ok(".5"), TypedValue::Float(0.5));
        assert_eq!(ok("5."), TypedValue::Float(5.0));
        assert_eq!(ok("1e3"), TypedValue::Float(1000.0));
        assert_eq!(ok("1.5E-2"), TypedValue::Float(0.015));
        malformed("1.2.3");
        malformed("1e");
        malformed("3j");
        malformed("1_e5");
        malformed("1_.5");
        malformed("1e_5");
    }

    #[test]
    fn strings() {
        assert_eq!(ok("\"Literals\""), TypedValue::Str("Literals".into()));
        assert_eq!(ok("'Literals'"), TypedValue::Str("Literals".into()));
        assert_eq!(ok(r"'a\tb\n'"), TypedValue::Str("a\tb\n".into()));
        assert_eq!(ok(r"'\x41\u00e9\101'"), TypedValue::Str("AéA".into()));
        assert_eq!(ok(r"r'C:\dir'"), TypedValue::Str(r"C:\dir".into()));
        assert_eq!(ok(r#"'say "hi"'"#), TypedValue::Str("say \"hi\"".into()));
        assert_eq!(
            ok("'''two\nlines'''"),
            TypedValue::Str("two\nlines".into())
        );
        malformed("'unterminated");
        malformed("'one\ntwo'");
        malformed("'\\x+1'");
        malformed("'\\u-041'");
    }

    #[test]
    fn bare_words_are_rejected() {
        malformed("Literals");
        malformed("true");
        malformed("/usr/local/bin");
        malformed("");
        malformed("   ");
    }

    #[test]
    fn keywords() {
        assert_eq!(ok("True"), TypedValue::Bool(true));
        assert_eq!(ok("False"), TypedValue::Bool(false));
        assert_eq!(ok("None"), TypedValue::None);
    }

    #[test]
    fn sequences() {
        assert_eq!(
            ok("[1,2,3,4,5]"),
            TypedValue::List((1..=5).map(TypedValue::Int).collect())
        );
        assert_eq!(ok("[]"), TypedValue::List(vec![]));
        assert_eq!(
            ok("[1, 'a', [2.5], ]"),
            TypedValue::List(vec![
                TypedValue::Int(1),
                TypedValue::Str("a".into()),
                TypedValue::List(vec![TypedValue::Float(2.5)]),
            ])
        );
        assert_eq!(
            ok("(1, 2)"),
            TypedValue::List(vec![TypedValue::Int(1), TypedValue::Int(2)])
        );
        assert_eq!(ok("(1,)"), TypedValue::List(vec![TypedValue::Int(1)]));
        assert_eq!(ok("(1)"), TypedValue::Int(1));
        assert_eq!(
            ok("[\n  1,\n  2\n]"),
            TypedValue::List(vec![TypedValue::Int(1), TypedValue::Int(2)])
        );
        malformed("[1, 2");
        malformed("[1 2]");
        malformed("[1,,2]");
        malformed("[1] [2]");
    }

    #[test]
    fn maps() {
        assert_eq!(
            ok(r#"{"a": 1}"#),
            TypedValue::Map(BTreeMap::from([(MapKey::from("a"), TypedValue::Int(1))]))
        );
        assert_eq!(ok("{}"), TypedValue::Map(BTreeMap::new()));
        assert_eq!(
            ok("{1: [True], 'k': {'n': None},}"),
            TypedValue::Map(BTreeMap::from([
                (MapKey::Int(1), TypedValue::List(vec![TypedValue::Bool(true)])),
                (
                    MapKey::from("k"),
                    TypedValue::Map(BTreeMap::from([(MapKey::from("n"), TypedValue::None)]))
                ),
            ]))
        );
        // Last duplicate key wins.
        let last = ok("{'a': 1, 'a': 2}");
        assert_eq!(last.as_map().unwrap()[&MapKey::from("a")], TypedValue::Int(2));
        malformed("{1, 2}");
        malformed("{[1]: 2}");
        malformed("{'a' 1}");
        malformed("{a: 1}");
    }

    #[test]
    fn nesting_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 2), "]".repeat(MAX_DEPTH + 2));
        malformed(&deep);
    }

    #[test]
    fn displayed_values_coerce_back() {
        let values = [
            ok("7"),
            ok("-3"),
            ok("10.5"),
            ok("15.0"),
            ok("1e100"),
            ok("[1,2,3,4,5]"),
            ok(r#"{"a": 1, 2: [True, None]}"#),
            ok(r"'quote \' and \\ backslash'"),
        ];
        for value in values {
            assert_eq!(ok(&value.to_string()), value);
        }
    }
}
