//! The reader: lexer plus recursive-descent parser.
//!
//! `Lexer` pulls bytes from anything implementing `std::io::Read` into a
//! buffer it grows in `Config::file_chunk_size` chunks, so a token may
//! straddle a chunk boundary without the caller noticing; bytes are never
//! dropped from the buffer, which also lets character-literal lookahead
//! rewind a byte it over-read. `Parser` is recursive descent with one token
//! of lookahead.

use std::io::Read;

use crate::alloc::{Heap, Object};
use crate::config::Config;
use crate::error::{LispError, LispResult};
use crate::list::cons_list as list_from_vec;
use crate::symbol::SymbolTable;
use crate::value::{Value, EOF_CHAR};

fn is_symbol_punct(b: u8) -> bool {
    matches!(b, b'!' | b'#' | b'$' | b'+' | b'-' | b'.' | b'*' | b'^' | b'%' | b'_' | b'/' | b'?')
}

fn is_word_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || is_symbol_punct(b)
}

/// Case-sensitive `#\name` table. Codes are ASCII control-block positions
/// 0..=32; `EOF` is the reader's own end-of-stream sentinel (-1).
const NAMED_CHARS: &[(&str, i32)] = &[
    ("EOF", -1),
    ("NUL", 0),
    ("SOH", 1),
    ("STX", 2),
    ("ETX", 3),
    ("EOT", 4),
    ("ENQ", 5),
    ("ACK", 6),
    ("BEL", 7),
    ("backspace", 8),
    ("tab", 9),
    ("newline", 10),
    ("VT", 11),
    ("page", 12),
    ("return", 13),
    ("SO", 14),
    ("SI", 15),
    ("DLE", 16),
    ("DC1", 17),
    ("DC2", 18),
    ("DC3", 19),
    ("DC4", 20),
    ("NAK", 21),
    ("SYN", 22),
    ("ETB", 23),
    ("CAN", 24),
    ("EM", 25),
    ("SUB", 26),
    ("altmode", 27),
    ("FS", 28),
    ("GS", 29),
    ("RS", 30),
    ("backnext", 31),
    ("space", 32),
];

fn named_char_code(name: &[u8]) -> Option<i32> {
    let s = std::str::from_utf8(name).ok()?;
    NAMED_CHARS.iter().find(|&&(n, _)| n == s).map(|&(_, c)| c)
}

fn parse_int(bytes: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    let digits = s.strip_prefix('+').or_else(|| s.strip_prefix('-')).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok()
}

fn parse_float(bytes: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if !s.contains('.') {
        return None;
    }
    let body = s.strip_prefix('+').or_else(|| s.strip_prefix('-')).unwrap_or(s);
    if body.is_empty() || body.matches('.').count() != 1 {
        return None;
    }
    if !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if !body.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok()
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Dot,
    Quote,
    Bquote,
    Comma,
    At,
    HashLParen,
    Bool(bool),
    Char(i32),
    Str(Vec<u8>),
    Int(i64),
    Float(f64),
    Symbol(Vec<u8>),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

struct Lexer<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    identifier_max: usize,
    reader_done: bool,
}

impl<R: Read> Lexer<R> {
    fn new(reader: R, chunk_size: usize, identifier_max: usize) -> Self {
        Lexer { reader, buf: Vec::new(), pos: 0, chunk_size, identifier_max, reader_done: false }
    }

    fn fill(&mut self) -> LispResult<()> {
        if self.reader_done {
            return Ok(());
        }
        let mut chunk = vec![0u8; self.chunk_size];
        let n = self
            .reader
            .read(&mut chunk)
            .map_err(|e| LispError::new(crate::error::ErrorKind::FileOpen, e.to_string()))?;
        if n == 0 {
            self.reader_done = true;
        } else {
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn ensure(&mut self, n: usize) -> LispResult<()> {
        while self.buf.len() - self.pos < n && !self.reader_done {
            self.fill()?;
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> LispResult<Option<u8>> {
        self.ensure(1)?;
        Ok(self.buf.get(self.pos).copied())
    }

    fn bump(&mut self) -> LispResult<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    fn offset(&self) -> usize {
        self.pos
    }

    fn skip_trivia(&mut self) -> LispResult<()> {
        loop {
            match self.peek_byte()? {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(0x0c) => {
                    self.bump()?;
                }
                Some(b';') => loop {
                    match self.bump()? {
                        None | Some(b'\n') => break,
                        _ => {}
                    }
                },
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_string(&mut self, offset: usize) -> LispResult<Token> {
        self.bump()?;
        let mut bytes = Vec::new();
        loop {
            match self.bump()? {
                None => return Err(LispError::read_syntax("unterminated string", offset)),
                Some(b'"') => break,
                Some(b'\n') => return Err(LispError::read_syntax("newline inside string", offset)),
                Some(b'\\') => match self.bump()? {
                    Some(b'n') => bytes.push(b'\n'),
                    Some(b't') => bytes.push(b'\t'),
                    Some(b'f') => bytes.push(0x0c),
                    Some(b'"') => bytes.push(b'"'),
                    Some(b'\\') => bytes.push(b'\\'),
                    Some(other) => bytes.push(other),
                    None => return Err(LispError::read_syntax("unterminated string", offset)),
                },
                Some(b) => bytes.push(b),
            }
            if bytes.len() > self.identifier_max {
                return Err(LispError::read_syntax("string literal too long", offset));
            }
        }
        Ok(Token { kind: TokenKind::Str(bytes), offset })
    }

    fn lex_char(&mut self, offset: usize) -> LispResult<Token> {
        let mut name = Vec::new();
        loop {
            match self.peek_byte()? {
                Some(b) if b.is_ascii_alphabetic() => {
                    name.push(b);
                    self.bump()?;
                }
                _ => break,
            }
        }
        if name.is_empty() {
            return match self.bump()? {
                Some(b) => Ok(Token { kind: TokenKind::Char(b as i32), offset }),
                None => Err(LispError::read_syntax("unterminated character literal", offset)),
            };
        }
        if let Some(code) = named_char_code(&name) {
            return Ok(Token { kind: TokenKind::Char(code), offset });
        }
        if name.len() > 1 {
            // Not a recognized multi-letter name: only its first byte was
            // the literal character. Rewind the rest.
            self.pos -= name.len() - 1;
        }
        Ok(Token { kind: TokenKind::Char(name[0] as i32), offset })
    }

    fn lex_hash(&mut self, offset: usize) -> LispResult<Token> {
        self.bump()?;
        match self.peek_byte()? {
            Some(b'(') => {
                self.bump()?;
                Ok(Token { kind: TokenKind::HashLParen, offset })
            }
            Some(b't') => {
                self.bump()?;
                Ok(Token { kind: TokenKind::Bool(true), offset })
            }
            Some(b'f') => {
                self.bump()?;
                Ok(Token { kind: TokenKind::Bool(false), offset })
            }
            Some(b'\\') => {
                self.bump()?;
                self.lex_char(offset)
            }
            _ => self.lex_word(offset, vec![b'#']),
        }
    }

    fn lex_word(&mut self, offset: usize, mut acc: Vec<u8>) -> LispResult<Token> {
        loop {
            match self.peek_byte()? {
                Some(b) if is_word_continue(b) => {
                    acc.push(b);
                    self.bump()?;
                }
                _ => break,
            }
            if acc.len() > self.identifier_max {
                return Err(LispError::read_syntax("token too long", offset));
            }
        }
        if acc.is_empty() {
            self.bump()?;
            return Err(LispError::read_syntax("unrecognized character", offset));
        }
        if acc == b"." {
            return Ok(Token { kind: TokenKind::Dot, offset });
        }
        if let Some(n) = parse_int(&acc) {
            return Ok(Token { kind: TokenKind::Int(n), offset });
        }
        if let Some(f) = parse_float(&acc) {
            return Ok(Token { kind: TokenKind::Float(f), offset });
        }
        Ok(Token { kind: TokenKind::Symbol(acc), offset })
    }

    fn lex(&mut self) -> LispResult<Token> {
        self.skip_trivia()?;
        let offset = self.offset();
        let Some(b0) = self.peek_byte()? else {
            return Ok(Token { kind: TokenKind::Eof, offset });
        };
        match b0 {
            b'(' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::LParen, offset })
            }
            b')' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::RParen, offset })
            }
            b'\'' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::Quote, offset })
            }
            b'`' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::Bquote, offset })
            }
            b',' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::Comma, offset })
            }
            b'@' => {
                self.bump()?;
                Ok(Token { kind: TokenKind::At, offset })
            }
            b'"' => self.lex_string(offset),
            b'#' => self.lex_hash(offset),
            _ => self.lex_word(offset, Vec::new()),
        }
    }
}

struct Parser<'a, R> {
    lexer: Lexer<R>,
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
    peeked: Option<Token>,
}

impl<'a, R: Read> Parser<'a, R> {
    fn next(&mut self) -> LispResult<Token> {
        if let Some(t) = self.peeked.take() {
            return Ok(t);
        }
        self.lexer.lex()
    }

    fn peek(&mut self) -> LispResult<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.lex()?);
        }
        Ok(self.peeked.as_ref().unwrap())
    }

    fn parse_sugar(&mut self, name: &[u8]) -> LispResult<Value> {
        let inner = self.parse_form()?;
        let sym = Value::Symbol(self.symbols.intern(self.heap, name));
        Ok(list_from_vec(self.heap, vec![sym, inner], Value::Nil))
    }

    fn parse_list_tail(&mut self, open_offset: usize) -> LispResult<Value> {
        let mut items = Vec::new();
        loop {
            let kind = self.peek()?.kind.clone();
            match kind {
                TokenKind::RParen => {
                    self.next()?;
                    return Ok(list_from_vec(self.heap, items, Value::Nil));
                }
                TokenKind::Dot => {
                    self.next()?;
                    if items.is_empty() {
                        return Err(LispError::read_syntax("dot at start of list", open_offset));
                    }
                    let tail = self.parse_form()?;
                    let close = self.next()?;
                    if close.kind != TokenKind::RParen {
                        return Err(LispError::read_syntax(
                            "expected ) after dotted tail",
                            close.offset,
                        ));
                    }
                    return Ok(list_from_vec(self.heap, items, tail));
                }
                TokenKind::Eof => {
                    return Err(LispError::read_syntax("unterminated list", open_offset));
                }
                _ => items.push(self.parse_form()?),
            }
        }
    }

    fn parse_vector(&mut self, open_offset: usize) -> LispResult<Value> {
        let mut items = Vec::new();
        loop {
            let kind = self.peek()?.kind.clone();
            match kind {
                TokenKind::RParen => {
                    self.next()?;
                    let r = self.heap.alloc(Object::Vector { items });
                    return Ok(Value::Vector(r));
                }
                TokenKind::Eof => {
                    return Err(LispError::read_syntax("unterminated vector literal", open_offset));
                }
                _ => items.push(self.parse_form()?),
            }
        }
    }

    fn parse_form(&mut self) -> LispResult<Value> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::LParen => self.parse_list_tail(tok.offset),
            TokenKind::HashLParen => self.parse_vector(tok.offset),
            TokenKind::Quote => self.parse_sugar(b"QUOTE"),
            TokenKind::Bquote => self.parse_sugar(b"QUASIQUOTE"),
            TokenKind::Comma => {
                if self.peek()?.kind == TokenKind::At {
                    self.next()?;
                    self.parse_sugar(b"UNQUOTESPLICE")
                } else {
                    self.parse_sugar(b"UNQUOTE")
                }
            }
            TokenKind::RParen => Err(LispError::read_syntax("unexpected )", tok.offset)),
            TokenKind::Dot => Err(LispError::read_syntax("unexpected .", tok.offset)),
            TokenKind::At => Err(LispError::read_syntax("unexpected @", tok.offset)),
            TokenKind::Bool(b) => Ok(Value::Bool(b)),
            TokenKind::Char(c) => Ok(Value::Char(c)),
            TokenKind::Str(bytes) => {
                let r = self.heap.alloc(Object::Str { bytes });
                Ok(Value::Str(r))
            }
            TokenKind::Int(n) => Ok(Value::Int(n)),
            TokenKind::Float(f) => Ok(Value::Real(f)),
            TokenKind::Symbol(bytes) => {
                let upper: Vec<u8> = bytes.iter().map(|b| b.to_ascii_uppercase()).collect();
                let r = self.symbols.intern(self.heap, &upper);
                Ok(Value::Symbol(r))
            }
            TokenKind::Eof => Err(LispError::read_syntax("unexpected end of input", tok.offset)),
        }
    }
}

/// Read every top-level form from `reader`. Zero forms yields the EOF
/// sentinel (`Value::Char(EOF_CHAR)`); exactly one form is returned as-is;
/// more than one is wrapped in `(BEGIN form...)` so the caller always gets
/// a single expression.
pub fn read_stream<R: Read>(
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    config: &Config,
    reader: R,
) -> LispResult<Value> {
    let lexer = Lexer::new(reader, config.file_chunk_size, config.identifier_max);
    let mut parser = Parser { lexer, heap, symbols, peeked: None };
    let mut forms = Vec::new();
    loop {
        if parser.peek()?.kind == TokenKind::Eof {
            break;
        }
        forms.push(parser.parse_form()?);
    }
    Ok(match forms.len() {
        0 => Value::Char(EOF_CHAR),
        1 => forms.remove(0),
        _ => {
            let begin = Value::Symbol(parser.symbols.intern(parser.heap, b"BEGIN"));
            let mut all = Vec::with_capacity(forms.len() + 1);
            all.push(begin);
            all.extend(forms);
            list_from_vec(parser.heap, all, Value::Nil)
        }
    })
}

/// Convenience entry point over an in-memory string.
pub fn read_str(
    heap: &mut Heap,
    symbols: &mut SymbolTable,
    config: &Config,
    src: &str,
) -> LispResult<Value> {
    read_stream(heap, symbols, config, std::io::Cursor::new(src.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(src: &str) -> (Heap, Value) {
        let mut heap = Heap::new(1 << 20);
        let mut symbols = SymbolTable::new();
        let config = Config::default();
        let v = read_str(&mut heap, &mut symbols, &config, src).unwrap();
        (heap, v)
    }

    #[test]
    fn reads_integers_and_floats() {
        let (_heap, v) = read("42");
        assert_eq!(v, Value::Int(42));
        let (_heap, v) = read("-3.5");
        assert_eq!(v, Value::Real(-3.5));
    }

    #[test]
    fn reads_a_proper_list() {
        let (heap, v) = read("(1 2 3)");
        match v {
            Value::Pair(r) => match heap.get(r) {
                Object::Pair { car, cdr } => {
                    assert_eq!(*car, Value::Int(1));
                    match cdr {
                        Value::Pair(r2) => match heap.get(*r2) {
                            Object::Pair { car, .. } => assert_eq!(*car, Value::Int(2)),
                            _ => panic!(),
                        },
                        _ => panic!(),
                    }
                }
                _ => panic!(),
            },
            _ => panic!("expected pair"),
        }
    }

    #[test]
    fn reads_a_dotted_pair() {
        let (heap, v) = read("(1 . 2)");
        match v {
            Value::Pair(r) => match heap.get(r) {
                Object::Pair { car, cdr } => {
                    assert_eq!(*car, Value::Int(1));
                    assert_eq!(*cdr, Value::Int(2));
                }
                _ => panic!(),
            },
            _ => panic!("expected pair"),
        }
    }

    #[test]
    fn reads_a_vector_literal() {
        let (heap, v) = read("#(1 2 3)");
        match v {
            Value::Vector(r) => match heap.get(r) {
                Object::Vector { items } => assert_eq!(items.len(), 3),
                _ => panic!(),
            },
            _ => panic!("expected vector"),
        }
    }

    #[test]
    fn reads_a_string_with_escapes() {
        let (heap, v) = read(r#""a\n\"b""#);
        match v {
            Value::Str(r) => match heap.get(r) {
                Object::Str { bytes } => assert_eq!(bytes.as_slice(), b"a\n\"b"),
                _ => panic!(),
            },
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn reads_named_and_literal_characters() {
        let (_heap, v) = read(r"#\newline");
        assert_eq!(v, Value::Char(10));
        let (_heap, v) = read(r"#\A");
        assert_eq!(v, Value::Char(b'A' as i32));
    }

    #[test]
    fn quote_sugar_expands_to_quote_form() {
        let (heap, v) = read("'a");
        match v {
            Value::Pair(r) => match heap.get(r) {
                Object::Pair { car: Value::Symbol(s), .. } => match heap.get(*s) {
                    Object::Symbol { bytes, .. } => assert_eq!(bytes.as_ref(), b"QUOTE"),
                    _ => panic!(),
                },
                _ => panic!(),
            },
            _ => panic!("expected pair"),
        }
    }

    #[test]
    fn multiple_top_level_forms_wrap_in_begin() {
        let (heap, v) = read("1 2");
        match v {
            Value::Pair(r) => match heap.get(r) {
                Object::Pair { car: Value::Symbol(s), .. } => match heap.get(*s) {
                    Object::Symbol { bytes, .. } => assert_eq!(bytes.as_ref(), b"BEGIN"),
                    _ => panic!(),
                },
                _ => panic!(),
            },
            _ => panic!("expected pair"),
        }
    }

    #[test]
    fn empty_stream_yields_eof_sentinel() {
        let (_heap, v) = read("   ; just a comment\n");
        assert_eq!(v, Value::Char(EOF_CHAR));
    }

    #[test]
    fn unterminated_list_is_a_read_syntax_error() {
        let mut heap = Heap::new(4096);
        let mut symbols = SymbolTable::new();
        let config = Config::default();
        let err = read_str(&mut heap, &mut symbols, &config, "(foo").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ReadSyntax);
    }
}
