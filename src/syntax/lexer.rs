//! Lexical analysis over a whole `.moo` file or a single verb program.
//!
//! [`Lexer`] is a lazy iterator of spanned tokens. It is `Clone`, so a caller
//! can snapshot it and restart from that point.

use logos::Logos;

use crate::base::{FileId, LineIndex, Span, TextRange, TextSize};
use crate::error::{MooError, Result};

use super::token::Token;

/// A token together with where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    file: FileId,
    inner: logos::Lexer<'src, Token>,
    lines: std::rc::Rc<LineIndex>,
    /// End offset of the previous numeric token, used to reject `12abc`.
    number_end: Option<usize>,
    failed: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str, file: FileId) -> Self {
        Self {
            source,
            file,
            inner: Token::lexer(source),
            lines: std::rc::Rc::new(LineIndex::new(source)),
            number_end: None,
            failed: false,
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    /// Span of the end of input, for "found end of file" errors.
    pub fn eof_span(&self) -> Span {
        self.span_of(self.source.len()..self.source.len())
    }

    fn span_of(&self, range: std::ops::Range<usize>) -> Span {
        let start = TextSize::from(range.start as u32);
        let end = TextSize::from(range.end as u32);
        Span::new(self.file, TextRange::new(start, end), self.lines.line_col(start))
    }

    fn error_for(&self, range: std::ops::Range<usize>) -> MooError {
        let slice = &self.source[range.clone()];
        let message = match slice.chars().next() {
            Some('"') => "unterminated string literal".to_string(),
            Some(c) if c.is_ascii_digit() => format!("invalid numeric literal `{slice}`"),
            Some(c) => format!("unexpected character `{c}`"),
            None => "unexpected end of input".to_string(),
        };
        MooError::Lex {
            span: self.span_of(range),
            message,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Spanned>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.inner.next()?;
        let range = self.inner.span();

        let token = match result {
            Ok(token) => token,
            Err(()) => {
                self.failed = true;
                return Some(Err(self.error_for(range)));
            }
        };

        if let (Some(end), Token::Ident(_)) = (self.number_end, &token) {
            if end == range.start {
                self.failed = true;
                let start = self.source[..end]
                    .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
                    .map_or(0, |i| i + 1);
                return Some(Err(self.error_for(start..range.end)));
            }
        }
        self.number_end = matches!(token, Token::Int(_) | Token::Float(_)).then_some(range.end);

        Some(Ok(Spanned {
            token,
            span: self.span_of(range),
        }))
    }
}

/// Lex an entire text eagerly, stopping at the first error.
pub fn tokenize(source: &str, file: FileId) -> Result<Vec<Spanned>> {
    Lexer::new(source, file).collect()
}
