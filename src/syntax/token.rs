//! Token definitions for `.moo` source and MOO verb code.
//!
//! Module structure and verb bodies share one token set. Keywords are not
//! separate tokens: `object`, `property` and friends are identifiers that the
//! parser recognizes by position, because MOO code is free to use the same
//! words as variable names.

use std::fmt;

use logos::Logos;
use smol_str::SmolStr;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(r"//[^\n]*", |lex| comment_text(lex.slice()))]
    Comment(SmolStr),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(SmolStr),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| finite_float(lex.slice()))]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| finite_float(lex.slice()))]
    Float(f64),

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("#")]
    Hash,
    #[token("$")]
    Dollar,
    #[token("@")]
    At,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("?")]
    Question,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,
    #[token("'")]
    Quote,
    #[token("`")]
    Backtick,
    #[token("&.")]
    BitAnd,
    #[token("|.")]
    BitOr,
    #[token("^.")]
    BitXor,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
}

/// Literals that overflow to infinity are lex errors.
fn finite_float(slice: &str) -> Option<f64> {
    slice.parse::<f64>().ok().filter(|x| x.is_finite())
}

fn comment_text(slice: &str) -> SmolStr {
    let text = &slice[2..];
    SmolStr::new(text.strip_prefix(' ').unwrap_or(text).trim_end())
}

fn unescape(slice: &str) -> SmolStr {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    SmolStr::new(out)
}

/// Quote a string the way the lexer reads it back.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl Token {
    /// Exact match of an identifier; structural keywords are case-sensitive.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name == word)
    }

    /// Case-insensitive match, as MOO code treats its own keywords.
    pub fn is_ident(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name.eq_ignore_ascii_case(word))
    }

    pub fn ident(&self) -> Option<&SmolStr> {
        match self {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Comment(_))
    }

    /// Source spelling for punctuation; `None` for tokens that carry data.
    pub fn punct(&self) -> Option<&'static str> {
        Some(match self {
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::Colon => ":",
            Token::ColonColon => "::",
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::Arrow => "->",
            Token::FatArrow => "=>",
            Token::Hash => "#",
            Token::Dollar => "$",
            Token::At => "@",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Bang => "!",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Question => "?",
            Token::Pipe => "|",
            Token::Tilde => "~",
            Token::Quote => "'",
            Token::Backtick => "`",
            Token::BitAnd => "&.",
            Token::BitOr => "|.",
            Token::BitXor => "^.",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Comment(_)
            | Token::Ident(_)
            | Token::Str(_)
            | Token::Int(_)
            | Token::Float(_) => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Comment(text) if text.is_empty() => f.write_str("//"),
            Token::Comment(text) => write!(f, "// {text}"),
            Token::Ident(name) => f.write_str(name),
            Token::Str(value) => f.write_str(&quote(value)),
            Token::Int(value) => write!(f, "{value}"),
            Token::Float(value) => write!(f, "{value:?}"),
            other => f.write_str(other.punct().unwrap_or("?")),
        }
    }
}
