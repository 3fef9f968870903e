//! Statement boundaries in MOO verb code.
//!
//! This is not a MOO parser. It only finds where statements begin and end so
//! that comments, argument patterns and indentation can be handled one
//! statement at a time.

use smol_str::SmolStr;

use super::keywords::{is_block_keyword, is_header_keyword};
use super::token::Token;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Statement<'a> {
    /// A `//` comment between statements.
    Comment(&'a SmolStr),
    /// Tokens up to and including a depth-0 `;`, or to the end of the body.
    Simple(&'a [Token]),
    /// `if (...)`, `while name (...)`, `except e (...)` and the like, up to the
    /// close of the first bracket group.
    Header(&'a [Token]),
    /// A keyword that stands alone: `else`, `try`, `endif`, ...
    Block(&'a Token),
}

impl<'a> Statement<'a> {
    pub fn tokens(&self) -> &'a [Token] {
        match *self {
            Statement::Simple(tokens) | Statement::Header(tokens) => tokens,
            Statement::Block(token) => std::slice::from_ref(token),
            Statement::Comment(_) => &[],
        }
    }

    /// Lowercase leading keyword of a header or block statement.
    pub fn keyword(&self) -> Option<String> {
        match self {
            Statement::Header(tokens) => tokens.first().and_then(Token::ident),
            Statement::Block(token) => token.ident(),
            _ => None,
        }
        .map(|word| word.to_ascii_lowercase())
    }
}

/// Split a verb body into statements.
pub fn statements(tokens: &[Token]) -> Vec<Statement<'_>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let statement = match &tokens[i] {
            Token::Comment(text) => {
                i += 1;
                Statement::Comment(text)
            }
            Token::Ident(word) if is_block_keyword(word) => {
                i += 1;
                Statement::Block(&tokens[i - 1])
            }
            Token::Ident(word) if is_header_keyword(word) => {
                let end = header_end(tokens, i);
                let header = Statement::Header(&tokens[i..end]);
                i = end;
                header
            }
            _ => {
                let end = simple_end(tokens, i);
                let simple = Statement::Simple(&tokens[i..end]);
                i = end;
                simple
            }
        };
        out.push(statement);
    }
    out
}

fn header_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

fn simple_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Semi if depth == 0 => return start + offset + 1,
            _ => {}
        }
    }
    tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::syntax::lexer::tokenize;

    fn lex(src: &str) -> Vec<Token> {
        tokenize(src, FileId::new(0))
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_control_flow_segments() {
        let tokens = lex("// start\nif (x == {1, 2}) return 1; elseif (y) z = 2; else return; endif");
        let kinds: Vec<_> = statements(&tokens)
            .iter()
            .map(|s| match s {
                Statement::Comment(_) => "comment".to_string(),
                Statement::Simple(t) => format!("simple:{}", t.len()),
                Statement::Header(_) | Statement::Block(_) => s.keyword().unwrap_or_default(),
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["comment", "if", "simple:3", "elseif", "simple:4", "else", "simple:2", "endif"]
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        let tokens = lex("WHILE loop (1) fork (0) x(); ENDFORK endwhile");
        let stmts = statements(&tokens);
        assert_eq!(stmts[0].keyword().as_deref(), Some("while"));
        assert_eq!(stmts[0].tokens().len(), 5);
        assert_eq!(stmts[1].keyword().as_deref(), Some("fork"));
        assert_eq!(stmts[3].keyword().as_deref(), Some("endfork"));
    }

    #[test]
    fn test_unterminated_tail_is_one_statement() {
        let tokens = lex("x = 1; return x");
        let stmts = statements(&tokens);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], Statement::Simple(&tokens[4..]));
    }

    #[test]
    fn test_comment_inside_statement_stays_inside() {
        let tokens = lex("x = // why\n 1;");
        assert_eq!(statements(&tokens).len(), 1);
    }
}
