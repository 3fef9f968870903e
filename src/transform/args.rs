//! The `{a, ?b = 1, @c} = args;` unpacking statement and method signatures.

use rustc_hash::FxHashSet;

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::syntax::ast::{Param, ParamKind};
use crate::syntax::keywords::is_identifier;
use crate::syntax::statements::Statement;
use crate::syntax::token::Token;

/// The signature encoded by `statement`, if it is a liftable args statement.
pub(crate) fn args_pattern(statement: Statement<'_>) -> Option<Vec<Param>> {
    let Statement::Simple(tokens) = statement else {
        return None;
    };
    let [
        Token::LBrace,
        inner @ ..,
        Token::RBrace,
        Token::Eq,
        Token::Ident(args),
        Token::Semi,
    ] = tokens
    else {
        return None;
    };
    if args != "args" || inner.is_empty() {
        return None;
    }

    let mut params = Vec::new();
    for item in split_top_level(inner) {
        params.push(match item {
            [Token::Ident(name)] => Param::required(name.clone()),
            [Token::Question, Token::Ident(name)] => Param::optional(name.clone(), None),
            [Token::Question, Token::Ident(name), Token::Eq, default @ ..] => {
                Param::optional(name.clone(), Some(default.to_vec()))
            }
            [Token::At, Token::Ident(name)] => Param::rest(name.clone()),
            _ => return None,
        });
    }
    check_params(&params, Span::detached()).ok()?;
    Some(params)
}

/// Tokens of the args statement for a non-empty signature.
pub(crate) fn args_statement(params: &[Param]) -> Vec<Token> {
    let mut out = vec![Token::LBrace];
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push(Token::Comma);
        }
        match &param.kind {
            ParamKind::Required => out.push(Token::Ident(param.name.clone())),
            ParamKind::Optional(default) => {
                out.push(Token::Question);
                out.push(Token::Ident(param.name.clone()));
                if let Some(default) = default {
                    out.push(Token::Eq);
                    out.extend(default.iter().cloned());
                }
            }
            ParamKind::Rest => {
                out.push(Token::At);
                out.push(Token::Ident(param.name.clone()));
            }
        }
    }
    out.extend([
        Token::RBrace,
        Token::Eq,
        Token::Ident("args".into()),
        Token::Semi,
    ]);
    out
}

/// Reject signatures that cannot be written as an args statement.
pub(crate) fn check_params(params: &[Param], span: Span) -> Result<()> {
    let mut seen = FxHashSet::default();
    let mut rest: Option<usize> = None;
    for (i, param) in params.iter().enumerate() {
        let name = &param.name;
        if !is_identifier(name) {
            return Err(MooError::transform(
                span,
                format!("`{name}` is not a valid parameter name"),
            ));
        }
        // MOO variable names are case-insensitive.
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(MooError::transform(
                span,
                format!("parameter `{name}` is declared twice"),
            ));
        }
        match &param.kind {
            ParamKind::Rest if rest.is_some() => {
                return Err(MooError::transform(span, "more than one `@rest` parameter"));
            }
            ParamKind::Rest => rest = Some(i),
            ParamKind::Optional(Some(default)) => check_default(name, default, span)?,
            ParamKind::Required | ParamKind::Optional(None) => {}
        }
    }
    if let Some(index) = rest {
        if index + 1 != params.len() {
            return Err(MooError::transform(
                span,
                format!("`@{}` must be the last parameter", params[index].name),
            ));
        }
    }
    Ok(())
}

fn check_default(name: &str, default: &[Token], span: Span) -> Result<()> {
    if default.is_empty() {
        return Err(MooError::transform(span, format!("empty default for `?{name}`")));
    }
    let mut depth = 0i32;
    for token in default {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth -= 1,
            Token::Comma if depth == 0 => depth = -1,
            Token::Comment(_) => depth = -1,
            _ => {}
        }
        if depth < 0 {
            break;
        }
    }
    if depth != 0 {
        return Err(MooError::transform(
            span,
            format!("default for `?{name}` is not a single expression"),
        ));
    }
    Ok(())
}

/// Split at commas outside any bracket pair.
fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::syntax::lexer::tokenize;
    use crate::syntax::statements::statements;
    use rstest::rstest;

    fn lex(src: &str) -> Vec<Token> {
        tokenize(src, FileId::new(0))
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn pattern_of(src: &str) -> Option<Vec<Param>> {
        let tokens = lex(src);
        statements(&tokens).first().copied().and_then(args_pattern)
    }

    #[test]
    fn test_pattern_lifts_every_param_kind() {
        let params = pattern_of("{who, ?how = {1, 2}, ?opt, @rest} = args;").unwrap();
        assert_eq!(
            params,
            vec![
                Param::required("who"),
                Param::optional("how", Some(lex("{1, 2}"))),
                Param::optional("opt", None),
                Param::rest("rest"),
            ]
        );
    }

    #[test]
    fn test_statement_rebuilds_same_tokens() {
        let src = "{who, ?greeting = \"Hello\", @rest} = args;";
        let params = pattern_of(src).unwrap();
        assert_eq!(args_statement(&params), lex(src));
    }

    #[rstest]
    #[case::empty_pattern("{} = args;")]
    #[case::other_variable("{a} = argv;")]
    #[case::upper_case_args("{a} = ARGS;")]
    #[case::no_semicolon("{a} = args")]
    #[case::indexing("{a[1]} = args;")]
    #[case::duplicate("{a, A} = args;")]
    #[case::rest_not_last("{@a, b} = args;")]
    #[case::two_rests("{@a, @b} = args;")]
    #[case::chained("{?x = 1} = {2} = args;")]
    fn test_not_liftable(#[case] src: &str) {
        assert_eq!(pattern_of(src), None);
    }

    #[rstest]
    #[case::bad_name(vec![Param::required("2x")], "not a valid parameter name")]
    #[case::duplicate(vec![Param::required("a"), Param::rest("a")], "declared twice")]
    #[case::rest_first(vec![Param::rest("a"), Param::required("b")], "must be the last")]
    #[case::two_rests(vec![Param::rest("a"), Param::rest("b")], "more than one")]
    #[case::empty_default(vec![Param::optional("a", Some(vec![]))], "empty default")]
    #[case::comma_default(
        vec![Param::optional("a", Some(vec![Token::Int(1), Token::Comma, Token::Int(2)]))],
        "not a single expression"
    )]
    fn test_check_params_rejects(#[case] params: Vec<Param>, #[case] message: &str) {
        let err = check_params(&params, Span::detached()).unwrap_err();
        assert!(matches!(err, MooError::TransformInvariant { .. }));
        assert!(err.to_string().contains(message), "{err}");
    }
}
