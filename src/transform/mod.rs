//! Conversion between the two forms of verb code.
//!
//! The *internal* form is what a MOO server stores: a method opens with a
//! `{who, ?how = 1, @rest} = args;` statement and documents itself with bare
//! string statements. The *external* form is what `.moo` files hold: the
//! argument pattern lives in the method signature and documentation is
//! written as `//` comments.
//!
//! Only statement boundaries are examined. Loops, labels, `try`/`except`,
//! `fork` and every expression are copied token for token in both
//! directions, so for a body `b` and signature `s`:
//!
//! ```text
//! internalize(externalize(b)) == b
//! externalize(internalize(b, s)) == (s, b)
//! ```

mod args;

use smol_str::SmolStr;

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::syntax::ast::{Param, VerbDef, VerbKind};
use crate::syntax::statements::{Statement, statements};
use crate::syntax::token::Token;

use args::{args_pattern, args_statement, check_params};

/// Internal method code to a signature and external body.
pub fn externalize(tokens: &[Token]) -> (Vec<Param>, Vec<Token>) {
    let stmts = statements(tokens);
    match stmts.first().copied().and_then(args_pattern) {
        Some(params) => {
            tracing::trace!(params = params.len(), "lifted args statement into signature");
            (params, comments_from_strings(&stmts[1..]))
        }
        None => (Vec::new(), comments_from_strings(&stmts)),
    }
}

/// Internal command code to external form; the args statement stays put.
pub fn externalize_body(tokens: &[Token]) -> Vec<Token> {
    comments_from_strings(&statements(tokens))
}

/// External method body and signature to internal code.
pub fn internalize(body: &[Token], params: &[Param]) -> Result<Vec<Token>> {
    lower(body, Some(params), Span::detached())
}

/// External command body to internal code.
pub fn internalize_body(body: &[Token]) -> Result<Vec<Token>> {
    lower(body, None, Span::detached())
}

/// Internal code for a parsed verb, with errors reported at the verb.
pub fn internalize_verb(verb: &VerbDef) -> Result<Vec<Token>> {
    match &verb.kind {
        VerbKind::Method { params, .. } => lower(&verb.body, Some(params), verb.span),
        VerbKind::Command { .. } => lower(&verb.body, None, verb.span),
    }
}

fn lower(body: &[Token], params: Option<&[Param]>, span: Span) -> Result<Vec<Token>> {
    let stmts = statements(body);
    let mut out = Vec::with_capacity(body.len());

    match params {
        Some([]) => {
            if stmts.first().copied().and_then(args_pattern).is_some() {
                return Err(MooError::transform(
                    span,
                    "body begins with an `args` unpacking statement but the signature is empty",
                ));
            }
        }
        Some(params) => {
            check_params(params, span)?;
            out.extend(args_statement(params));
        }
        None => {}
    }

    for statement in stmts {
        match statement {
            Statement::Comment(text) => {
                if !fits_comment(text) {
                    return Err(MooError::transform(
                        span,
                        format!("comment {text:?} cannot be written as a `//` line"),
                    ));
                }
                out.push(Token::Str(text.clone()));
                out.push(Token::Semi);
            }
            other => {
                if other.tokens().iter().any(Token::is_trivia) {
                    return Err(MooError::transform(span, "comment inside a statement"));
                }
                out.extend_from_slice(other.tokens());
            }
        }
    }
    Ok(out)
}

fn comments_from_strings(stmts: &[Statement<'_>]) -> Vec<Token> {
    let mut out = Vec::new();
    for statement in stmts.iter().copied() {
        match statement {
            Statement::Simple([Token::Str(text), Token::Semi]) if fits_comment(text) => {
                out.push(Token::Comment(text.clone()));
            }
            Statement::Comment(text) => out.push(Token::Comment(text.clone())),
            other => out.extend_from_slice(other.tokens()),
        }
    }
    out
}

/// Whether `text` survives being printed as `// text` and read back.
fn fits_comment(text: &SmolStr) -> bool {
    !text.contains('\n') && text.trim_end() == text.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::syntax::lexer::tokenize;
    use crate::syntax::parser::parse;

    fn lex(src: &str) -> Vec<Token> {
        tokenize(src, FileId::new(0))
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_greet_internalizes_with_args_statement() {
        let unit = parse(
            "object @a\nmethod greet(who, ?greeting = \"Hello\")\n  player:tell(greeting);\nendmethod\nendobject",
            FileId::new(0),
        )
        .unwrap();
        let verb = &unit.objects().next().unwrap().verbs[0];
        let internal = internalize_verb(verb).unwrap();
        assert_eq!(
            internal,
            lex("{who, ?greeting = \"Hello\"} = args; player:tell(greeting);")
        );
        let stmts = statements(&internal);
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_externalize_lifts_pattern_and_comments() {
        let internal = lex(
            "{who, @rest} = args; \"Greets someone.\"; \"Multi\nline\"; player:tell(who); \"trailing note\";",
        );
        let (params, external) = externalize(&internal);
        assert_eq!(params, vec![Param::required("who"), Param::rest("rest")]);
        assert_eq!(external[0], Token::Comment("Greets someone.".into()));
        assert_eq!(external[1], Token::Str("Multi\nline".into()));
        assert_eq!(external.last(), Some(&Token::Comment("trailing note".into())));
    }

    #[test]
    fn test_control_flow_is_copied_verbatim() {
        let internal = lex(
            r#""Loop over things.";
               while outer (1)
                 for x in [1..3]
                   if (x == 2) break outer; endif
                 endfor
                 fork t (5) z(); endfork
                 try z(); except e (E_PERM, E_INVARG) continue outer; finally w(); endtry
               endwhile"#,
        );
        let (params, external) = externalize(&internal);
        assert!(params.is_empty());
        assert_eq!(external[0], Token::Comment("Loop over things.".into()));
        assert_eq!(&external[1..], &internal[2..]);
    }

    #[test]
    fn test_laws_hold_both_ways() {
        let internal = lex(
            r#"{a, ?b = {1, "x"}, @c} = args; "doc"; if (a) return b; endif "mid"; return c;"#,
        );
        let (params, external) = externalize(&internal);
        assert_eq!(internalize(&external, &params).unwrap(), internal);

        let external = lex("// doc\nreturn a; // done");
        let params = vec![Param::required("a"), Param::optional("b", None)];
        let internal = internalize(&external, &params).unwrap();
        assert_eq!(externalize(&internal), (params, external));
    }

    #[test]
    fn test_commands_keep_args_statement() {
        let internal = lex("{x} = args; \"note\"; return x;");
        let external = externalize_body(&internal);
        assert_eq!(&external[..6], &internal[..6]);
        assert_eq!(external[6], Token::Comment("note".into()));
        assert_eq!(internalize_body(&external).unwrap(), internal);
    }

    #[test]
    fn test_empty_signature_rejects_args_statement() {
        let err = internalize(&lex("{a} = args; return a;"), &[]).unwrap_err();
        assert!(matches!(err, MooError::TransformInvariant { .. }), "{err}");
        assert!(internalize(&lex("{} = args; return;"), &[]).is_ok());
    }

    #[test]
    fn test_comment_inside_statement_is_rejected() {
        let err = internalize_body(&lex("x = // why\n 1;")).unwrap_err();
        assert!(err.to_string().contains("comment inside a statement"), "{err}");
    }

    #[test]
    fn test_invalid_signature_is_rejected() {
        let params = vec![Param::rest("a"), Param::required("b")];
        assert!(internalize(&lex("return;"), &params).is_err());
    }
}
