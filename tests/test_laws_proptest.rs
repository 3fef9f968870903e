//! Property-based round trips.
//!
//! - verb code: `internalize(externalize(b)) == b` for internal code and
//!   `externalize(internalize(e, s)) == (s, e)` for external code
//! - source text: `parse(unparse(parse(t))) == parse(t)`
//!
//! Programs are generated as source text and lexed, so the generators only
//! produce token streams the lexer can actually yield.
#![cfg(feature = "proptest")]

use moosrc::FileId;
use moosrc::syntax::{Param, Token, parse, tokenize, unparse};
use moosrc::transform::{externalize, internalize};
use proptest::prelude::*;

fn lex(src: &str) -> Vec<Token> {
    tokenize(src, FileId::new(0))
        .unwrap_or_else(|e| panic!("{e}\n{src}"))
        .into_iter()
        .map(|s| s.token)
        .collect()
}

// ============================================================================
// VERB CODE STRATEGIES
// ============================================================================

fn arb_var() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("x"), Just("count"), Just("who"), Just("result")]
}

fn arb_simple() -> impl Strategy<Value = String> {
    prop_oneof![
        (arb_var(), -50i64..50).prop_map(|(v, n)| format!("{v} = {n};")),
        arb_var().prop_map(|v| format!("return {v};")),
        arb_var().prop_map(|v| format!("player:tell(\"hi \", {v}, this.name);")),
        (arb_var(), arb_var()).prop_map(|(a, b)| format!("{a} = {{{b}, @args}}[1..$];")),
        Just("`x.y ! E_PROPNF => 0';".to_string()),
    ]
}

/// Bare string statements: single-line ones become `//` comments.
fn arb_doc_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z ]{0,10}".prop_map(|s| format!("\"{s}\";")),
        Just("\"two\nlines\";".to_string()),
        Just("\"\";".to_string()),
    ]
}

fn arb_internal_statements() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![3 => arb_simple(), 1 => arb_doc_string()];
    leaf.prop_recursive(3, 24, 4, |inner| {
        let block = proptest::collection::vec(inner, 0..4).prop_map(|v| v.join(" "));
        prop_oneof![
            (arb_var(), block.clone()).prop_map(|(v, b)| format!("if ({v}) {b} endif")),
            (arb_var(), block.clone(), block.clone())
                .prop_map(|(v, a, b)| format!("if ({v}) {a} elseif (!{v}) {b} else {a} endif")),
            (arb_var(), block.clone())
                .prop_map(|(v, b)| format!("while loop ({v}) {b} break loop; endwhile")),
            (arb_var(), block.clone()).prop_map(|(v, b)| format!("for {v} in [1..10] {b} endfor")),
            (block.clone(), block.clone()).prop_map(|(a, b)| {
                format!("try {a} except e (E_PERM, E_INVARG) {b} finally {a} endtry")
            }),
            block.prop_map(|b| format!("fork (0) {b} endfork")),
        ]
    })
}

fn arb_internal_body() -> impl Strategy<Value = String> {
    let prefix = prop_oneof![
        Just(""),
        Just("{who} = args; "),
        Just("{who, ?how = {1, \"a\"}, @rest} = args; "),
        Just("{} = args; "),
        Just("{a, a} = args; "),
    ];
    (prefix, proptest::collection::vec(arb_internal_statements(), 0..6))
        .prop_map(|(p, stmts)| format!("{p}{}", stmts.join(" ")))
}

/// External statements: comments instead of single-line strings.
fn arb_external_statements() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        3 => arb_simple(),
        1 => "[a-z][a-z ]{0,10}[a-z]".prop_map(|s| format!("// {s}\n")),
        1 => Just("\"kept\nas a string\";".to_string()),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        let block = proptest::collection::vec(inner, 0..4).prop_map(|v| v.join(" "));
        prop_oneof![
            (arb_var(), block.clone()).prop_map(|(v, b)| format!("if ({v}) {b} endif")),
            block.prop_map(|b| format!("fork (5) {b} endfork")),
        ]
    })
}

fn arb_signature() -> impl Strategy<Value = Vec<Param>> {
    let kind = prop_oneof![Just(0u8), Just(1u8), Just(2u8)];
    (proptest::collection::vec(kind, 0..4), any::<bool>()).prop_map(|(kinds, rest)| {
        let mut params: Vec<Param> = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| {
                let name = format!("p{i}");
                match kind {
                    0 => Param::required(name),
                    1 => Param::optional(name, None),
                    _ => Param::optional(name, Some(lex("[\"k\" -> {1, 2}]"))),
                }
            })
            .collect();
        if rest {
            params.push(Param::rest("rest"));
        }
        params
    })
}

// ============================================================================
// SOURCE STRATEGIES
// ============================================================================

fn arb_value() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(|n| n.to_string()),
        (-1000i32..1000, 0u8..100).prop_map(|(a, b)| format!("{a}.{b}")),
        "[a-zA-Z0-9 \"\\\\]{0,10}".prop_map(|s| moosrc::syntax::token::quote(&s)),
        (0i64..20).prop_map(|n| format!("#{n}")),
        Just("$nothing".to_string()),
        Just("$player_db".to_string()),
        Just("E_PERM".to_string()),
        Just("@a".to_string()),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(|v| format!("{{{}}}", v.join(", "))),
            proptest::collection::vec((inner.clone(), inner), 0..3).prop_map(|pairs| {
                let items: Vec<_> = pairs.iter().map(|(k, v)| format!("{k} -> {v}")).collect();
                format!("[{}]", items.join(", "))
            }),
        ]
    })
}

fn arb_unit_source() -> impl Strategy<Value = String> {
    let object = (
        "[A-Za-z ]{0,12}",
        proptest::collection::vec(arb_value(), 0..4),
        arb_internal_body(),
        any::<bool>(),
    );
    proptest::collection::vec(object, 1..4).prop_map(|objects| {
        let mut src = String::from("module gen version \"0.1.0\";\nexports @a;\n");
        for (i, (name, values, body, nested)) in objects.into_iter().enumerate() {
            let id = if i == 0 { "@a".to_string() } else { format!("@o{i}") };
            src.push_str(&format!("object {id}\n  name \"{name}\";\n"));
            for (j, value) in values.iter().enumerate() {
                src.push_str(&format!("  property p{j} [readable] = {value};\n"));
            }
            src.push_str(&format!("  method \"run*\", go [executable]\n    {body}\n  endmethod\n"));
            if nested {
                src.push_str(&format!("  object @n{i}\n    property q inherited;\n  endobject\n"));
            }
            src.push_str("endobject\n");
        }
        src
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn internal_code_survives_externalize(body in arb_internal_body()) {
        let internal = lex(&body);
        let (params, external) = externalize(&internal);
        let back = internalize(&external, &params).unwrap_or_else(|e| panic!("{e}\n{body}"));
        prop_assert_eq!(back, internal);
    }

    #[test]
    fn external_code_survives_internalize(
        signature in arb_signature(),
        stmts in proptest::collection::vec(arb_external_statements(), 0..6),
    ) {
        let external = lex(&stmts.join(" "));
        let internal = internalize(&external, &signature).unwrap_or_else(|e| panic!("{e}"));
        prop_assert_eq!(externalize(&internal), (signature, external));
    }

    #[test]
    fn unparse_then_parse_is_stable(src in arb_unit_source()) {
        let unit = parse(&src, FileId::new(0)).unwrap_or_else(|e| panic!("{e}\n{src}"));
        let text = unparse(&unit);
        let again = parse(&text, FileId::new(1)).unwrap_or_else(|e| panic!("{e}\n{text}"));
        prop_assert_eq!(again, unit, "{}", text);
    }
}
