//! Canonical text for compilation units.
//!
//! The printer always emits flat mode: one `object` block per object with
//! explicit `parent` clauses. Reparsing the output yields a tree equal to the
//! input. Verb bodies are laid out one statement per line and indented by
//! control structure; the token sequence is preserved exactly.

use logos::Logos;

use super::ast::*;
use super::keywords::{HEADER, is_identifier, is_plain_verb_name};
use super::statements::{Statement, statements};
use super::token::{Token, quote};

#[derive(Clone, Debug)]
pub struct PrintOptions {
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

pub fn unparse(unit: &CompilationUnit) -> String {
    unparse_with(unit, &PrintOptions::default())
}

pub fn unparse_with(unit: &CompilationUnit, options: &PrintOptions) -> String {
    let mut printer = Printer {
        out: String::new(),
        options,
    };
    printer.unit(unit);
    printer.out
}

struct Printer<'a> {
    out: String,
    options: &'a PrintOptions,
}

impl Printer<'_> {
    fn line(&mut self, level: usize, text: &str) {
        if !text.is_empty() {
            self.out.push_str(&" ".repeat(self.options.indent * level));
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn unit(&mut self, unit: &CompilationUnit) {
        match &unit.kind {
            UnitKind::Module(header) => {
                let mut first = format!("module {}", header.name);
                if let Some(version) = &header.version {
                    first.push_str(&format!(" version {}", quote(version)));
                }
                self.line(0, &format!("{first};"));
                for req in &header.requires {
                    match &req.constraint {
                        Some(c) => self.line(0, &format!("requires {} {};", req.module, quote(c))),
                        None => self.line(0, &format!("requires {};", req.module)),
                    }
                }
                if !header.exports.is_empty() {
                    let names: Vec<_> = header.exports.iter().map(|e| format!("@{}", e.name)).collect();
                    self.line(0, &format!("exports {};", names.join(", ")));
                }
            }
            UnitKind::Database(header) => {
                self.line(0, &format!("database {};", header.version));
                if let Some(max) = header.max_object {
                    self.line(0, &format!("max_object {max};"));
                }
                if !header.recycled.is_empty() {
                    let numbers: Vec<_> = header.recycled.iter().map(|n| format!("#{n}")).collect();
                    self.line(0, &format!("recycled {};", numbers.join(", ")));
                }
            }
            UnitKind::Bare => {}
        }

        let mut separate = !matches!(unit.kind, UnitKind::Bare);
        let mut items = unit.items.iter().peekable();
        while let Some(item) = items.next() {
            if separate {
                self.line(0, "");
            }
            separate = true;
            match item {
                Item::Forward(decl) => {
                    let mut names = vec![format!("@{}", decl.name)];
                    while let Some(Item::Forward(next)) = items.peek() {
                        names.push(format!("@{}", next.name));
                        items.next();
                    }
                    self.line(0, &format!("forward {};", names.join(", ")));
                }
                Item::Include(include) => {
                    self.line(0, &format!("include {};", quote(&include.path)));
                    while let Some(Item::Include(next)) = items.peek() {
                        self.line(0, &format!("include {};", quote(&next.path)));
                        items.next();
                    }
                }
                Item::Object(obj) => self.object(obj),
            }
        }
    }

    fn object(&mut self, obj: &ObjectDef) {
        self.line(0, &format!("object {}", obj.id));
        if !obj.name.is_empty() {
            self.line(1, &format!("name {};", quote(&obj.name)));
        }
        for (keyword, reference) in [
            ("owner", &obj.owner),
            ("parent", &obj.parent),
            ("location", &obj.location),
        ] {
            if let Some(r) = reference {
                self.line(1, &format!("{keyword} {r};"));
            }
        }
        if !obj.flags.is_empty() {
            let flags: Vec<_> = obj.flags.iter().map(|f| f.keyword()).collect();
            self.line(1, &format!("flags {};", flags.join(", ")));
        }
        for prop in &obj.properties {
            self.line(1, &property(prop));
        }
        for verb in &obj.verbs {
            self.line(0, "");
            self.verb(verb);
        }
        self.line(0, "endobject");
    }

    fn verb(&mut self, verb: &VerbDef) {
        let starts_with_bracket = verb
            .body
            .iter()
            .find(|t| !t.is_trivia())
            .is_some_and(|t| *t == Token::LBracket);
        let mut attrs = attributes(&verb.flags, |f| f.keyword(), &verb.owner);
        if attrs.is_empty() && starts_with_bracket {
            attrs = " []".to_string();
        }

        let terminator = match &verb.kind {
            VerbKind::Method { names, params } => {
                let names: Vec<_> = names.iter().map(|n| verb_name(n)).collect();
                let params: Vec<_> = params.iter().map(param).collect();
                self.line(
                    1,
                    &format!("method {}({}){attrs}", names.join(", "), params.join(", ")),
                );
                "endmethod"
            }
            VerbKind::Command {
                patterns,
                dobj,
                prep,
                iobj,
            } => {
                let patterns: Vec<_> = patterns.iter().map(|p| quote(p)).collect();
                self.line(
                    1,
                    &format!(
                        "command {} ({}, {}, {}){attrs}",
                        patterns.join(", "),
                        dobj.keyword(),
                        prep.keyword(),
                        iobj.keyword()
                    ),
                );
                "endcommand"
            }
        };
        for line in render_body(&verb.body, self.options, 2) {
            self.out.push_str(&line);
            self.out.push('\n');
        }
        self.line(1, terminator);
    }
}

fn property(prop: &PropertyDef) -> String {
    let name = if is_identifier(&prop.name) {
        prop.name.to_string()
    } else {
        quote(&prop.name)
    };
    let attrs = attributes(&prop.flags, |f| f.keyword(), &prop.owner);
    let value = match &prop.value {
        PropertyValue::Literal(v) => format!("= {v}"),
        PropertyValue::Inherited(Some(v)) => format!("inherited = {v}"),
        PropertyValue::Inherited(None) => "inherited".to_string(),
        PropertyValue::Clear => "clear".to_string(),
    };
    format!("property {name}{attrs} {value};")
}

fn attributes<F: Copy>(
    flags: &[F],
    keyword: impl Fn(F) -> &'static str,
    owner: &Option<Reference>,
) -> String {
    let mut parts: Vec<String> = flags.iter().map(|f| keyword(*f).to_string()).collect();
    if let Some(owner) = owner {
        parts.push(format!("owner = {owner}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" [{}]", parts.join(", "))
    }
}

fn verb_name(name: &str) -> String {
    if is_plain_verb_name(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

fn param(param: &Param) -> String {
    match &param.kind {
        ParamKind::Required => param.name.to_string(),
        ParamKind::Optional(None) => format!("?{}", param.name),
        ParamKind::Optional(Some(default)) => {
            format!("?{} = {}", param.name, join_tokens(default))
        }
        ParamKind::Rest => format!("@{}", param.name),
    }
}

// ============================================================================
// VERB CODE LAYOUT
// ============================================================================

/// Lay out a verb body as indented lines, starting at `depth` levels.
pub fn render_body(tokens: &[Token], options: &PrintOptions, depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut level = depth;
    let outdent = |level: usize| level.saturating_sub(1).max(depth);

    for statement in statements(tokens) {
        let keyword = statement.keyword();
        let (here, after) = match (&statement, keyword.as_deref()) {
            (Statement::Header(_), Some("elseif" | "except")) => (outdent(level), level),
            (Statement::Header(_), _) => (level, level + 1),
            (Statement::Block(_), Some("else" | "finally")) => (outdent(level), level),
            (Statement::Block(_), Some("try")) => (level, level + 1),
            (Statement::Block(_), _) => (outdent(level), outdent(level)),
            _ => (level, level),
        };

        let text = match statement {
            Statement::Comment(text) => vec![Token::Comment(text.clone()).to_string()],
            other => layout(other.tokens()),
        };
        for (i, piece) in text.into_iter().enumerate() {
            let indent = if i == 0 { here } else { here + 1 };
            lines.push(format!("{}{piece}", " ".repeat(options.indent * indent)));
        }
        level = after;
    }
    lines
}

/// Join tokens on one line with conventional spacing.
pub fn join_tokens(tokens: &[Token]) -> String {
    layout(tokens).join(" ")
}

/// Tokens as text lines; a comment always ends its line.
fn layout(tokens: &[Token]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut before: Option<&Token> = None;
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            if spaced(before, p, token) || fuses(p, token) {
                line.push(' ');
            }
        }
        line.push_str(&token.to_string());
        if token.is_trivia() {
            lines.push(std::mem::take(&mut line));
            before = None;
            prev = None;
        } else {
            before = prev;
            prev = Some(token);
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

fn is_keyword(word: &str) -> bool {
    HEADER
        .iter()
        .chain(&["in", "return", "else"])
        .any(|k| k.eq_ignore_ascii_case(word))
}

/// Whether `token` can end an operand, making a following `-` binary.
fn ends_operand(token: Option<&Token>) -> bool {
    match token {
        Some(Token::Ident(word)) => !is_keyword(word),
        Some(
            Token::Int(_)
            | Token::Float(_)
            | Token::Str(_)
            | Token::RParen
            | Token::RBracket
            | Token::RBrace
            | Token::Quote,
        ) => true,
        _ => false,
    }
}

fn spaced(before: Option<&Token>, prev: &Token, next: &Token) -> bool {
    use Token::*;
    if matches!(next, RParen | RBracket | RBrace | Comma | Semi | Colon | DotDot | Quote) {
        return false;
    }
    if matches!(prev, LParen | LBracket | LBrace | Hash | Dollar | At | Tilde | Colon | Dot | DotDot | Backtick)
    {
        return false;
    }
    if *next == Dot {
        return matches!(prev, Int(_) | Float(_));
    }
    if matches!(next, LParen | LBracket) {
        return !ends_operand(Some(prev)) || matches!(prev, Int(_) | Float(_) | Quote);
    }
    if matches!(prev, Minus | Bang) && !ends_operand(before) {
        return false;
    }
    if *prev == Question && matches!(before, Some(LBrace | Comma)) {
        return false;
    }
    true
}

/// Whether writing `next` directly after `prev` would lex differently.
fn fuses(prev: &Token, next: &Token) -> bool {
    let text = format!("{prev}{next}");
    let mut lexed = Token::lexer(&text);
    let first = lexed.next();
    let second = lexed.next();
    let rest = lexed.next();
    !(first.as_ref() == Some(&Ok(prev.clone()))
        && second.as_ref() == Some(&Ok(next.clone()))
        && rest.is_none())
}
