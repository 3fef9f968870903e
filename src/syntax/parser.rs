//! Recursive-descent parser for `.moo` compilation units.
//!
//! One token of lookahead drives every decision; parameter defaults scan
//! ahead to the next depth-0 `,` or `)`. Comments are skipped by the
//! structural cursor but kept when a verb body is captured. The first error
//! aborts the whole unit.

use std::collections::VecDeque;

use smol_str::SmolStr;

use crate::base::{FileId, Span};
use crate::error::{MooError, Result};

use super::ast::*;
use super::lexer::{Lexer, Spanned};
use super::token::Token;

/// Parse a complete unit: an optional `module`/`database` header followed by
/// items.
pub fn parse(source: &str, file: FileId) -> Result<CompilationUnit> {
    Parser::new(source, file).unit(true)
}

/// Parse a header-less item sequence, as found in included files.
pub fn parse_bare(source: &str, file: FileId) -> Result<CompilationUnit> {
    Parser::new(source, file).unit(false)
}

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    /// Raw tokens read ahead of the cursor, comments included.
    lookahead: VecDeque<Spanned>,
    exhausted: bool,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, file: FileId) -> Self {
        Self {
            lexer: Lexer::new(source, file),
            lookahead: VecDeque::new(),
            exhausted: false,
        }
    }

    // ------------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------------

    /// Read one more raw token into the lookahead buffer.
    fn pull(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.lexer.next() {
            Some(token) => {
                self.lookahead.push_back(token?);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }

    /// Index of the next non-comment token in the buffer, reading as needed.
    fn significant_index(&mut self) -> Result<Option<usize>> {
        let mut i = 0;
        loop {
            if i == self.lookahead.len() && !self.pull()? {
                return Ok(None);
            }
            if !self.lookahead[i].token.is_trivia() {
                return Ok(Some(i));
            }
            i += 1;
        }
    }

    fn peek(&mut self) -> Result<Option<&Spanned>> {
        Ok(match self.significant_index()? {
            Some(i) => self.lookahead.get(i),
            None => None,
        })
    }

    fn peek_token(&mut self) -> Result<Option<Token>> {
        Ok(self.peek()?.map(|s| s.token.clone()))
    }

    fn bump(&mut self, expected: &str) -> Result<Spanned> {
        if let Some(i) = self.significant_index()? {
            self.lookahead.drain(..i);
            if let Some(next) = self.lookahead.pop_front() {
                return Ok(next);
            }
        }
        Err(MooError::parse(self.lexer.eof_span(), expected, "end of file"))
    }

    /// Next raw token, comments included; `None` at end of input.
    fn bump_raw(&mut self) -> Result<Option<Spanned>> {
        if self.lookahead.is_empty() && !self.pull()? {
            return Ok(None);
        }
        Ok(self.lookahead.pop_front())
    }

    fn at(&mut self, token: &Token) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|s| &s.token == token))
    }

    fn at_word(&mut self, word: &str) -> Result<bool> {
        Ok(self.peek()?.is_some_and(|s| s.token.is_word(word)))
    }

    fn eat(&mut self, token: &Token) -> Result<bool> {
        if self.at(token)? {
            self.bump("")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_word(&mut self, word: &str) -> Result<bool> {
        if self.at_word(word)? {
            self.bump("")?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_semi(&mut self) -> Result<()> {
        self.eat(&Token::Semi).map(|_| ())
    }

    fn error_here(&mut self, expected: &str) -> MooError {
        let eof = self.lexer.eof_span();
        match self.peek() {
            Ok(Some(s)) => MooError::parse(s.span, expected, describe(&s.token)),
            Ok(None) => MooError::parse(eof, expected, "end of file"),
            Err(err) => err,
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<Span> {
        if self.at(token)? {
            return Ok(self.bump(expected)?.span);
        }
        Err(self.error_here(expected))
    }

    fn expect_word(&mut self, word: &str) -> Result<Span> {
        if self.at_word(word)? {
            return Ok(self.bump(word)?.span);
        }
        Err(self.error_here(&format!("`{word}`")))
    }

    fn ident(&mut self, expected: &str) -> Result<(SmolStr, Span)> {
        match self.peek_token()? {
            Some(Token::Ident(name)) => Ok((name, self.bump(expected)?.span)),
            _ => Err(self.error_here(expected)),
        }
    }

    fn string(&mut self, expected: &str) -> Result<(SmolStr, Span)> {
        match self.peek_token()? {
            Some(Token::Str(value)) => Ok((value, self.bump(expected)?.span)),
            _ => Err(self.error_here(expected)),
        }
    }

    fn name_or_string(&mut self, expected: &str) -> Result<SmolStr> {
        match self.peek_token()? {
            Some(Token::Ident(value)) | Some(Token::Str(value)) => {
                self.bump(expected)?;
                Ok(value)
            }
            _ => Err(self.error_here(expected)),
        }
    }

    fn signed_int(&mut self, expected: &str) -> Result<i64> {
        let negative = self.eat(&Token::Minus)?;
        match self.peek_token()? {
            Some(Token::Int(n)) => {
                self.bump(expected)?;
                Ok(if negative { -n } else { n })
            }
            _ => Err(self.error_here(expected)),
        }
    }

    // ------------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------------

    pub fn unit(&mut self, allow_header: bool) -> Result<CompilationUnit> {
        let kind = if allow_header && self.at_word("module")? {
            UnitKind::Module(self.module_header()?)
        } else if allow_header && self.at_word("database")? {
            UnitKind::Database(self.database_header()?)
        } else {
            UnitKind::Bare
        };

        let mut unit = CompilationUnit::new(kind);
        while self.peek()?.is_some() {
            self.item(&mut unit.items)?;
        }
        Ok(unit)
    }

    fn module_header(&mut self) -> Result<ModuleHeader> {
        let span = self.expect_word("module")?;
        let (name, _) = self.ident("module name")?;
        let version = if self.eat_word("version")? {
            Some(self.string("version string")?.0)
        } else {
            None
        };
        self.eat_semi()?;

        let mut header = ModuleHeader {
            name,
            version,
            requires: Vec::new(),
            exports: Vec::new(),
            span,
        };
        loop {
            if self.at_word("requires")? {
                let span = self.bump("requires")?.span;
                let (module, _) = self.ident("module name")?;
                let constraint = match self.peek_token()? {
                    Some(Token::Str(_)) => Some(self.string("version constraint")?.0),
                    _ => None,
                };
                header.requires.push(Requirement {
                    module,
                    constraint,
                    span,
                });
            } else if self.eat_word("exports")? {
                loop {
                    let (name, span) = self.local("exported `@name`")?;
                    header.exports.push(Export { name, span });
                    if !self.eat(&Token::Comma)? {
                        break;
                    }
                }
            } else {
                break;
            }
            self.eat_semi()?;
        }
        Ok(header)
    }

    fn database_header(&mut self) -> Result<DatabaseHeader> {
        let span = self.expect_word("database")?;
        let version = self.signed_int("database format version")?;
        self.eat_semi()?;

        let mut header = DatabaseHeader {
            version,
            max_object: None,
            recycled: Vec::new(),
            span,
        };
        loop {
            if self.eat_word("max_object")? {
                header.max_object = Some(self.signed_int("highest object number")?);
            } else if self.eat_word("recycled")? {
                loop {
                    self.expect(&Token::Hash, "`#`")?;
                    header.recycled.push(self.signed_int("object number")?);
                    if !self.eat(&Token::Comma)? {
                        break;
                    }
                }
            } else {
                break;
            }
            self.eat_semi()?;
        }
        Ok(header)
    }

    fn item(&mut self, items: &mut Vec<Item>) -> Result<()> {
        if self.at_word("forward")? {
            self.bump("forward")?;
            loop {
                let (name, span) = self.local("forward-declared `@name`")?;
                items.push(Item::Forward(ForwardDecl { name, span }));
                if !self.eat(&Token::Comma)? {
                    break;
                }
            }
            self.eat_semi()?;
        } else if self.at_word("include")? {
            let span = self.bump("include")?.span;
            let (path, _) = self.string("include path")?;
            items.push(Item::Include(Include { path, span }));
            self.eat_semi()?;
        } else if self.at_word("object")? {
            self.object(None, items)?;
        } else {
            return Err(self.error_here("`object`, `forward` or `include`"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    /// Parse one object and push it, followed by any nested objects, onto
    /// `out`. Nested objects get their enclosing object as parent.
    fn object(&mut self, enclosing: Option<&Reference>, out: &mut Vec<Item>) -> Result<()> {
        let span = self.expect_word("object")?;
        let id = self.object_id()?;
        let mut obj = ObjectDef::new(id);
        obj.span = span;
        obj.parent = enclosing.cloned();

        let mut nested = Vec::new();
        loop {
            let Some(next) = self.peek()? else {
                return Err(self.error_here("`endobject`"));
            };
            let clause_span = next.span;
            let Some(word) = next.token.ident().cloned() else {
                return Err(self.error_here("object clause or `endobject`"));
            };

            match word.as_str() {
                "endobject" => {
                    self.bump("endobject")?;
                    self.eat_semi()?;
                    break;
                }
                "name" => {
                    self.bump("name")?;
                    obj.name = self.string("object name string")?.0;
                }
                "owner" => {
                    self.bump("owner")?;
                    obj.owner = Some(self.reference()?);
                }
                "parent" => {
                    if enclosing.is_some() {
                        return Err(MooError::parse(
                            clause_span,
                            "no `parent` clause in a nested object",
                            "`parent`",
                        ));
                    }
                    self.bump("parent")?;
                    obj.parent = Some(self.reference()?);
                }
                "location" => {
                    self.bump("location")?;
                    obj.location = Some(self.reference()?);
                }
                "flags" => {
                    self.bump("flags")?;
                    loop {
                        let (word, span) = self.ident("object flag")?;
                        let flag = ObjectFlag::from_keyword(&word).ok_or_else(|| {
                            MooError::parse(span, "object flag", format!("`{word}`"))
                        })?;
                        if !obj.flags.contains(&flag) {
                            obj.flags.push(flag);
                        }
                        if !self.eat(&Token::Comma)? {
                            break;
                        }
                    }
                }
                "property" => {
                    let prop = self.property()?;
                    obj.properties.push(prop);
                }
                "method" => {
                    let verb = self.method()?;
                    obj.verbs.push(verb);
                }
                "command" => {
                    let verb = self.command()?;
                    obj.verbs.push(verb);
                }
                "object" => {
                    let parent = obj.id.clone();
                    self.object(Some(&parent), &mut nested)?;
                    continue;
                }
                _ => return Err(self.error_here("object clause or `endobject`")),
            }
            self.eat_semi()?;
        }

        out.push(Item::Object(obj));
        out.append(&mut nested);
        Ok(())
    }

    fn object_id(&mut self) -> Result<Reference> {
        match self.peek_token()? {
            Some(Token::At) => Ok(Reference::Local(self.local("`@name`")?.0)),
            Some(Token::Hash) => {
                self.bump("#")?;
                Ok(Reference::ObjectNumber(self.signed_int("object number")?))
            }
            _ => Err(self.error_here("object id (`@name` or `#number`)")),
        }
    }

    fn local(&mut self, expected: &str) -> Result<(SmolStr, Span)> {
        let span = self.expect(&Token::At, expected)?;
        let (name, _) = self.ident(expected)?;
        Ok((name, span))
    }

    pub(crate) fn reference(&mut self) -> Result<Reference> {
        const EXPECTED: &str = "object reference";
        match self.peek_token()? {
            Some(Token::Hash) => {
                self.bump(EXPECTED)?;
                Ok(Reference::ObjectNumber(self.signed_int("object number")?))
            }
            Some(Token::Dollar) => {
                self.bump(EXPECTED)?;
                let (name, _) = self.ident("system name after `$`")?;
                Ok(match Builtin::from_name(&name) {
                    Some(builtin) => Reference::Builtin(builtin),
                    None => Reference::Symbolic(name),
                })
            }
            Some(Token::At) => Ok(Reference::Local(self.local(EXPECTED)?.0)),
            Some(Token::Ident(module)) => {
                self.bump(EXPECTED)?;
                self.expect(&Token::ColonColon, "`::` in qualified reference")?;
                let (name, _) = self.ident("exported name")?;
                Ok(Reference::Qualified { module, name })
            }
            _ => Err(self.error_here(EXPECTED)),
        }
    }

    fn value(&mut self) -> Result<Value> {
        const EXPECTED: &str = "value";
        match self.peek_token()? {
            Some(Token::Minus) => {
                self.bump(EXPECTED)?;
                match self.peek_token()? {
                    Some(Token::Int(n)) => {
                        self.bump(EXPECTED)?;
                        Ok(Value::Int(-n))
                    }
                    Some(Token::Float(x)) => {
                        self.bump(EXPECTED)?;
                        Ok(Value::Float(-x))
                    }
                    _ => Err(self.error_here("number after `-`")),
                }
            }
            Some(Token::Int(n)) => {
                self.bump(EXPECTED)?;
                Ok(Value::Int(n))
            }
            Some(Token::Float(x)) => {
                self.bump(EXPECTED)?;
                Ok(Value::Float(x))
            }
            Some(Token::Str(s)) => {
                self.bump(EXPECTED)?;
                Ok(Value::Str(s))
            }
            Some(Token::LBrace) => {
                self.bump(EXPECTED)?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBrace)? {
                    loop {
                        items.push(self.value()?);
                        if self.eat(&Token::Comma)? {
                            continue;
                        }
                        self.expect(&Token::RBrace, "`,` or `}`")?;
                        break;
                    }
                }
                Ok(Value::List(items))
            }
            Some(Token::LBracket) => {
                self.bump(EXPECTED)?;
                let mut pairs = Vec::new();
                if !self.eat(&Token::RBracket)? {
                    loop {
                        let key = self.value()?;
                        self.expect(&Token::Arrow, "`->`")?;
                        pairs.push((key, self.value()?));
                        if self.eat(&Token::Comma)? {
                            continue;
                        }
                        self.expect(&Token::RBracket, "`,` or `]`")?;
                        break;
                    }
                }
                Ok(Value::Map(pairs))
            }
            Some(Token::Ident(word)) if is_error_code(&word) => {
                if self.ident_followed_by_path()? {
                    return Ok(Value::Ref(self.reference()?));
                }
                self.bump(EXPECTED)?;
                Ok(Value::Error(word))
            }
            Some(Token::Hash | Token::Dollar | Token::At | Token::Ident(_)) => {
                Ok(Value::Ref(self.reference()?))
            }
            _ => Err(self.error_here(EXPECTED)),
        }
    }

    /// Whether the identifier under the cursor is followed by `::`.
    fn ident_followed_by_path(&mut self) -> Result<bool> {
        let Some(first) = self.significant_index()? else {
            return Ok(false);
        };
        let mut i = first + 1;
        loop {
            if i == self.lookahead.len() && !self.pull()? {
                return Ok(false);
            }
            let token = &self.lookahead[i].token;
            if !token.is_trivia() {
                return Ok(*token == Token::ColonColon);
            }
            i += 1;
        }
    }

    // ------------------------------------------------------------------------
    // Properties & verbs
    // ------------------------------------------------------------------------

    fn property(&mut self) -> Result<PropertyDef> {
        let span = self.expect_word("property")?;
        let name = self.name_or_string("property name")?;
        let (flags, owner) = self.attributes(PropertyFlag::from_keyword, "property flag")?;

        let value = if self.eat(&Token::Eq)? {
            PropertyValue::Literal(self.value()?)
        } else if self.eat_word("inherited")? {
            if self.eat(&Token::Eq)? {
                PropertyValue::Inherited(Some(self.value()?))
            } else {
                PropertyValue::Inherited(None)
            }
        } else if self.eat_word("clear")? {
            PropertyValue::Clear
        } else {
            return Err(self.error_here("`=`, `inherited` or `clear`"));
        };

        Ok(PropertyDef {
            name,
            flags,
            owner,
            value,
            span,
        })
    }

    /// Optional `[flag, flag, owner = ref]` list.
    fn attributes<F: PartialEq>(
        &mut self,
        flag: impl Fn(&str) -> Option<F>,
        what: &str,
    ) -> Result<(Vec<F>, Option<Reference>)> {
        let mut flags = Vec::new();
        let mut owner = None;
        if !self.eat(&Token::LBracket)? {
            return Ok((flags, owner));
        }
        if self.eat(&Token::RBracket)? {
            return Ok((flags, owner));
        }
        loop {
            let (word, span) = self.ident(what)?;
            if word == "owner" {
                self.expect(&Token::Eq, "`=` after `owner`")?;
                owner = Some(self.reference()?);
            } else {
                let parsed = flag(&word)
                    .ok_or_else(|| MooError::parse(span, what, format!("`{word}`")))?;
                if !flags.contains(&parsed) {
                    flags.push(parsed);
                }
            }
            if self.eat(&Token::Comma)? {
                continue;
            }
            self.expect(&Token::RBracket, "`,` or `]`")?;
            return Ok((flags, owner));
        }
    }

    fn method(&mut self) -> Result<VerbDef> {
        let span = self.expect_word("method")?;
        let mut names = vec![self.name_or_string("method name")?];
        while self.eat(&Token::Comma)? {
            names.push(self.name_or_string("method name")?);
        }
        let params = if self.at(&Token::LParen)? {
            self.params()?
        } else {
            Vec::new()
        };
        let (flags, owner) = self.attributes(VerbFlag::from_keyword, "verb flag")?;
        let body = self.body("endmethod")?;
        Ok(VerbDef {
            kind: VerbKind::Method { names, params },
            flags,
            owner,
            body,
            span,
        })
    }

    fn command(&mut self) -> Result<VerbDef> {
        let span = self.expect_word("command")?;
        let mut patterns = vec![self.string("command pattern string")?.0];
        while self.eat(&Token::Comma)? {
            patterns.push(self.string("command pattern string")?.0);
        }

        self.expect(&Token::LParen, "`(` before argument specifiers")?;
        let dobj = self.arg_spec()?;
        self.expect(&Token::Comma, "`,`")?;
        let (word, prep_span) = self.ident("preposition")?;
        let prep = Preposition::from_keyword(&word)
            .ok_or_else(|| MooError::parse(prep_span, "preposition", format!("`{word}`")))?;
        self.expect(&Token::Comma, "`,`")?;
        let iobj = self.arg_spec()?;
        self.expect(&Token::RParen, "`)`")?;

        let (flags, owner) = self.attributes(VerbFlag::from_keyword, "verb flag")?;
        let body = self.body("endcommand")?;
        Ok(VerbDef {
            kind: VerbKind::Command {
                patterns,
                dobj,
                prep,
                iobj,
            },
            flags,
            owner,
            body,
            span,
        })
    }

    fn arg_spec(&mut self) -> Result<ArgSpec> {
        let (word, span) = self.ident("`this`, `any` or `none`")?;
        ArgSpec::from_keyword(&word)
            .ok_or_else(|| MooError::parse(span, "`this`, `any` or `none`", format!("`{word}`")))
    }

    fn params(&mut self) -> Result<Vec<Param>> {
        self.expect(&Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.eat(&Token::RParen)? {
            return Ok(params);
        }
        loop {
            let param = if self.eat(&Token::Question)? {
                let (name, _) = self.ident("parameter name")?;
                let default = if self.eat(&Token::Eq)? {
                    Some(self.default_tokens()?)
                } else {
                    None
                };
                Param::optional(name, default)
            } else if self.eat(&Token::At)? {
                Param::rest(self.ident("parameter name")?.0)
            } else {
                Param::required(self.ident("parameter name")?.0)
            };
            params.push(param);

            if self.eat(&Token::Comma)? {
                continue;
            }
            self.expect(&Token::RParen, "`,` or `)`")?;
            return Ok(params);
        }
    }

    /// Tokens of a default expression, up to the next depth-0 `,` or `)`.
    fn default_tokens(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek_token()? {
                Some(Token::Comma | Token::RParen) if depth == 0 => break,
                Some(token) => {
                    match token {
                        Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                        Token::RParen | Token::RBracket | Token::RBrace => {
                            depth = depth.saturating_sub(1)
                        }
                        _ => {}
                    }
                    self.bump("default value")?;
                    tokens.push(token);
                }
                None => return Err(self.error_here("`,` or `)`")),
            }
        }
        if tokens.is_empty() {
            return Err(self.error_here("default value"));
        }
        Ok(tokens)
    }

    /// Capture raw tokens up to the closing keyword.
    fn body(&mut self, terminator: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.bump_raw()? {
                Some(spanned) if matches!(&spanned.token, Token::Ident(w) if w == terminator) => {
                    return Ok(tokens);
                }
                Some(spanned) => tokens.push(spanned.token),
                None => {
                    return Err(MooError::parse(
                        self.lexer.eof_span(),
                        format!("`{terminator}`"),
                        "end of file",
                    ));
                }
            }
        }
    }
}

fn is_error_code(word: &str) -> bool {
    word.len() > 2 && word.starts_with("E_")
}

fn describe(token: &Token) -> String {
    match token {
        Token::Str(_) => "string literal".to_string(),
        Token::Int(_) | Token::Float(_) => format!("number `{token}`"),
        other => format!("`{other}`"),
    }
}
