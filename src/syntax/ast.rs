//! Abstract syntax tree for `.moo` compilation units.
//!
//! The tree is always flat: hierarchy-mode nesting is desugared by the parser
//! into sibling objects with a synthesized `parent`. Every node that can be
//! the subject of an error carries a [`Span`]; spans never affect equality.

use std::fmt;

use smol_str::SmolStr;

use crate::base::Span;

use super::token::{Token, quote};

// ============================================================================
// UNITS
// ============================================================================

/// The root of one parsed (or packed, or decompiled) source tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilationUnit {
    pub kind: UnitKind,
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UnitKind {
    Module(ModuleHeader),
    Database(DatabaseHeader),
    /// A bare item sequence: included files and header-less sources.
    Bare,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleHeader {
    pub name: SmolStr,
    pub version: Option<SmolStr>,
    pub requires: Vec<Requirement>,
    pub exports: Vec<Export>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Requirement {
    pub module: SmolStr,
    /// Raw constraint text such as `>=1.2.0`; parsed by the resolver.
    pub constraint: Option<SmolStr>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Export {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DatabaseHeader {
    pub version: i64,
    pub max_object: Option<i64>,
    pub recycled: Vec<i64>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Forward(ForwardDecl),
    Include(Include),
    Object(ObjectDef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForwardDecl {
    pub name: SmolStr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Include {
    pub path: SmolStr,
    pub span: Span,
}

impl CompilationUnit {
    pub fn new(kind: UnitKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Object(obj) => Some(obj),
            _ => None,
        })
    }

    pub fn module_header(&self) -> Option<&ModuleHeader> {
        match &self.kind {
            UnitKind::Module(header) => Some(header),
            _ => None,
        }
    }

    pub fn database_header(&self) -> Option<&DatabaseHeader> {
        match &self.kind {
            UnitKind::Database(header) => Some(header),
            _ => None,
        }
    }
}

// ============================================================================
// REFERENCES & VALUES
// ============================================================================

/// One of the three well-known negative object numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Nothing,
    AmbiguousMatch,
    FailedMatch,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nothing" => Some(Builtin::Nothing),
            "ambiguous_match" => Some(Builtin::AmbiguousMatch),
            "failed_match" => Some(Builtin::FailedMatch),
            _ => None,
        }
    }

    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            -1 => Some(Builtin::Nothing),
            -2 => Some(Builtin::AmbiguousMatch),
            -3 => Some(Builtin::FailedMatch),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Nothing => "nothing",
            Builtin::AmbiguousMatch => "ambiguous_match",
            Builtin::FailedMatch => "failed_match",
        }
    }

    pub fn number(self) -> i64 {
        match self {
            Builtin::Nothing => -1,
            Builtin::AmbiguousMatch => -2,
            Builtin::FailedMatch => -3,
        }
    }
}

/// A reference to an object, in any of the forms the source format allows.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reference {
    /// `#12`, `#-1`
    ObjectNumber(i64),
    /// `$nothing`, `$ambiguous_match`, `$failed_match`
    Builtin(Builtin),
    /// `$thing`: a property of the system object
    Symbolic(SmolStr),
    /// `@name`: an object of the same unit
    Local(SmolStr),
    /// `module::name`: an export of a required module
    Qualified { module: SmolStr, name: SmolStr },
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::ObjectNumber(n) => write!(f, "#{n}"),
            Reference::Builtin(b) => write!(f, "${}", b.name()),
            Reference::Symbolic(name) => write!(f, "${name}"),
            Reference::Local(name) => write!(f, "@{name}"),
            Reference::Qualified { module, name } => write!(f, "{module}::{name}"),
        }
    }
}

/// A literal property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(SmolStr),
    /// Error code such as `E_PERM`.
    Error(SmolStr),
    Ref(Reference),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Visit every reference nested anywhere in this value.
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a Reference)) {
        match self {
            Value::Ref(r) => f(r),
            Value::List(items) => items.iter().for_each(|v| v.for_each_reference(f)),
            Value::Map(pairs) => pairs.iter().for_each(|(k, v)| {
                k.for_each_reference(f);
                v.for_each_reference(f);
            }),
            Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Error(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => f.write_str(&quote(s)),
            Value::Error(code) => f.write_str(code),
            Value::Ref(r) => write!(f, "{r}"),
            Value::List(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Value::Map(pairs) => {
                f.write_str("[")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} -> {v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ============================================================================
// OBJECTS
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectFlag {
    Player,
    Programmer,
    Wizard,
    Read,
    Write,
    Fertile,
}

impl ObjectFlag {
    pub const ALL: [ObjectFlag; 6] = [
        ObjectFlag::Player,
        ObjectFlag::Programmer,
        ObjectFlag::Wizard,
        ObjectFlag::Read,
        ObjectFlag::Write,
        ObjectFlag::Fertile,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            ObjectFlag::Player => "player",
            ObjectFlag::Programmer => "programmer",
            ObjectFlag::Wizard => "wizard",
            ObjectFlag::Read => "read",
            ObjectFlag::Write => "write",
            ObjectFlag::Fertile => "fertile",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.keyword() == word)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDef {
    /// `Local` or `ObjectNumber`.
    pub id: Reference,
    pub name: SmolStr,
    pub owner: Option<Reference>,
    pub parent: Option<Reference>,
    pub location: Option<Reference>,
    pub flags: Vec<ObjectFlag>,
    pub properties: Vec<PropertyDef>,
    pub verbs: Vec<VerbDef>,
    pub span: Span,
}

impl ObjectDef {
    pub fn new(id: Reference) -> Self {
        Self {
            id,
            name: SmolStr::default(),
            owner: None,
            parent: None,
            location: None,
            flags: Vec::new(),
            properties: Vec::new(),
            verbs: Vec::new(),
            span: Span::detached(),
        }
    }

    pub fn has_flag(&self, flag: ObjectFlag) -> bool {
        self.flags.contains(&flag)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyFlag {
    Readable,
    Writable,
    Chown,
}

impl PropertyFlag {
    pub const ALL: [PropertyFlag; 3] = [
        PropertyFlag::Readable,
        PropertyFlag::Writable,
        PropertyFlag::Chown,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            PropertyFlag::Readable => "readable",
            PropertyFlag::Writable => "writable",
            PropertyFlag::Chown => "chown",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.keyword() == word)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// `= value`: defined on this object.
    Literal(Value),
    /// `inherited [= value]`: an ancestor's property, optionally overridden.
    Inherited(Option<Value>),
    /// `clear`: defined on this object with no value of its own.
    Clear,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDef {
    pub name: SmolStr,
    pub flags: Vec<PropertyFlag>,
    pub owner: Option<Reference>,
    pub value: PropertyValue,
    pub span: Span,
}

// ============================================================================
// VERBS
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VerbFlag {
    Readable,
    Writable,
    Executable,
    Debug,
    Wizardly,
}

impl VerbFlag {
    pub const ALL: [VerbFlag; 5] = [
        VerbFlag::Readable,
        VerbFlag::Writable,
        VerbFlag::Executable,
        VerbFlag::Debug,
        VerbFlag::Wizardly,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            VerbFlag::Readable => "readable",
            VerbFlag::Writable => "writable",
            VerbFlag::Executable => "executable",
            VerbFlag::Debug => "debug",
            VerbFlag::Wizardly => "wizardly",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.keyword() == word)
    }
}

/// One parameter of a method signature.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: SmolStr,
    pub kind: ParamKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamKind {
    Required,
    /// `?name` or `?name = default`; the default is kept as raw tokens.
    Optional(Option<Vec<Token>>),
    /// `@name`: collects the remaining arguments.
    Rest,
}

impl Param {
    pub fn required(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Required,
        }
    }

    pub fn optional(name: impl Into<SmolStr>, default: Option<Vec<Token>>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Optional(default),
        }
    }

    pub fn rest(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Rest,
        }
    }
}

/// Direct/indirect object specifier of a command verb.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgSpec {
    None,
    Any,
    This,
}

impl ArgSpec {
    pub fn keyword(self) -> &'static str {
        match self {
            ArgSpec::None => "none",
            ArgSpec::Any => "any",
            ArgSpec::This => "this",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "none" => Some(ArgSpec::None),
            "any" => Some(ArgSpec::Any),
            "this" => Some(ArgSpec::This),
            _ => None,
        }
    }
}

/// The fixed preposition set of the command parser.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Preposition {
    Any,
    None,
    With,
    At,
    InFrontOf,
    In,
    On,
    From,
    Over,
    Through,
    Under,
    Behind,
    Beside,
    For,
    Is,
    As,
    Off,
}

impl Preposition {
    const TABLE: [(Preposition, &'static str, i16); 17] = [
        (Preposition::Any, "any", -2),
        (Preposition::None, "none", -1),
        (Preposition::With, "with", 0),
        (Preposition::At, "at", 1),
        (Preposition::InFrontOf, "in_front_of", 2),
        (Preposition::In, "in", 3),
        (Preposition::On, "on", 4),
        (Preposition::From, "from", 5),
        (Preposition::Over, "over", 6),
        (Preposition::Through, "through", 7),
        (Preposition::Under, "under", 8),
        (Preposition::Behind, "behind", 9),
        (Preposition::Beside, "beside", 10),
        (Preposition::For, "for", 11),
        (Preposition::Is, "is", 12),
        (Preposition::As, "as", 13),
        (Preposition::Off, "off", 14),
    ];

    pub fn keyword(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map_or("none", |(_, word, _)| word)
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, w, _)| *w == word)
            .map(|(p, _, _)| *p)
    }

    /// Index used by the server's verb records.
    pub fn index(self) -> i16 {
        Self::TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map_or(-1, |(_, _, index)| *index)
    }

    pub fn from_index(index: i16) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, _, i)| *i == index)
            .map(|(p, _, _)| *p)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VerbKind {
    Method {
        names: Vec<SmolStr>,
        params: Vec<Param>,
    },
    Command {
        patterns: Vec<SmolStr>,
        dobj: ArgSpec,
        prep: Preposition,
        iobj: ArgSpec,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerbDef {
    pub kind: VerbKind,
    pub flags: Vec<VerbFlag>,
    pub owner: Option<Reference>,
    /// Body in external representation, comments included.
    pub body: Vec<Token>,
    pub span: Span,
}

impl VerbDef {
    pub fn has_flag(&self, flag: VerbFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Names (methods) or invocation patterns (commands).
    pub fn names(&self) -> &[SmolStr] {
        match &self.kind {
            VerbKind::Method { names, .. } => names,
            VerbKind::Command { patterns, .. } => patterns,
        }
    }
}
