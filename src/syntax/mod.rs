//! Textual `.moo` source: tokens, lexer, tree, parser and printer.

pub mod ast;
pub mod keywords;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod statements;
pub mod token;

pub use ast::{
    ArgSpec, Builtin, CompilationUnit, DatabaseHeader, Export, ForwardDecl, Include, Item,
    ModuleHeader, ObjectDef, ObjectFlag, Param, ParamKind, Preposition, PropertyDef,
    PropertyFlag, PropertyValue, Reference, Requirement, UnitKind, Value, VerbDef, VerbFlag,
    VerbKind,
};
pub use lexer::{Lexer, Spanned, tokenize};
pub use parser::{parse, parse_bare};
pub use printer::{PrintOptions, join_tokens, render_body, unparse, unparse_with};
pub use statements::{Statement, statements};
pub use token::Token;
