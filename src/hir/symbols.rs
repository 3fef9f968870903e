//! The per-unit symbol table.
//!
//! Keys are the object ids a unit can define: `@name` locals and `#n`
//! numbers. A forward declaration creates an [`Symbol::Unresolved`] entry
//! which the matching `object` upgrades to [`Symbol::Resolved`].

use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::syntax::ast::Reference;

/// Where an object is defined within its unit.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    /// Position among the unit's objects.
    pub ordinal: usize,
    /// Position among the unit's items.
    pub item: usize,
    pub span: Span,
    /// Item position of the `forward` declaration, if there was one before
    /// the definition.
    pub forward: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    /// Forward-declared at `item`, not defined (yet).
    Unresolved { item: usize, span: Span },
    Resolved(Definition),
}

impl Symbol {
    pub fn definition(&self) -> Option<&Definition> {
        match self {
            Symbol::Resolved(def) => Some(def),
            Symbol::Unresolved { .. } => None,
        }
    }

    /// Earliest item position from which the symbol may be referenced.
    pub fn visible_from(&self) -> usize {
        match self {
            Symbol::Unresolved { item, .. } => *item,
            Symbol::Resolved(def) => def.forward.unwrap_or(def.item),
        }
    }
}

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: FxIndexMap<Reference, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `forward @name`. Declaring an already known id is a no-op.
    pub fn declare(&mut self, id: Reference, item: usize, span: Span) {
        self.symbols
            .entry(id)
            .or_insert(Symbol::Unresolved { item, span });
    }

    /// Record an object definition, upgrading a forward declaration.
    pub fn define(&mut self, id: Reference, ordinal: usize, item: usize, span: Span) -> Result<()> {
        let forward = match self.symbols.get(&id) {
            Some(Symbol::Resolved(previous)) => {
                return Err(MooError::DuplicateDefinition {
                    span,
                    name: id.to_string(),
                    previous: previous.span,
                });
            }
            Some(Symbol::Unresolved { item, .. }) => Some(*item),
            None => None,
        };
        self.symbols.insert(
            id,
            Symbol::Resolved(Definition {
                ordinal,
                item,
                span,
                forward,
            }),
        );
        Ok(())
    }

    pub fn get(&self, id: &Reference) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn definition(&self, id: &Reference) -> Option<&Definition> {
        self.get(id).and_then(Symbol::definition)
    }

    /// Forward declarations that never met their object, in declaration order.
    pub fn unresolved(&self) -> impl Iterator<Item = (&Reference, Span)> {
        self.symbols.iter().filter_map(|(id, symbol)| match symbol {
            Symbol::Unresolved { span, .. } => Some((id, *span)),
            Symbol::Resolved(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reference, &Symbol)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Reference {
        Reference::Local(name.into())
    }

    #[test]
    fn test_forward_then_define() {
        let mut table = SymbolTable::new();
        table.declare(local("b"), 0, Span::detached());
        assert_eq!(table.unresolved().count(), 1);

        table.define(local("b"), 1, 3, Span::detached()).unwrap();
        let def = table.definition(&local("b")).unwrap();
        assert_eq!(def.forward, Some(0));
        assert_eq!(table.get(&local("b")).unwrap().visible_from(), 0);
        assert_eq!(table.unresolved().count(), 0);
    }

    #[test]
    fn test_redefinition_is_rejected() {
        let mut table = SymbolTable::new();
        table.define(local("a"), 0, 0, Span::detached()).unwrap();
        let err = table.define(local("a"), 1, 1, Span::detached()).unwrap_err();
        assert!(matches!(err, MooError::DuplicateDefinition { ref name, .. } if name == "@a"));
    }

    #[test]
    fn test_forward_after_definition_is_ignored() {
        let mut table = SymbolTable::new();
        table.define(Reference::ObjectNumber(4), 0, 0, Span::detached()).unwrap();
        table.declare(Reference::ObjectNumber(4), 1, Span::detached());
        assert_eq!(
            table.get(&Reference::ObjectNumber(4)).unwrap().visible_from(),
            0
        );
        assert_eq!(table.len(), 1);
    }
}
