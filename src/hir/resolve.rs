//! Name resolution for one compilation unit.
//!
//! Resolution runs in two phases over the flat item list:
//!
//! 1. **Declaration** - every `forward` and `object` enters the
//!    [`SymbolTable`], so duplicates are caught before anything else.
//! 2. **References** - headers, then every object in item order, then the
//!    export list. A local may be used once it is defined or forward-declared;
//!    a parent must already be defined, and its chain may not loop back.
//!
//! A unit that passes becomes a [`ResolvedUnit`], the only thing the compiler
//! accepts. Verb bodies are MOO code and are not looked at here.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::syntax::ast::{CompilationUnit, Item, ObjectDef, PropertyValue, Reference, UnitKind};

use super::exports::{ExportTarget, ModuleExports, Version, VersionReq};
use super::symbols::SymbolTable;

// ============================================================================
// RESOLVED UNIT
// ============================================================================

/// A unit whose every reference is known to be sound.
#[derive(Clone, Debug)]
pub struct ResolvedUnit {
    unit: CompilationUnit,
    symbols: SymbolTable,
    targets: FxHashMap<(SmolStr, SmolStr), ExportTarget>,
}

impl ResolvedUnit {
    pub fn unit(&self) -> &CompilationUnit {
        &self.unit
    }

    pub fn into_unit(self) -> CompilationUnit {
        self.unit
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// What `module::name` was resolved to.
    pub fn target(&self, module: &str, name: &str) -> Option<&ExportTarget> {
        self.targets.get(&(SmolStr::new(module), SmolStr::new(name)))
    }

    /// Every qualified-reference target, in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = &ExportTarget> {
        self.targets.values()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves units against a fixed set of module interfaces.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    exports: &'a dyn ModuleExports,
}

impl<'a> Resolver<'a> {
    pub fn new(exports: &'a dyn ModuleExports) -> Self {
        Self { exports }
    }

    pub fn resolve(&self, unit: CompilationUnit) -> Result<ResolvedUnit> {
        let mut pass = Pass {
            exports: self.exports,
            table: SymbolTable::new(),
            parents: FxHashMap::default(),
            required: FxHashSet::default(),
            targets: FxHashMap::default(),
        };
        pass.declare(&unit)?;
        tracing::debug!(symbols = pass.table.len(), "declaration phase done");

        pass.header(&unit)?;
        for (item, obj) in objects_with_positions(&unit) {
            tracing::trace!(object = %obj.id, "checking references");
            pass.object(obj, item)?;
        }
        if let UnitKind::Module(header) = &unit.kind {
            for export in &header.exports {
                let id = Reference::Local(export.name.clone());
                if pass.table.get(&id).is_none() {
                    return Err(MooError::undefined(
                        export.span,
                        id.to_string(),
                        "exported but never defined",
                    ));
                }
            }
        }
        if let Some((id, span)) = pass.table.unresolved().next() {
            return Err(MooError::UnresolvedForwardDeclaration {
                span,
                name: id.to_string(),
            });
        }

        tracing::debug!(
            symbols = pass.table.len(),
            qualified = pass.targets.len(),
            "unit resolved"
        );
        Ok(ResolvedUnit {
            unit,
            symbols: pass.table,
            targets: pass.targets,
        })
    }
}

/// Resolve `unit` against `exports`.
pub fn resolve(unit: CompilationUnit, exports: &dyn ModuleExports) -> Result<ResolvedUnit> {
    Resolver::new(exports).resolve(unit)
}

fn objects_with_positions(unit: &CompilationUnit) -> impl Iterator<Item = (usize, &ObjectDef)> {
    unit.items.iter().enumerate().filter_map(|(i, item)| match item {
        Item::Object(obj) => Some((i, obj)),
        _ => None,
    })
}

struct Pass<'a> {
    exports: &'a dyn ModuleExports,
    table: SymbolTable,
    /// Parent of every object the unit defines, for cycle walks.
    parents: FxHashMap<Reference, Option<Reference>>,
    required: FxHashSet<SmolStr>,
    targets: FxHashMap<(SmolStr, SmolStr), ExportTarget>,
}

impl Pass<'_> {
    fn declare(&mut self, unit: &CompilationUnit) -> Result<()> {
        let mut ordinal = 0;
        for (i, item) in unit.items.iter().enumerate() {
            match item {
                Item::Forward(decl) => {
                    self.table
                        .declare(Reference::Local(decl.name.clone()), i, decl.span);
                }
                Item::Object(obj) => {
                    self.table.define(obj.id.clone(), ordinal, i, obj.span)?;
                    self.parents.insert(obj.id.clone(), obj.parent.clone());
                    ordinal += 1;
                }
                // Includes are expanded by `pack`; a leftover one names nothing.
                Item::Include(_) => {}
            }
        }
        Ok(())
    }

    fn header(&mut self, unit: &CompilationUnit) -> Result<()> {
        match &unit.kind {
            UnitKind::Module(header) => {
                if let Some(version) = &header.version {
                    version.parse::<Version>().map_err(|reason| {
                        MooError::parse(header.span, "semantic version", reason)
                    })?;
                }
                for req in &header.requires {
                    let Some(interface) = self.exports.module(&req.module) else {
                        return Err(MooError::undefined(
                            req.span,
                            req.module.to_string(),
                            "required module is not available",
                        ));
                    };
                    if let Some(constraint) = &req.constraint {
                        let wanted: VersionReq = constraint.parse().map_err(|_| {
                            MooError::parse(req.span, "version constraint", format!("`{constraint}`"))
                        })?;
                        let satisfied = interface.version.is_some_and(|v| wanted.matches(&v));
                        if !satisfied {
                            return Err(MooError::VersionConstraint {
                                span: req.span,
                                module: req.module.to_string(),
                                required: constraint.to_string(),
                                found: interface
                                    .version
                                    .map_or_else(|| "(unversioned)".to_string(), |v| v.to_string()),
                            });
                        }
                    }
                    self.required.insert(req.module.clone());
                }
            }
            UnitKind::Database(header) => {
                let mut seen = FxHashSet::default();
                for &number in &header.recycled {
                    let conflict = |reason: String| MooError::RecycledConflict {
                        span: header.span,
                        number,
                        reason,
                    };
                    if number < 0 {
                        return Err(conflict("is not a valid object number".into()));
                    }
                    if !seen.insert(number) {
                        return Err(conflict("is listed twice".into()));
                    }
                    if self.table.get(&Reference::ObjectNumber(number)).is_some() {
                        return Err(conflict("is also defined as a live object".into()));
                    }
                    if let Some(max) = header.max_object {
                        if number > max {
                            return Err(conflict(format!("exceeds max_object #{max}")));
                        }
                    }
                }
            }
            UnitKind::Bare => {}
        }
        Ok(())
    }

    fn object(&mut self, obj: &ObjectDef, at: usize) -> Result<()> {
        if let Some(owner) = &obj.owner {
            self.reference(owner, obj.span, at)?;
        }
        if let Some(parent) = &obj.parent {
            self.parent(obj, parent, at)?;
        }
        if let Some(location) = &obj.location {
            self.reference(location, obj.span, at)?;
        }
        let mut names: FxHashMap<&str, Span> = FxHashMap::default();
        for prop in &obj.properties {
            if let Some(previous) = names.insert(prop.name.as_str(), prop.span) {
                return Err(MooError::DuplicateDefinition {
                    span: prop.span,
                    name: format!("{}.{}", obj.id, prop.name),
                    previous,
                });
            }
            if let Some(owner) = &prop.owner {
                self.reference(owner, prop.span, at)?;
            }
            let value = match &prop.value {
                PropertyValue::Literal(v) | PropertyValue::Inherited(Some(v)) => v,
                PropertyValue::Inherited(None) | PropertyValue::Clear => continue,
            };
            let mut refs = Vec::new();
            value.for_each_reference(&mut |r| refs.push(r));
            for r in refs {
                self.reference(r, prop.span, at)?;
            }
        }
        for verb in &obj.verbs {
            if let Some(owner) = &verb.owner {
                self.reference(owner, verb.span, at)?;
            }
        }
        Ok(())
    }

    fn reference(&mut self, r: &Reference, span: Span, at: usize) -> Result<()> {
        match r {
            Reference::Local(_) => match self.table.get(r) {
                None => Err(MooError::undefined(
                    span,
                    r.to_string(),
                    "no object or forward declaration defines it",
                )),
                Some(symbol) if symbol.visible_from() <= at => Ok(()),
                Some(_) => Err(MooError::undefined(
                    span,
                    r.to_string(),
                    "used before its definition without a `forward` declaration",
                )),
            },
            Reference::Qualified { module, name } => {
                let target = self.qualified(module, name, span)?;
                self.targets.insert((module.clone(), name.clone()), target);
                Ok(())
            }
            Reference::ObjectNumber(_) | Reference::Builtin(_) | Reference::Symbolic(_) => Ok(()),
        }
    }

    fn qualified(&self, module: &SmolStr, name: &SmolStr, span: Span) -> Result<ExportTarget> {
        let full = format!("{module}::{name}");
        if !self.required.contains(module) {
            return Err(MooError::undefined(
                span,
                full,
                format!("module `{module}` is not listed in `requires`"),
            ));
        }
        let interface = self.exports.module(module).ok_or_else(|| {
            MooError::undefined(span, full.clone(), format!("module `{module}` is not available"))
        })?;
        interface.export(name).cloned().ok_or_else(|| {
            MooError::undefined(span, full, format!("module `{module}` does not export `{name}`"))
        })
    }

    fn parent(&mut self, obj: &ObjectDef, parent: &Reference, at: usize) -> Result<()> {
        self.check_cycle(&obj.id, parent, obj.span)?;
        match parent {
            Reference::Local(_) => match self.table.get(parent) {
                None => Err(MooError::undefined(
                    obj.span,
                    parent.to_string(),
                    "no object or forward declaration defines it",
                )),
                Some(symbol) => match symbol.definition() {
                    Some(def) if def.item < at => Ok(()),
                    _ => Err(MooError::ForwardParent {
                        span: obj.span,
                        name: parent.to_string(),
                    }),
                },
            },
            other => self.reference(other, obj.span, at),
        }
    }

    /// Walk the parent chain from `parent`; arriving back at `start` is a cycle.
    fn check_cycle(&self, start: &Reference, parent: &Reference, span: Span) -> Result<()> {
        let mut path = vec![start.to_string()];
        let mut seen = FxHashSet::default();
        let mut current = parent;
        loop {
            if current == start {
                path.push(start.to_string());
                return Err(MooError::CircularParent {
                    span,
                    name: start.to_string(),
                    cycle: path,
                });
            }
            // A loop that does not pass through `start` is reported from one
            // of its own members.
            if !seen.insert(current) {
                return Ok(());
            }
            let Some(next) = self.parents.get(current) else {
                return Ok(());
            };
            path.push(current.to_string());
            match next {
                Some(next) => current = next,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::hir::exports::{ExportTable, ModuleInterface, Version};
    use crate::syntax::parser::parse;
    use rstest::rstest;

    fn exports() -> ExportTable {
        [
            ModuleInterface::new("core", Some(Version::new(1, 2, 0)))
                .with_export("thing", ExportTarget::Object(5))
                .with_export("limbo", ExportTarget::Opaque("limbo".into())),
            ModuleInterface::new("legacy", None),
        ]
        .into_iter()
        .collect()
    }

    fn resolve_src(src: &str) -> Result<ResolvedUnit> {
        let unit = parse(src, FileId::new(0)).unwrap_or_else(|e| panic!("{e}"));
        resolve(unit, &exports())
    }

    #[test]
    fn test_property_cycle_through_forward_declaration() {
        let resolved = resolve_src(
            "forward @b; object @a parent $thing property p = @b endobject; \
             object @b parent $thing property p = @a endobject;",
        )
        .unwrap();
        assert_eq!(resolved.symbols().len(), 2);
        assert_eq!(resolved.unit().objects().count(), 2);
    }

    #[test]
    fn test_mutual_parents_are_circular() {
        let err = resolve_src("object @a parent @b endobject object @b parent @a endobject")
            .unwrap_err();
        match err {
            MooError::CircularParent { name, cycle, .. } => {
                assert_eq!(name, "@a");
                assert_eq!(cycle, vec!["@a", "@b", "@a"]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_self_parent_is_circular() {
        let err = resolve_src("object #3 parent #3 endobject").unwrap_err();
        assert!(matches!(err, MooError::CircularParent { .. }), "{err}");
    }

    #[test]
    fn test_undefined_export() {
        let err = resolve_src("module m exports @x; object @y endobject").unwrap_err();
        match err {
            MooError::UndefinedReference { name, .. } => assert_eq!(name, "@x"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[rstest]
    #[case::never_declared("object @a location @nowhere endobject")]
    #[case::used_before_definition("object @a owner @b endobject object @b endobject")]
    #[case::forward_after_use(
        "object @a property p = {@b} endobject forward @b object @b endobject"
    )]
    #[case::verb_owner("object @a method f() [owner = @w] return; endmethod endobject")]
    #[case::qualified_without_requires("object @a parent core::thing endobject")]
    #[case::missing_export("module m requires core object @a parent core::room endobject")]
    fn test_undefined_references(#[case] src: &str) {
        let err = resolve_src(src).unwrap_err();
        assert!(matches!(err, MooError::UndefinedReference { .. }), "{err}");
    }

    #[test]
    fn test_self_reference_is_allowed() {
        resolve_src("object @a owner @a property me = @a endobject").unwrap();
    }

    #[test]
    fn test_forward_never_defined() {
        let err = resolve_src("forward @ghost; object @a property p = @ghost endobject")
            .unwrap_err();
        assert!(
            matches!(err, MooError::UnresolvedForwardDeclaration { ref name, .. } if name == "@ghost"),
            "{err}"
        );
    }

    #[test]
    fn test_parent_defined_later_is_rejected() {
        let err = resolve_src("forward @b object @a parent @b endobject object @b endobject")
            .unwrap_err();
        assert!(matches!(err, MooError::ForwardParent { .. }), "{err}");
    }

    #[test]
    fn test_duplicate_definition() {
        let err = resolve_src("object #1 endobject object #1 endobject").unwrap_err();
        assert!(matches!(err, MooError::DuplicateDefinition { .. }), "{err}");
    }

    #[test]
    fn test_duplicate_property_name() {
        let err = resolve_src("object @a property p = 1 property p clear endobject").unwrap_err();
        assert!(
            matches!(err, MooError::DuplicateDefinition { ref name, .. } if name == "@a.p"),
            "{err}"
        );
    }

    #[test]
    fn test_qualified_reference_records_target() {
        let resolved = resolve_src(
            "module m requires core \">=1.0\" object @a parent core::thing location core::limbo endobject",
        )
        .unwrap();
        assert_eq!(resolved.target("core", "thing"), Some(&ExportTarget::Object(5)));
        assert_eq!(
            resolved.target("core", "limbo"),
            Some(&ExportTarget::Opaque("limbo".into()))
        );
    }

    #[rstest]
    #[case::too_new("module m requires core \">=2.0\"")]
    #[case::unversioned("module m requires legacy \"1.0\"")]
    fn test_version_constraints(#[case] src: &str) {
        let err = resolve_src(src).unwrap_err();
        assert!(matches!(err, MooError::VersionConstraint { .. }), "{err}");
    }

    #[test]
    fn test_unknown_required_module() {
        let err = resolve_src("module m requires nowhere").unwrap_err();
        assert!(matches!(err, MooError::UndefinedReference { .. }), "{err}");
    }

    #[rstest]
    #[case::live("database 4 recycled #1 object #1 endobject")]
    #[case::beyond_max("database 4 max_object 3 recycled #7")]
    #[case::twice("database 4 recycled #2, #2")]
    fn test_recycled_conflicts(#[case] src: &str) {
        let err = resolve_src(src).unwrap_err();
        assert!(matches!(err, MooError::RecycledConflict { .. }), "{err}");
    }

    #[test]
    fn test_database_with_numbered_objects() {
        let resolved = resolve_src(
            "database 4 max_object 3 recycled #2 \
             object #0 name \"System\" endobject \
             object #1 parent #3 owner #3 endobject \
             object #3 parent #0 endobject",
        )
        .unwrap();
        assert_eq!(resolved.symbols().len(), 3);
    }
}
