//! Database image → source unit.
//!
//! Database mode keeps every object number and is an exact inverse of
//! compile. Module mode renames objects to `@local`s so the unit can be
//! compiled into another database, which gives up the original numbers.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::base::{FileId, Span};
use crate::error::{MooError, Result};
use crate::syntax::ast::{
    ArgSpec, Builtin, CompilationUnit, DatabaseHeader, Export, ForwardDecl, Item, ModuleHeader,
    ObjectDef, ObjectFlag, PropertyDef, PropertyFlag, PropertyValue, Preposition, Reference,
    UnitKind, Value, VerbDef, VerbFlag, VerbKind,
};
use crate::syntax::lexer::tokenize;
use crate::transform::{externalize, externalize_body};

use super::naming::Namer;
use super::{
    DbImage, ImageValue, NOTHING, ObjectRecord, PropertyRecord, VerbRecord, arg_spec_code,
    arg_spec_from_code, flags_from_bits, object_flag_bit, property_flag_bit, verb_flag_bit,
};

#[derive(Clone, Debug, Default)]
pub enum DecompileMode {
    /// `#n` ids under a `database` header.
    #[default]
    Database,
    /// `@name` ids under a `module` header that exports every object.
    Module {
        name: SmolStr,
        version: Option<SmolStr>,
    },
}

pub fn decompile(image: &DbImage, mode: &DecompileMode) -> Result<CompilationUnit> {
    let unit = match mode {
        DecompileMode::Database => database(image)?,
        DecompileMode::Module { name, version } => module(image, name, version.as_ref())?,
    };
    tracing::debug!(objects = image.objects.len(), items = unit.items.len(), "decompiled image");
    Ok(unit)
}

fn database(image: &DbImage) -> Result<CompilationUnit> {
    let mut unit = CompilationUnit::new(UnitKind::Database(DatabaseHeader {
        version: image.version,
        max_object: Some(image.max_object),
        recycled: image.recycled.clone(),
        span: Span::detached(),
    }));
    let names = Naming::Numbers;
    for rec in &image.objects {
        unit.items.push(Item::Object(names.object(rec)?));
    }
    Ok(unit)
}

fn module(image: &DbImage, name: &SmolStr, version: Option<&SmolStr>) -> Result<CompilationUnit> {
    let mut namer = Namer::new();
    let locals: FxHashMap<i64, SmolStr> = image
        .objects
        .iter()
        .map(|rec| (rec.id, namer.name(&rec.name, rec.id)))
        .collect();
    let order = parents_first(image);
    let position: FxHashMap<i64, usize> = order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let names = Naming::Locals(&locals);
    let mut objects = Vec::with_capacity(order.len());
    let mut forwards: IndexSet<SmolStr> = IndexSet::new();
    for (i, &id) in order.iter().enumerate() {
        let Some(rec) = image.object(id) else {
            continue;
        };
        for target in references(rec) {
            if position.get(&target).is_some_and(|&p| p > i) {
                if let Some(local) = locals.get(&target) {
                    forwards.insert(local.clone());
                }
            }
        }
        objects.push(names.object(rec)?);
    }

    let exports = objects
        .iter()
        .filter_map(|obj: &ObjectDef| match &obj.id {
            Reference::Local(name) => Some(Export {
                name: name.clone(),
                span: Span::detached(),
            }),
            _ => None,
        })
        .collect();
    let mut unit = CompilationUnit::new(UnitKind::Module(ModuleHeader {
        name: name.clone(),
        version: version.cloned(),
        requires: Vec::new(),
        exports,
        span: Span::detached(),
    }));
    unit.items.extend(forwards.into_iter().map(|name| {
        Item::Forward(ForwardDecl {
            name,
            span: Span::detached(),
        })
    }));
    unit.items.extend(objects.into_iter().map(Item::Object));
    Ok(unit)
}

/// Object numbers with every parent before its children, ties by number.
fn parents_first(image: &DbImage) -> Vec<i64> {
    fn visit(image: &DbImage, id: i64, done: &mut FxHashSet<i64>, out: &mut Vec<i64>) {
        let mut chain = Vec::new();
        let mut current = id;
        while let Some(rec) = image.object(current) {
            if done.contains(&current) || chain.contains(&current) {
                break;
            }
            chain.push(current);
            current = rec.parent;
        }
        for id in chain.into_iter().rev() {
            if done.insert(id) {
                out.push(id);
            }
        }
    }

    let mut done = FxHashSet::default();
    let mut out = Vec::with_capacity(image.objects.len());
    for rec in &image.objects {
        visit(image, rec.id, &mut done, &mut out);
    }
    out
}

/// Every object number `rec` mentions apart from its parent.
fn references(rec: &ObjectRecord) -> Vec<i64> {
    fn walk(value: &ImageValue, out: &mut Vec<i64>) {
        match value {
            ImageValue::Obj(n) => out.push(*n),
            ImageValue::List(items) => items.iter().for_each(|v| walk(v, out)),
            ImageValue::Map(pairs) => pairs.iter().for_each(|(k, v)| {
                walk(k, out);
                walk(v, out);
            }),
            _ => {}
        }
    }

    let mut out = vec![rec.owner, rec.location];
    for prop in &rec.properties {
        out.push(prop.owner);
        if let Some(value) = &prop.value {
            walk(value, &mut out);
        }
    }
    out.extend(rec.verbs.iter().map(|v| v.owner));
    out
}

enum Naming<'a> {
    Numbers,
    Locals(&'a FxHashMap<i64, SmolStr>),
}

impl Naming<'_> {
    fn reference(&self, n: i64) -> Reference {
        if let Naming::Locals(locals) = self {
            if let Some(name) = locals.get(&n) {
                return Reference::Local(name.clone());
            }
        }
        match Builtin::from_number(n) {
            Some(builtin) => Reference::Builtin(builtin),
            None => Reference::ObjectNumber(n),
        }
    }

    fn optional(&self, n: i64) -> Option<Reference> {
        (n != NOTHING).then(|| self.reference(n))
    }

    fn id(&self, n: i64) -> Reference {
        match self {
            Naming::Numbers => Reference::ObjectNumber(n),
            Naming::Locals(_) => self.reference(n),
        }
    }

    fn value(&self, value: &ImageValue) -> Value {
        match value {
            ImageValue::Int(n) => Value::Int(*n),
            ImageValue::Float(x) => Value::Float(*x),
            ImageValue::Str(s) => Value::Str(s.into()),
            ImageValue::Err(code) => Value::Error(code.into()),
            ImageValue::Obj(n) => Value::Ref(self.reference(*n)),
            ImageValue::List(items) => Value::List(items.iter().map(|v| self.value(v)).collect()),
            ImageValue::Map(pairs) => Value::Map(
                pairs
                    .iter()
                    .map(|(k, v)| (self.value(k), self.value(v)))
                    .collect(),
            ),
        }
    }

    fn object(&self, rec: &ObjectRecord) -> Result<ObjectDef> {
        let flags = flags_from_bits(&ObjectFlag::ALL, rec.flags, object_flag_bit);
        let known = flags.iter().fold(0, |bits, &f| bits | object_flag_bit(f));
        if known != rec.flags {
            tracing::warn!(object = rec.id, flags = rec.flags, "dropping unknown object flag bits");
        }
        let mut obj = ObjectDef::new(self.id(rec.id));
        obj.name = rec.name.as_str().into();
        obj.owner = self.optional(rec.owner);
        obj.parent = self.optional(rec.parent);
        obj.location = self.optional(rec.location);
        obj.flags = flags;
        obj.properties = rec
            .properties
            .iter()
            .map(|p| self.property(p, rec.owner))
            .collect();
        obj.verbs = rec
            .verbs
            .iter()
            .map(|v| self.verb(v, rec.owner))
            .collect::<Result<_>>()?;
        Ok(obj)
    }

    fn owner_override(&self, owner: i64, object_owner: i64) -> Option<Reference> {
        (owner != object_owner).then(|| self.reference(owner))
    }

    fn property(&self, rec: &PropertyRecord, object_owner: i64) -> PropertyDef {
        let value = rec.value.as_ref().map(|v| self.value(v));
        PropertyDef {
            name: rec.name.as_str().into(),
            flags: flags_from_bits(&PropertyFlag::ALL, rec.perms, property_flag_bit),
            owner: self.owner_override(rec.owner, object_owner),
            value: match (rec.defined_here, value) {
                (true, Some(v)) => PropertyValue::Literal(v),
                (true, None) => PropertyValue::Clear,
                (false, v) => PropertyValue::Inherited(v),
            },
            span: Span::detached(),
        }
    }

    fn verb(&self, rec: &VerbRecord, object_owner: i64) -> Result<VerbDef> {
        let code: Vec<_> = tokenize(&rec.program.join("\n"), FileId::DETACHED)?
            .into_iter()
            .map(|s| s.token)
            .collect();
        let mut names: Vec<SmolStr> = rec.names.split_whitespace().map(SmolStr::new).collect();
        if names.is_empty() {
            names.push(SmolStr::default());
        }

        let method = (rec.dobj, rec.prep, rec.iobj)
            == (arg_spec_code(ArgSpec::This), Preposition::None.index(), arg_spec_code(ArgSpec::This));
        let (kind, body) = if method {
            let (params, body) = externalize(&code);
            (VerbKind::Method { names, params }, body)
        } else {
            let prep = Preposition::from_index(rec.prep)
                .ok_or_else(|| MooError::Image(format!("invalid preposition {}", rec.prep)))?;
            let kind = VerbKind::Command {
                patterns: names,
                dobj: arg_spec_from_code(rec.dobj)?,
                prep,
                iobj: arg_spec_from_code(rec.iobj)?,
            };
            (kind, externalize_body(&code))
        };
        Ok(VerbDef {
            kind,
            flags: flags_from_bits(&VerbFlag::ALL, rec.perms, verb_flag_bit),
            owner: self.owner_override(rec.owner, object_owner),
            body,
            span: Span::detached(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{ExportTable, resolve};
    use crate::image::{CompileOptions, compile};
    use crate::syntax::ast::ParamKind;
    use crate::syntax::parser::parse;
    use crate::syntax::printer::unparse;

    const DATABASE: &str = r#"database 4;
max_object 9;
recycled #4;
object #0
  name "System Object";
  owner #2;
  property room = #3;
  property gone [readable] clear;
endobject
object #2
  name "Wizard";
  owner #2;
  flags player, programmer, wizard;
  location #3;
endobject
object #3
  name "Room";
  owner #2;
  parent #0;
  property exits [readable, writable] = {["north" -> #3], 1.5, E_PERM};
  method look_self(?who = player) [readable, executable]
    // Describe the room.
    for x in (this.contents)
      x:tell(who);
    endfor
  endmethod
  command "l*ook" (any, at, this) [executable, debug]
    return this:look_self();
  endcommand
endobject
"#;

    fn compiled(src: &str) -> DbImage {
        let unit = parse(src, FileId::new(0)).unwrap_or_else(|e| panic!("{e}"));
        let resolved = resolve(unit, &ExportTable::new()).unwrap_or_else(|e| panic!("{e}"));
        compile(&resolved, &CompileOptions::default()).unwrap().image
    }

    #[test]
    fn test_database_mode_round_trips_through_compile() {
        let image = compiled(DATABASE);
        let unit = decompile(&image, &DecompileMode::Database).unwrap();
        assert_eq!(unit, parse(DATABASE, FileId::new(0)).unwrap());

        let text = unparse(&unit);
        assert_eq!(compiled(&text), image);
    }

    #[test]
    fn test_decompile_is_deterministic() {
        let image = compiled(DATABASE);
        let mode = DecompileMode::Module {
            name: "lobby".into(),
            version: Some("1.0.0".into()),
        };
        let first = unparse(&decompile(&image, &mode).unwrap());
        let second = unparse(&decompile(&image, &mode).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_module_mode_names_orders_and_forwards() {
        let image = compiled(
            "database 4;
             object #1 name \"Thing\"; parent #5; endobject
             object #5 name \"Thing\"; property home = #7; endobject
             object #7 name \"3rd place\"; endobject",
        );
        let mode = DecompileMode::Module {
            name: "things".into(),
            version: None,
        };
        let unit = decompile(&image, &mode).unwrap();
        let header = unit.module_header().unwrap();
        let exported: Vec<_> = header.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(exported, vec!["thing_2", "thing", "obj_3rd_place"]);
        assert!(matches!(&unit.items[0], Item::Forward(f) if f.name == "obj_3rd_place"));

        let objects: Vec<_> = unit.objects().collect();
        assert_eq!(objects[1].parent, Some(Reference::Local("thing_2".into())));

        // The module form resolves and compiles on its own.
        let text = unparse(&unit);
        let again = compiled(&text);
        assert_eq!(again.objects.len(), 3);
    }

    #[test]
    fn test_methods_and_commands_are_told_apart() {
        let image = compiled(DATABASE);
        let unit = decompile(&image, &DecompileMode::Database).unwrap();
        let room = unit.objects().nth(2).unwrap();
        match &room.verbs[0].kind {
            VerbKind::Method { names, params } => {
                assert_eq!(names, &vec![SmolStr::new("look_self")]);
                assert_eq!(params[0].name, "who");
                assert!(matches!(params[0].kind, ParamKind::Optional(Some(_))));
            }
            other => panic!("expected a method, got {other:?}"),
        }
        assert!(matches!(
            room.verbs[1].kind,
            VerbKind::Command {
                prep: Preposition::At,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_preposition_is_an_image_error() {
        let mut image = compiled(DATABASE);
        image.objects[2].verbs[1].prep = 40;
        assert!(matches!(
            decompile(&image, &DecompileMode::Database),
            Err(MooError::Image(_))
        ));
    }
}
