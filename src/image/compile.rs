//! Resolved unit → database image.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::hir::{ExportTarget, ResolvedUnit};
use crate::syntax::ast::{
    ArgSpec, ObjectDef, Preposition, PropertyDef, PropertyValue, Reference, UnitKind, Value,
    VerbDef, VerbKind,
};
use crate::syntax::printer::{PrintOptions, render_body};
use crate::transform::internalize_verb;

use super::{
    DbImage, ImageValue, NOTHING, ObjectRecord, PropertyRecord, VerbRecord, arg_spec_code,
    object_flag_bit, property_flag_bit, verb_flag_bit,
};

#[derive(Clone, Debug)]
pub struct CompileOptions {
    /// Lowest number handed to `@name` objects.
    pub first_object: i64,
    /// `$name` bindings used when `#0` has no object-valued property of
    /// that name.
    pub system_objects: IndexMap<SmolStr, i64>,
    /// Image version for units without a `database` header.
    pub format_version: i64,
    /// Layout of verb program lines.
    pub print: PrintOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            first_object: 0,
            system_objects: IndexMap::new(),
            format_version: 4,
            print: PrintOptions::default(),
        }
    }
}

/// A compiled image and the numbers given to the unit's locals.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub image: DbImage,
    pub locals: IndexMap<SmolStr, i64>,
}

pub fn compile(resolved: &ResolvedUnit, options: &CompileOptions) -> Result<Compiled> {
    let unit = resolved.unit();
    let header = unit.database_header();
    let recycled = header.map(|h| h.recycled.clone()).unwrap_or_default();

    let locals = allocate(resolved, options, &recycled);
    let mut numbers = Numbering {
        resolved,
        locals: &locals,
        system: options.system_objects.clone(),
    };
    numbers.bind_system_object()?;

    let mut objects = Vec::new();
    for obj in unit.objects() {
        tracing::trace!(object = %obj.id, "compiling");
        objects.push(numbers.object(obj, &options.print)?);
    }
    objects.sort_by_key(|o| o.id);

    let highest = objects
        .iter()
        .map(|o| o.id)
        .chain(recycled.iter().copied())
        .max()
        .unwrap_or(NOTHING);
    let image = DbImage {
        version: match &unit.kind {
            UnitKind::Database(h) => h.version,
            _ => options.format_version,
        },
        max_object: header.and_then(|h| h.max_object).map_or(highest, |m| m.max(highest)),
        recycled,
        objects,
    };
    tracing::debug!(
        objects = image.objects.len(),
        locals = locals.len(),
        max_object = image.max_object,
        "compiled unit"
    );
    Ok(Compiled { image, locals })
}

/// Numbers for `@name` objects: upward from `first_object`, in definition
/// order. Explicit and recycled numbers are skipped, and so are numbers that
/// already stand for objects outside the unit: qualified targets, system
/// bindings and `#n` values of `#0`'s properties.
fn allocate(
    resolved: &ResolvedUnit,
    options: &CompileOptions,
    recycled: &[i64],
) -> IndexMap<SmolStr, i64> {
    let mut used: FxHashSet<i64> = recycled.iter().copied().collect();
    used.extend(options.system_objects.values().copied());
    used.extend(resolved.targets().filter_map(|target| match target {
        ExportTarget::Object(n) => Some(*n),
        ExportTarget::Opaque(_) => None,
    }));
    for obj in resolved.unit().objects() {
        if let Reference::ObjectNumber(n) = obj.id {
            used.insert(n);
            if n == 0 {
                for prop in &obj.properties {
                    if let PropertyValue::Literal(Value::Ref(Reference::ObjectNumber(m)))
                    | PropertyValue::Inherited(Some(Value::Ref(Reference::ObjectNumber(m)))) =
                        &prop.value
                    {
                        used.insert(*m);
                    }
                }
            }
        }
    }
    let mut next = options.first_object;
    let mut locals = IndexMap::new();
    for obj in resolved.unit().objects() {
        if let Reference::Local(name) = &obj.id {
            while used.contains(&next) {
                next += 1;
            }
            used.insert(next);
            locals.insert(name.clone(), next);
        }
    }
    locals
}

struct Numbering<'a> {
    resolved: &'a ResolvedUnit,
    locals: &'a IndexMap<SmolStr, i64>,
    system: IndexMap<SmolStr, i64>,
}

impl Numbering<'_> {
    /// Object-valued properties of `#0` become `$name` bindings.
    fn bind_system_object(&mut self) -> Result<()> {
        let resolved = self.resolved;
        let Some(sys) = resolved
            .unit()
            .objects()
            .find(|o| matches!(self.id(o), Ok(0)))
        else {
            return Ok(());
        };
        for prop in &sys.properties {
            let value = match &prop.value {
                PropertyValue::Literal(v) | PropertyValue::Inherited(Some(v)) => v,
                _ => continue,
            };
            match value {
                Value::Ref(Reference::Symbolic(_)) => {}
                Value::Ref(r) => {
                    let n = self.number(r, prop.span)?;
                    self.system.insert(prop.name.clone(), n);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn id(&self, obj: &ObjectDef) -> Result<i64> {
        self.number(&obj.id, obj.span)
    }

    fn number(&self, r: &Reference, span: Span) -> Result<i64> {
        match r {
            Reference::ObjectNumber(n) => Ok(*n),
            Reference::Builtin(b) => Ok(b.number()),
            Reference::Local(name) => self.locals.get(name).copied().ok_or_else(|| {
                MooError::undefined(span, r.to_string(), "no object defines it")
            }),
            Reference::Symbolic(name) => self.system.get(name).copied().ok_or_else(|| {
                MooError::undefined(
                    span,
                    r.to_string(),
                    "#0 has no object-valued property of that name",
                )
            }),
            Reference::Qualified { module, name } => match self.resolved.target(module, name) {
                Some(ExportTarget::Object(n)) => Ok(*n),
                Some(ExportTarget::Opaque(_)) => Err(MooError::undefined(
                    span,
                    r.to_string(),
                    "the export is not bound to an object number",
                )),
                None => Err(MooError::undefined(span, r.to_string(), "not resolved")),
            },
        }
    }

    fn optional(&self, r: Option<&Reference>, span: Span) -> Result<i64> {
        r.map_or(Ok(NOTHING), |r| self.number(r, span))
    }

    fn value(&self, value: &Value, span: Span) -> Result<ImageValue> {
        Ok(match value {
            Value::Int(n) => ImageValue::Int(*n),
            Value::Float(x) => ImageValue::Float(*x),
            Value::Str(s) => ImageValue::Str(s.to_string()),
            Value::Error(code) => ImageValue::Err(code.to_string()),
            Value::Ref(r) => ImageValue::Obj(self.number(r, span)?),
            Value::List(items) => ImageValue::List(
                items
                    .iter()
                    .map(|v| self.value(v, span))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(pairs) => ImageValue::Map(
                pairs
                    .iter()
                    .map(|(k, v)| Ok((self.value(k, span)?, self.value(v, span)?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn object(&self, obj: &ObjectDef, print: &PrintOptions) -> Result<ObjectRecord> {
        let owner = self.optional(obj.owner.as_ref(), obj.span)?;
        Ok(ObjectRecord {
            id: self.id(obj)?,
            name: obj.name.to_string(),
            owner,
            parent: self.optional(obj.parent.as_ref(), obj.span)?,
            location: self.optional(obj.location.as_ref(), obj.span)?,
            flags: obj.flags.iter().map(|&f| object_flag_bit(f)).fold(0, |a, b| a | b),
            properties: obj
                .properties
                .iter()
                .map(|p| self.property(p, owner))
                .collect::<Result<_>>()?,
            verbs: obj
                .verbs
                .iter()
                .map(|v| self.verb(v, owner, print))
                .collect::<Result<_>>()?,
        })
    }

    fn property(&self, prop: &PropertyDef, object_owner: i64) -> Result<PropertyRecord> {
        let (defined_here, value) = match &prop.value {
            PropertyValue::Literal(v) => (true, Some(v)),
            PropertyValue::Clear => (true, None),
            PropertyValue::Inherited(v) => (false, v.as_ref()),
        };
        Ok(PropertyRecord {
            name: prop.name.to_string(),
            owner: match &prop.owner {
                Some(r) => self.number(r, prop.span)?,
                None => object_owner,
            },
            perms: prop.flags.iter().map(|&f| property_flag_bit(f)).fold(0, |a, b| a | b),
            defined_here,
            value: value.map(|v| self.value(v, prop.span)).transpose()?,
        })
    }

    fn verb(&self, verb: &VerbDef, object_owner: i64, print: &PrintOptions) -> Result<VerbRecord> {
        let (dobj, prep, iobj) = match &verb.kind {
            VerbKind::Method { .. } => (ArgSpec::This, Preposition::None, ArgSpec::This),
            VerbKind::Command {
                dobj, prep, iobj, ..
            } => (*dobj, *prep, *iobj),
        };
        let code = internalize_verb(verb)?;
        Ok(VerbRecord {
            names: verb.names().join(" "),
            owner: match &verb.owner {
                Some(r) => self.number(r, verb.span)?,
                None => object_owner,
            },
            perms: verb.flags.iter().map(|&f| verb_flag_bit(f)).fold(0, |a, b| a | b),
            dobj: arg_spec_code(dobj),
            prep: prep.index(),
            iobj: arg_spec_code(iobj),
            program: render_body(&code, print, 0),
        })
    }
}
