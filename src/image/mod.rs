//! The database image and the bridge to and from source units.
//!
//! A [`DbImage`] is what the target server loads: numbered objects with
//! flag bits, property records and verb programs in internal form. The
//! server's own on-disk layout is out of reach here; [`DbImage::to_bytes`]
//! and [`DbImage::from_bytes`] are the byte boundary (JSON).
//!
//! - [`compile`] turns a [`ResolvedUnit`](crate::hir::ResolvedUnit) into an image
//! - [`decompile`] turns an image back into a unit, in database or module form

pub mod compile;
pub mod decompile;
pub mod naming;

use serde::{Deserialize, Serialize};

use crate::error::{MooError, Result};
use crate::syntax::ast::{ArgSpec, ObjectFlag, PropertyFlag, VerbFlag};
use crate::syntax::keywords::is_identifier;

pub use compile::{CompileOptions, Compiled, compile};
pub use decompile::{DecompileMode, decompile};

/// Object number used for "no object".
pub const NOTHING: i64 = -1;

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DbImage {
    pub version: i64,
    pub max_object: i64,
    pub recycled: Vec<i64>,
    /// Sorted by `id`.
    pub objects: Vec<ObjectRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: i64,
    pub name: String,
    pub owner: i64,
    pub parent: i64,
    pub location: i64,
    pub flags: u32,
    pub properties: Vec<PropertyRecord>,
    pub verbs: Vec<VerbRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    pub owner: i64,
    pub perms: u8,
    /// False for overrides of an ancestor's property.
    pub defined_here: bool,
    /// `None` is a cleared value.
    pub value: Option<ImageValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerbRecord {
    /// Space-separated names or patterns.
    pub names: String,
    pub owner: i64,
    pub perms: u16,
    pub dobj: i8,
    pub prep: i16,
    pub iobj: i8,
    pub program: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ImageValue {
    Int(i64),
    Float(f64),
    Str(String),
    Err(String),
    Obj(i64),
    List(Vec<ImageValue>),
    Map(Vec<(ImageValue, ImageValue)>),
}

impl DbImage {
    pub fn object(&self, id: i64) -> Option<&ObjectRecord> {
        self.objects
            .binary_search_by_key(&id, |o| o.id)
            .ok()
            .map(|i| &self.objects[i])
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse and validate an image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut image: DbImage = serde_json::from_slice(bytes)?;
        image.objects.sort_by_key(|o| o.id);
        if let Some(pair) = image.objects.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(MooError::Image(format!("object #{} appears twice", pair[0].id)));
        }
        if let Some(obj) = image.objects.iter().find(|o| o.id < 0) {
            return Err(MooError::Image(format!("negative object number #{}", obj.id)));
        }
        if let Some(&n) = image.recycled.iter().find(|&&n| image.object(n).is_some()) {
            return Err(MooError::Image(format!("recycled #{n} is also a live object")));
        }
        for obj in &image.objects {
            for prop in &obj.properties {
                if let Some(value) = &prop.value {
                    check_value(value).map_err(|reason| {
                        MooError::Image(format!("#{}.{}: {reason}", obj.id, prop.name))
                    })?;
                }
            }
        }
        tracing::debug!(objects = image.objects.len(), "loaded image");
        Ok(image)
    }
}

/// Values with no source spelling: `i64::MIN` has no literal, and error
/// codes must read as `E_NAME`.
fn check_value(value: &ImageValue) -> std::result::Result<(), String> {
    match value {
        ImageValue::Int(i64::MIN) | ImageValue::Obj(i64::MIN) => {
            Err(format!("{} cannot be written as a literal", i64::MIN))
        }
        ImageValue::Err(code)
            if !(code.len() > 2 && code.starts_with("E_") && is_identifier(code)) =>
        {
            Err(format!("invalid error code `{code}`"))
        }
        ImageValue::List(items) => items.iter().try_for_each(check_value),
        ImageValue::Map(pairs) => pairs.iter().try_for_each(|(k, v)| {
            check_value(k)?;
            check_value(v)
        }),
        _ => Ok(()),
    }
}

// ============================================================================
// FLAG BITS
// ============================================================================

pub(crate) fn object_flag_bit(flag: ObjectFlag) -> u32 {
    match flag {
        ObjectFlag::Player => 1,
        ObjectFlag::Programmer => 2,
        ObjectFlag::Wizard => 4,
        ObjectFlag::Read => 16,
        ObjectFlag::Write => 32,
        ObjectFlag::Fertile => 128,
    }
}

pub(crate) fn property_flag_bit(flag: PropertyFlag) -> u8 {
    match flag {
        PropertyFlag::Readable => 1,
        PropertyFlag::Writable => 2,
        PropertyFlag::Chown => 4,
    }
}

pub(crate) fn verb_flag_bit(flag: VerbFlag) -> u16 {
    match flag {
        VerbFlag::Readable => 1,
        VerbFlag::Writable => 2,
        VerbFlag::Executable => 4,
        VerbFlag::Debug => 8,
        VerbFlag::Wizardly => 16,
    }
}

pub(crate) fn arg_spec_code(spec: ArgSpec) -> i8 {
    match spec {
        ArgSpec::None => 0,
        ArgSpec::Any => 1,
        ArgSpec::This => 2,
    }
}

pub(crate) fn arg_spec_from_code(code: i8) -> Result<ArgSpec> {
    match code {
        0 => Ok(ArgSpec::None),
        1 => Ok(ArgSpec::Any),
        2 => Ok(ArgSpec::This),
        other => Err(MooError::Image(format!("invalid argument spec {other}"))),
    }
}

/// Flags whose bit is set in `bits`, in keyword order.
pub(crate) fn flags_from_bits<F: Copy, B>(all: &[F], bits: B, bit: impl Fn(F) -> B) -> Vec<F>
where
    B: Copy + std::ops::BitAnd<Output = B> + PartialEq + Default,
{
    all.iter()
        .copied()
        .filter(|&f| bits & bit(f) != B::default())
        .collect()
}
