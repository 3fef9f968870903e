//! What other modules make available to `module::name` references.
//!
//! The resolver only reads this information. It is built by the caller, once,
//! before any unit is resolved, and may be shared by parallel workers.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

// ============================================================================
// VERSIONS
// ============================================================================

/// A `major.minor.patch` module version.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = String;

    /// Accepts `1`, `1.2` and `1.2.3`; missing components are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u64; 3];
        let mut count = 0;
        for piece in s.trim().split('.') {
            if count == 3 {
                return Err(format!("too many components in version `{s}`"));
            }
            parts[count] = piece
                .parse()
                .map_err(|_| format!("invalid version component `{piece}` in `{s}`"))?;
            count += 1;
        }
        Ok(Version::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Op {
    Exact,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    /// `^1.2.3`: same left-most non-zero component.
    Caret,
    /// `~1.2.3`: same major and minor.
    Tilde,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn matches(&self, v: &Version) -> bool {
        let c = &self.version;
        match self.op {
            Op::Exact => v == c,
            Op::Greater => v > c,
            Op::GreaterEq => v >= c,
            Op::Less => v < c,
            Op::LessEq => v <= c,
            Op::Tilde => v >= c && v.major == c.major && v.minor == c.minor,
            Op::Caret => {
                v >= c
                    && if c.major > 0 {
                        v.major == c.major
                    } else if c.minor > 0 {
                        v.major == 0 && v.minor == c.minor
                    } else {
                        *v == *c
                    }
            }
        }
    }
}

/// A `requires` constraint: comma-separated comparators that must all hold,
/// such as `>=1.2, <2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionReq {
    comparators: Vec<Comparator>,
}

impl VersionReq {
    pub fn matches(&self, version: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }
}

impl FromStr for VersionReq {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut comparators = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            let (op, rest) = [
                (">=", Op::GreaterEq),
                ("<=", Op::LessEq),
                (">", Op::Greater),
                ("<", Op::Less),
                ("=", Op::Exact),
                ("^", Op::Caret),
                ("~", Op::Tilde),
            ]
            .into_iter()
            .find_map(|(prefix, op)| part.strip_prefix(prefix).map(|rest| (op, rest)))
            .unwrap_or((Op::Exact, part));
            comparators.push(Comparator {
                op,
                version: rest.parse()?,
            });
        }
        Ok(VersionReq { comparators })
    }
}

// ============================================================================
// MODULE INTERFACES
// ============================================================================

/// What an exported name stands for in the importing unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExportTarget {
    /// An object number in the shared database.
    Object(i64),
    /// A handle the resolver accepts but compile cannot place.
    Opaque(SmolStr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleInterface {
    pub name: SmolStr,
    pub version: Option<Version>,
    pub exports: IndexMap<SmolStr, ExportTarget>,
}

impl ModuleInterface {
    pub fn new(name: impl Into<SmolStr>, version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            version,
            exports: IndexMap::new(),
        }
    }

    pub fn with_export(mut self, name: impl Into<SmolStr>, target: ExportTarget) -> Self {
        self.exports.insert(name.into(), target);
        self
    }

    pub fn export(&self, name: &str) -> Option<&ExportTarget> {
        self.exports.get(name)
    }
}

/// Lookup of module interfaces by name.
pub trait ModuleExports: Sync {
    fn module(&self, name: &str) -> Option<&ModuleInterface>;
}

/// An in-memory set of module interfaces.
#[derive(Clone, Debug, Default)]
pub struct ExportTable {
    modules: FxHashMap<SmolStr, ModuleInterface>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, interface: ModuleInterface) {
        self.modules.insert(interface.name.clone(), interface);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleExports for ExportTable {
    fn module(&self, name: &str) -> Option<&ModuleInterface> {
        self.modules.get(name)
    }
}

impl FromIterator<ModuleInterface> for ExportTable {
    fn from_iter<I: IntoIterator<Item = ModuleInterface>>(iter: I) -> Self {
        let mut table = ExportTable::new();
        for interface in iter {
            table.insert(interface);
        }
        table
    }
}
