//! Splitting one unit into a root file plus one file per object.
//!
//! The root file keeps the header, forward declarations and any includes in
//! their original positions; each object is replaced by an `include` of its
//! own file, so packing the tree again yields the same unit.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::error::Result;
use crate::syntax::ast::{CompilationUnit, Include, Item, ObjectDef, Reference, UnitKind};
use crate::syntax::printer::{PrintOptions, unparse_with};

use super::pack::MemoryLoader;

/// Decides file names for an unpacked tree.
pub trait LayoutPolicy {
    /// Root file, relative to the output directory.
    fn root_file(&self, unit: &CompilationUnit) -> PathBuf;

    /// Preferred file for `obj`, relative to the output directory. Clashes
    /// are settled by [`unpack`].
    fn object_file(&self, obj: &ObjectDef) -> PathBuf;
}

/// `objects/<name>.moo` next to a `module.moo`, `database.moo` or `main.moo`.
#[derive(Clone, Debug)]
pub struct FlatLayout {
    pub objects_dir: PathBuf,
}

impl Default for FlatLayout {
    fn default() -> Self {
        Self {
            objects_dir: PathBuf::from("objects"),
        }
    }
}

impl LayoutPolicy for FlatLayout {
    fn root_file(&self, unit: &CompilationUnit) -> PathBuf {
        PathBuf::from(match unit.kind {
            UnitKind::Module(_) => "module.moo",
            UnitKind::Database(_) => "database.moo",
            UnitKind::Bare => "main.moo",
        })
    }

    fn object_file(&self, obj: &ObjectDef) -> PathBuf {
        let stem = match &obj.id {
            Reference::Local(name) => name.to_string(),
            Reference::ObjectNumber(n) => format!("obj{n}"),
            other => other.to_string(),
        };
        self.objects_dir.join(format!("{stem}.moo"))
    }
}

/// The files of an unpacked unit, in writing order (root first).
#[derive(Clone, Debug)]
pub struct UnpackedTree {
    pub root: PathBuf,
    pub files: IndexMap<PathBuf, String>,
}

impl UnpackedTree {
    /// Write every file below `dir`, creating directories as needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        for (path, text) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, text)?;
        }
        tracing::debug!(dir = %dir.display(), files = self.files.len(), "wrote unpacked tree");
        Ok(())
    }

    /// The tree as an in-memory loader rooted at `dir`.
    pub fn loader(&self, dir: &Path) -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        for (path, text) in &self.files {
            loader.insert(dir.join(path), text.as_str());
        }
        loader
    }
}

/// Unpack `unit` under `layout` with default formatting.
pub fn unpack(unit: &CompilationUnit, layout: &dyn LayoutPolicy) -> UnpackedTree {
    unpack_with(unit, layout, &PrintOptions::default())
}

pub fn unpack_with(
    unit: &CompilationUnit,
    layout: &dyn LayoutPolicy,
    options: &PrintOptions,
) -> UnpackedTree {
    let root = layout.root_file(unit);
    let root_dir = root.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let mut taken: FxHashSet<String> = FxHashSet::default();
    taken.insert(file_key(&root));

    let mut root_unit = CompilationUnit::new(unit.kind.clone());
    let mut object_files = Vec::new();
    for item in &unit.items {
        match item {
            Item::Object(obj) => {
                let path = claim(layout.object_file(obj), &mut taken);
                let include = relative_to(&root_dir, &path);
                root_unit.items.push(Item::Include(Include {
                    path: SmolStr::new(include),
                    span: obj.span,
                }));
                let mut file_unit = CompilationUnit::new(UnitKind::Bare);
                file_unit.items.push(item.clone());
                object_files.push((path, unparse_with(&file_unit, options)));
            }
            other => root_unit.items.push(other.clone()),
        }
    }

    let mut files = IndexMap::new();
    files.insert(root.clone(), unparse_with(&root_unit, options));
    files.extend(object_files);
    tracing::debug!(files = files.len(), "unpacked unit");
    UnpackedTree { root, files }
}

/// Case-insensitive key so trees survive case-folding file systems.
fn file_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

/// `preferred`, or `<stem>_2.moo`, `<stem>_3.moo`, ... when taken.
fn claim(preferred: PathBuf, taken: &mut FxHashSet<String>) -> PathBuf {
    if taken.insert(file_key(&preferred)) {
        return preferred;
    }
    let stem = preferred
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = preferred.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = dir.join(format!("{stem}_{n}.moo"));
        if taken.insert(file_key(&candidate)) {
            return candidate;
        }
        n += 1;
    }
}

/// Include text for `path` as seen from `dir`, always with `/` separators.
fn relative_to(dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(dir).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::project::pack::pack;
    use crate::syntax::parser::parse;

    const MODULE: &str = r#"module core version "1.0.0";
exports @room;
forward @thing;
object @room
  name "Room";
  property contents = {@thing};
endobject
object @thing
  name "Thing";
  parent @room;
  method look(who)
    player:tell(this.name);
  endmethod
endobject
"#;

    #[test]
    fn test_flat_layout_names_files() {
        let unit = parse(MODULE, FileId::new(0)).unwrap();
        let tree = unpack(&unit, &FlatLayout::default());
        let paths: Vec<_> = tree.files.keys().cloned().collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("module.moo"),
                PathBuf::from("objects/room.moo"),
                PathBuf::from("objects/thing.moo"),
            ]
        );
        let root = &tree.files[&PathBuf::from("module.moo")];
        assert!(root.contains("forward @thing;"), "{root}");
        assert!(root.contains("include \"objects/room.moo\";"), "{root}");
    }

    #[test]
    fn test_pack_of_unpack_is_identity() {
        let unit = parse(MODULE, FileId::new(0)).unwrap();
        let tree = unpack(&unit, &FlatLayout::default());
        let loader = tree.loader(Path::new("out"));
        let packed = pack(&Path::new("out").join(&tree.root), &loader).unwrap();
        assert_eq!(packed, unit);
    }

    #[test]
    fn test_clashing_names_get_suffixes() {
        let unit = parse(
            "database 4; object #1 endobject object @obj1 endobject object @OBJ1 endobject",
            FileId::new(0),
        )
        .unwrap();
        let tree = unpack(&unit, &FlatLayout::default());
        let paths: Vec<_> = tree.files.keys().skip(1).cloned().collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("objects/obj1.moo"),
                PathBuf::from("objects/obj1_2.moo"),
                PathBuf::from("objects/OBJ1_3.moo"),
            ]
        );
    }

    #[test]
    fn test_write_to_disk_and_pack_back() {
        let dir = tempfile::tempdir().unwrap();
        let unit = parse(MODULE, FileId::new(0)).unwrap();
        let tree = unpack(&unit, &FlatLayout::default());
        tree.write_to(dir.path()).unwrap();
        assert!(dir.path().join("objects/thing.moo").is_file());

        let packed = pack(&dir.path().join("module.moo"), &crate::project::FsLoader).unwrap();
        assert_eq!(packed, unit);
    }
}
