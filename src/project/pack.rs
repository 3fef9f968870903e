//! Include expansion: a multi-file module tree to one compilation unit.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::Span;
use crate::error::{MooError, Result};
use crate::syntax::ast::{CompilationUnit, Item};
use crate::syntax::parser::{parse, parse_bare};

use super::source::SourceDb;

// ============================================================================
// LOADERS
// ============================================================================

/// Where `pack` reads files from.
pub trait SourceLoader: Sync {
    fn load(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads from disk.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Reads from an in-memory path → text map.
#[derive(Clone, Debug, Default)]
pub struct MemoryLoader {
    files: FxHashMap<PathBuf, Arc<str>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<Arc<str>>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<Arc<str>>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> std::io::Result<String> {
        self.files
            .get(&normalize(path))
            .map(|text| text.to_string())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }
}

// ============================================================================
// PACK
// ============================================================================

/// Expands includes depth-first, registering every file it reads.
pub struct Packer<'a> {
    loader: &'a dyn SourceLoader,
    sources: &'a SourceDb,
    /// Files currently being expanded, outermost first.
    stack: Vec<PathBuf>,
    active: FxHashSet<PathBuf>,
}

impl<'a> Packer<'a> {
    pub fn new(loader: &'a dyn SourceLoader, sources: &'a SourceDb) -> Self {
        Self {
            loader,
            sources,
            stack: Vec::new(),
            active: FxHashSet::default(),
        }
    }

    /// Read `root` and splice every included file's items in place of its
    /// `include`. The result contains no `include` items. A packer can be
    /// reused after a failed run.
    pub fn pack(&mut self, root: &Path) -> Result<CompilationUnit> {
        self.stack.clear();
        self.active.clear();
        let root = normalize(root);
        let text = self.loader.load(&root)?;
        let file = self.sources.add(&root, text.as_str());
        let unit = parse(&text, file)?;
        tracing::debug!(root = %root.display(), items = unit.items.len(), "packing");

        self.enter(root);
        let items = self.expand(unit.items)?;
        self.leave();
        Ok(CompilationUnit {
            kind: unit.kind,
            items,
        })
    }

    fn expand(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Include(include) => {
                    let path = self.relative(&include.path);
                    out.extend(self.include(path, include.span)?);
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn include(&mut self, path: PathBuf, span: Span) -> Result<Vec<Item>> {
        if self.active.contains(&path) {
            let start = self.stack.iter().position(|p| *p == path).unwrap_or(0);
            let mut chain = self.stack[start..].to_vec();
            chain.push(path);
            return Err(MooError::IncludeCycle { span, chain });
        }
        let text = self.loader.load(&path).map_err(|err| MooError::IncludeNotFound {
            span,
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let file = self.sources.add(&path, text.as_str());
        let unit = parse_bare(&text, file)?;
        tracing::trace!(path = %path.display(), items = unit.items.len(), "included");

        self.enter(path);
        let items = self.expand(unit.items)?;
        self.leave();
        Ok(items)
    }

    /// `target` relative to the directory of the file being expanded.
    fn relative(&self, target: &str) -> PathBuf {
        let base = self
            .stack
            .last()
            .and_then(|p| p.parent())
            .unwrap_or_else(|| Path::new(""));
        normalize(&base.join(target))
    }

    fn enter(&mut self, path: PathBuf) {
        self.active.insert(path.clone());
        self.stack.push(path);
    }

    fn leave(&mut self) {
        if let Some(path) = self.stack.pop() {
            self.active.remove(&path);
        }
    }
}

/// Pack `root` with a private source database.
pub fn pack(root: &Path, loader: &dyn SourceLoader) -> Result<CompilationUnit> {
    let sources = SourceDb::new();
    Packer::new(loader, &sources).pack(root)
}

/// Remove `.` and fold `..` without touching the file system.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::Reference;

    fn ids(unit: &CompilationUnit) -> Vec<String> {
        unit.objects().map(|o| o.id.to_string()).collect()
    }

    #[test]
    fn test_includes_expand_in_place_and_nest() {
        let loader = MemoryLoader::new()
            .with_file(
                "core/module.moo",
                "module core;\nobject @a endobject\ninclude \"objects/b.moo\";\nobject @d endobject",
            )
            .with_file(
                "core/objects/b.moo",
                "object @b endobject\ninclude \"../more/c.moo\"",
            )
            .with_file("core/more/c.moo", "object @c parent @b endobject");
        let unit = pack(Path::new("core/module.moo"), &loader).unwrap();
        assert_eq!(ids(&unit), vec!["@a", "@b", "@c", "@d"]);
        assert!(unit.items.iter().all(|i| !matches!(i, Item::Include(_))));
        let c = unit.objects().nth(2).unwrap();
        assert_eq!(c.parent, Some(Reference::Local("b".into())));
    }

    #[test]
    fn test_missing_include_names_path() {
        let loader = MemoryLoader::new().with_file("main.moo", "include \"gone.moo\"");
        let err = pack(Path::new("main.moo"), &loader).unwrap_err();
        match err {
            MooError::IncludeNotFound { path, .. } => assert_eq!(path, PathBuf::from("gone.moo")),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_include_cycle_reports_chain() {
        let loader = MemoryLoader::new()
            .with_file("main.moo", "include \"a.moo\"")
            .with_file("a.moo", "include \"sub/b.moo\"")
            .with_file("sub/b.moo", "include \"../a.moo\"");
        let err = pack(Path::new("main.moo"), &loader).unwrap_err();
        match err {
            MooError::IncludeCycle { chain, .. } => assert_eq!(
                chain,
                vec![
                    PathBuf::from("a.moo"),
                    PathBuf::from("sub/b.moo"),
                    PathBuf::from("a.moo")
                ]
            ),
            other => panic!("unexpected {other}"),
        }
    }

    /// Fails the first read of `flaky`, then serves `inner`.
    struct FailOnce {
        inner: MemoryLoader,
        flaky: PathBuf,
        failed: std::sync::atomic::AtomicBool,
    }

    impl SourceLoader for FailOnce {
        fn load(&self, path: &Path) -> std::io::Result<String> {
            use std::sync::atomic::Ordering;
            if path == self.flaky && !self.failed.swap(true, Ordering::SeqCst) {
                return Err(std::io::Error::other("busy"));
            }
            self.inner.load(path)
        }
    }

    #[test]
    fn test_packer_reuse_after_failure() {
        let loader = FailOnce {
            inner: MemoryLoader::new()
                .with_file("main.moo", "include \"x.moo\"")
                .with_file("x.moo", "object @x endobject include \"y.moo\"")
                .with_file("y.moo", "object @y endobject"),
            flaky: PathBuf::from("y.moo"),
            failed: Default::default(),
        };
        let sources = SourceDb::new();
        let mut packer = Packer::new(&loader, &sources);
        assert!(matches!(
            packer.pack(Path::new("main.moo")),
            Err(MooError::IncludeNotFound { .. })
        ));
        let unit = packer.pack(Path::new("main.moo")).unwrap();
        assert_eq!(ids(&unit), vec!["@x", "@y"]);
    }

    #[test]
    fn test_same_file_twice_is_not_a_cycle() {
        let loader = MemoryLoader::new()
            .with_file("main.moo", "include \"x.moo\" include \"x.moo\"")
            .with_file("x.moo", "forward @x;");
        let unit = pack(Path::new("main.moo"), &loader).unwrap();
        assert_eq!(unit.items.len(), 2);
    }

    #[test]
    fn test_included_file_may_not_have_header() {
        let loader = MemoryLoader::new()
            .with_file("main.moo", "include \"x.moo\"")
            .with_file("x.moo", "module x;");
        assert!(matches!(
            pack(Path::new("main.moo"), &loader),
            Err(MooError::Parse { .. })
        ));
    }

    #[test]
    fn test_spans_map_back_to_files() {
        let loader = MemoryLoader::new()
            .with_file("main.moo", "include \"x.moo\"")
            .with_file("x.moo", "\n\nobject @x endobject");
        let sources = SourceDb::new();
        let unit = Packer::new(&loader, &sources)
            .pack(Path::new("./main.moo"))
            .unwrap();
        let span = unit.objects().next().unwrap().span;
        assert_eq!(sources.path(span.file), Some(PathBuf::from("x.moo")));
        assert_eq!(span.start.line_one_indexed(), 3);
    }

    #[test]
    fn test_normalize_is_lexical() {
        assert_eq!(normalize(Path::new("a/./b/../c.moo")), PathBuf::from("a/c.moo"));
        assert_eq!(normalize(Path::new("../x.moo")), PathBuf::from("../x.moo"));
        assert_eq!(normalize(Path::new("a/../../x.moo")), PathBuf::from("../x.moo"));
    }
}
