//! Checking many units at once.
//!
//! Every `module.moo` and `database.moo` below a directory is a unit root.
//! All roots are packed in parallel, the module interfaces they declare are
//! gathered into one export table, and then every unit is resolved in
//! parallel against it. One unit failing never stops the others.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::{MooError, Result};
use crate::hir::{
    DiagnosticCollector, ExportTable, ExportTarget, ModuleInterface, ResolvedUnit, Resolver,
    lint,
};
use crate::syntax::ast::{CompilationUnit, UnitKind};

use super::pack::{Packer, SourceLoader};
use super::source::SourceDb;

/// File names that start a unit.
pub const ROOT_FILES: [&str; 2] = ["module.moo", "database.moo"];

/// Unit roots below `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut roots = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|err| MooError::Io(err.into()))?;
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() && ROOT_FILES.contains(&name.as_ref()) {
            roots.push(entry.into_path());
        }
    }
    tracing::debug!(dir = %dir.display(), roots = roots.len(), "discovered units");
    Ok(roots)
}

/// The interface a module unit offers to others before it is compiled.
///
/// Export targets are opaque: object numbers exist only after compilation.
pub fn interface_of(unit: &CompilationUnit) -> Option<ModuleInterface> {
    let UnitKind::Module(header) = &unit.kind else {
        return None;
    };
    let version = header.version.as_deref().and_then(|v| v.parse().ok());
    let mut interface = ModuleInterface::new(header.name.clone(), version);
    for export in &header.exports {
        interface = interface.with_export(
            export.name.clone(),
            ExportTarget::Opaque(format!("{}::{}", header.name, export.name).into()),
        );
    }
    Some(interface)
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Units that resolved, by root path.
    pub resolved: Vec<(PathBuf, ResolvedUnit)>,
    /// Roots that failed.
    pub failed: Vec<PathBuf>,
    pub diagnostics: DiagnosticCollector,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Pack and resolve every root. `extra` supplies modules that live outside
/// the batch; modules found in the batch take precedence.
pub fn check(
    roots: &[PathBuf],
    loader: &dyn SourceLoader,
    sources: &SourceDb,
    extra: &[ModuleInterface],
) -> BatchReport {
    let packed: Vec<(PathBuf, Result<CompilationUnit>)> = roots
        .par_iter()
        .map(|root| (root.clone(), Packer::new(loader, sources).pack(root)))
        .collect();

    let exports: ExportTable = extra
        .iter()
        .cloned()
        .chain(
            packed
                .iter()
                .filter_map(|(_, unit)| unit.as_ref().ok().and_then(interface_of)),
        )
        .collect();
    tracing::debug!(modules = exports.len(), "collected module interfaces");

    let resolver = Resolver::new(&exports);
    let outcomes: Vec<(PathBuf, Result<ResolvedUnit>, Vec<_>)> = packed
        .into_par_iter()
        .map(|(root, unit)| match unit {
            Ok(unit) => {
                let warnings = lint(&unit);
                (root, resolver.resolve(unit), warnings)
            }
            Err(err) => (root, Err(err), Vec::new()),
        })
        .collect();

    let mut report = BatchReport::default();
    for (root, outcome, warnings) in outcomes {
        report.diagnostics.extend(warnings);
        match outcome {
            Ok(resolved) => report.resolved.push((root, resolved)),
            Err(err) => {
                tracing::debug!(root = %root.display(), error = %err, "unit failed");
                report.diagnostics.error(&err);
                report.failed.push(root);
            }
        }
    }
    report.diagnostics.sort();
    report
}
