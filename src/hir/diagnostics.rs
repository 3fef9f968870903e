//! Diagnostics: errors and warnings in a reportable shape.
//!
//! Every stage fails with a [`MooError`]; batch runs and the CLI turn those
//! into [`Diagnostic`]s with a stable code so that many units can be reported
//! at once. [`lint`] adds warnings for things that are legal but suspicious.

use std::path::PathBuf;
use std::sync::Arc;

use crate::base::{FileId, LineCol, Span, TextRange};
use crate::error::MooError;
use crate::syntax::ast::{CompilationUnit, Item, PropertyValue, UnitKind};

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A diagnostic message with location.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// The file containing this diagnostic.
    pub file: FileId,
    /// Start position (0-indexed).
    pub start: LineCol,
    pub range: TextRange,
    pub severity: Severity,
    /// Stable code such as `E0004`.
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
    pub related: Vec<RelatedInfo>,
}

/// A secondary location, such as the first of two duplicate definitions.
#[derive(Clone, Debug)]
pub struct RelatedInfo {
    pub file: FileId,
    pub start: LineCol,
    pub message: Arc<str>,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<Arc<str>>) -> Self {
        Self::new(span, Severity::Error, message)
    }

    pub fn warning(span: Span, message: impl Into<Arc<str>>) -> Self {
        Self::new(span, Severity::Warning, message)
    }

    fn new(span: Span, severity: Severity, message: impl Into<Arc<str>>) -> Self {
        Self {
            file: span.file,
            start: span.start,
            range: span.range,
            severity,
            code: None,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_related(mut self, span: Span, message: impl Into<Arc<str>>) -> Self {
        self.related.push(RelatedInfo {
            file: span.file,
            start: span.start,
            message: message.into(),
        });
        self
    }

    /// `path:line:col: error[E0004]: message`, with related notes on
    /// following lines. `path_of` maps file ids to paths.
    pub fn render(&self, path_of: impl Fn(FileId) -> Option<PathBuf>) -> String {
        let location = |file: FileId, start: LineCol| match path_of(file) {
            Some(path) => format!("{}:{start}", path.display()),
            None => format!("{file}:{start}"),
        };
        let mut out = format!(
            "{}: {}",
            location(self.file, self.start),
            self.severity.label()
        );
        if let Some(code) = &self.code {
            out.push_str(&format!("[{code}]"));
        }
        out.push_str(": ");
        out.push_str(&self.message);
        for note in &self.related {
            out.push_str(&format!(
                "\n  note: {}: {}",
                location(note.file, note.start),
                note.message
            ));
        }
        out
    }
}

impl From<&MooError> for Diagnostic {
    fn from(err: &MooError) -> Self {
        let span = err.span().unwrap_or_else(Span::detached);
        let text = err.to_string();
        let message = match err.span() {
            Some(span) => text
                .strip_prefix(&format!("{span}: "))
                .map_or(text.clone(), str::to_string),
            None => text,
        };
        let diagnostic = Diagnostic::error(span, message).with_code(codes::for_error(err));
        match err {
            MooError::DuplicateDefinition { name, previous, .. } => {
                diagnostic.with_related(*previous, format!("{name} first defined here"))
            }
            _ => diagnostic,
        }
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Stable diagnostic codes.
pub mod codes {
    use crate::error::MooError;

    pub const LEX: &str = "E0001";
    pub const PARSE: &str = "E0002";
    pub const DUPLICATE_DEFINITION: &str = "E0003";
    pub const UNDEFINED_REFERENCE: &str = "E0004";
    pub const UNRESOLVED_FORWARD: &str = "E0005";
    pub const CIRCULAR_PARENT: &str = "E0006";
    pub const FORWARD_PARENT: &str = "E0007";
    pub const INCLUDE_NOT_FOUND: &str = "E0008";
    pub const INCLUDE_CYCLE: &str = "E0009";
    pub const VERSION_CONSTRAINT: &str = "E0010";
    pub const TRANSFORM: &str = "E0011";
    pub const RECYCLED_CONFLICT: &str = "E0012";
    pub const IMAGE: &str = "E0013";
    pub const IO: &str = "E0014";

    /// An `include` that reached the resolver unexpanded.
    pub const UNEXPANDED_INCLUDE: &str = "W0001";
    /// An object without a `name` clause.
    pub const UNNAMED_OBJECT: &str = "W0002";
    /// `inherited` with nothing overridden.
    pub const EMPTY_OVERRIDE: &str = "W0003";

    pub fn for_error(err: &MooError) -> &'static str {
        match err {
            MooError::Lex { .. } => LEX,
            MooError::Parse { .. } => PARSE,
            MooError::DuplicateDefinition { .. } => DUPLICATE_DEFINITION,
            MooError::UndefinedReference { .. } => UNDEFINED_REFERENCE,
            MooError::UnresolvedForwardDeclaration { .. } => UNRESOLVED_FORWARD,
            MooError::CircularParent { .. } => CIRCULAR_PARENT,
            MooError::ForwardParent { .. } => FORWARD_PARENT,
            MooError::IncludeNotFound { .. } => INCLUDE_NOT_FOUND,
            MooError::IncludeCycle { .. } => INCLUDE_CYCLE,
            MooError::VersionConstraint { .. } => VERSION_CONSTRAINT,
            MooError::TransformInvariant { .. } => TRANSFORM,
            MooError::RecycledConflict { .. } => RECYCLED_CONFLICT,
            MooError::Image(_) => IMAGE,
            MooError::Io(_) => IO,
        }
    }
}

// ============================================================================
// LINTS
// ============================================================================

/// Warnings for a unit that parsed. None of these stop compilation.
pub fn lint(unit: &CompilationUnit) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for item in &unit.items {
        match item {
            Item::Include(include) if !matches!(unit.kind, UnitKind::Bare) => out.push(
                Diagnostic::warning(
                    include.span,
                    format!("include \"{}\" was not expanded; run pack first", include.path),
                )
                .with_code(codes::UNEXPANDED_INCLUDE),
            ),
            Item::Object(obj) => {
                if obj.name.is_empty() {
                    out.push(
                        Diagnostic::warning(obj.span, format!("object {} has no name", obj.id))
                            .with_code(codes::UNNAMED_OBJECT),
                    );
                }
                for prop in &obj.properties {
                    if prop.value == PropertyValue::Inherited(None)
                        && prop.flags.is_empty()
                        && prop.owner.is_none()
                    {
                        out.push(
                            Diagnostic::warning(
                                prop.span,
                                format!("inherited property {} overrides nothing", prop.name),
                            )
                            .with_code(codes::EMPTY_OVERRIDE),
                        );
                    }
                }
            }
            Item::Forward(_) | Item::Include(_) => {}
        }
    }
    out
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics across units.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a failed unit.
    pub fn error(&mut self, err: &MooError) {
        self.add(Diagnostic::from(err));
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.file == file).collect()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Sort by file and position so reports do not depend on worker order.
    pub fn sort(&mut self) {
        self.diagnostics
            .sort_by_key(|d| (d.file, d.start.line, d.start.col));
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parser::parse;

    fn span_at(line: u32, col: u32) -> Span {
        Span::new(FileId::new(0), TextRange::default(), LineCol::new(line, col))
    }

    #[test]
    fn test_error_converts_with_code_and_plain_message() {
        let err = MooError::UnresolvedForwardDeclaration {
            span: span_at(2, 0),
            name: "@x".into(),
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some(codes::UNRESOLVED_FORWARD));
        assert_eq!(&*diag.message, "forward declaration @x is never defined");
        assert_eq!(diag.start, LineCol::new(2, 0));
    }

    #[test]
    fn test_duplicate_points_at_previous() {
        let err = MooError::DuplicateDefinition {
            span: span_at(5, 0),
            name: "@a".into(),
            previous: span_at(1, 0),
        };
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.related.len(), 1);
        assert_eq!(diag.related[0].start, LineCol::new(1, 0));
    }

    #[test]
    fn test_render_uses_path_lookup() {
        let path = PathBuf::from("core/module.moo");
        let diag = Diagnostic::error(span_at(0, 4), "bad").with_code(codes::PARSE);
        assert_eq!(
            diag.render(|_| Some(path.clone())),
            "core/module.moo:1:5: error[E0002]: bad"
        );
        assert_eq!(diag.render(|_| None), "file#0:1:5: error[E0002]: bad");
    }

    #[test]
    fn test_lint_reports_suspicious_items() {
        let unit = parse(
            "module m;\ninclude \"x.moo\";\nobject @a property p inherited endobject",
            FileId::new(0),
        )
        .unwrap();
        let codes: Vec<_> = lint(&unit)
            .into_iter()
            .map(|d| d.code.unwrap().to_string())
            .collect();
        assert_eq!(
            codes,
            vec![
                codes::UNEXPANDED_INCLUDE,
                codes::UNNAMED_OBJECT,
                codes::EMPTY_OVERRIDE
            ]
        );
    }

    #[test]
    fn test_collector_counts_and_sorts() {
        let mut collector = DiagnosticCollector::new();
        collector.add(Diagnostic::warning(span_at(9, 0), "later"));
        collector.error(&MooError::Image("truncated".into()));
        collector.add(Diagnostic::error(span_at(1, 0), "earlier"));
        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.has_errors());

        collector.sort();
        assert_eq!(&*collector.diagnostics()[0].message, "earlier");
        assert_eq!(collector.take().len(), 3);
        assert!(!collector.has_errors());
    }
}
