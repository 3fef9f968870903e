//! Semantic layer: reference resolution and diagnostics.
//!
//! ```text
//! CompilationUnit ──resolve(exports)──► ResolvedUnit ──► image::compile
//!                        │
//!                        └─ MooError ──► Diagnostic
//! ```

pub mod diagnostics;
pub mod exports;
pub mod resolve;
pub mod symbols;

pub use diagnostics::{Diagnostic, DiagnosticCollector, RelatedInfo, Severity, lint};
pub use exports::{ExportTable, ExportTarget, ModuleExports, ModuleInterface, Version, VersionReq};
pub use resolve::{ResolvedUnit, Resolver, resolve};
pub use symbols::{Definition, Symbol, SymbolTable};
