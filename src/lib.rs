//! # moosrc
//!
//! Tooling for MOO object databases kept as `.moo` source files.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! image     → compile to / decompile from a database image
//!   ↓
//! project   → source db, pack/unpack of include trees, batch checks
//!   ↓
//! hir       → reference resolution, diagnostics
//!   ↓
//! transform → internal ↔ external verb code
//!   ↓
//! syntax    → tokens, lexer, parser, AST, printer
//!   ↓
//! base      → FileId, Span, LineIndex
//! ```
//!
//! A typical pipeline:
//!
//! ```no_run
//! use std::path::Path;
//! use moosrc::hir::{ExportTable, resolve};
//! use moosrc::image::{CompileOptions, compile};
//! use moosrc::project::{FsLoader, pack};
//!
//! # fn main() -> moosrc::Result<()> {
//! let unit = pack(Path::new("core/module.moo"), &FsLoader)?;
//! let resolved = resolve(unit, &ExportTable::new())?;
//! let image = compile(&resolved, &CompileOptions::default())?.image;
//! std::fs::write("core.json", image.to_bytes()?)?;
//! # Ok(())
//! # }
//! ```

/// Foundation types: FileId, Span, line/column positions
pub mod base;

pub mod error;

/// Database image and the compile/decompile bridge
pub mod image;

/// Reference resolution and diagnostics
pub mod hir;

/// Files on disk: pack, unpack, batch checks
pub mod project;

/// Lexer, parser, AST and printer
pub mod syntax;

/// Internal ↔ external verb code
pub mod transform;

pub use base::{FileId, LineCol, LineIndex, Span, TextRange, TextSize};
pub use error::{MooError, Result};
