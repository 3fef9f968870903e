//! Foundation types shared by every stage of the toolchain.
//!
//! - [`FileId`] - handle for a registered source file
//! - [`TextRange`], [`TextSize`] - byte positions
//! - [`LineCol`], [`LineIndex`] - line/column conversion
//! - [`Span`] - provenance attached to AST nodes and errors
//!
//! This module has no dependencies on other crate modules.

mod file_id;
mod span;

pub use file_id::FileId;
pub use span::{LineCol, LineIndex, Span, TextRange, TextSize};
