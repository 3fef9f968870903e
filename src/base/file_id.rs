//! Identifiers for `.moo` source files.

use std::fmt;

/// A small handle naming one source file inside a [`SourceDb`].
///
/// Paths are looked up in the source db when a diagnostic is rendered.
///
/// [`SourceDb`]: crate::project::SourceDb
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct FileId(pub u32);

impl FileId {
    /// Id used for text that did not come from a file (decompiled programs,
    /// ad-hoc strings handed to the parser).
    pub const DETACHED: FileId = FileId(u32::MAX);

    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Whether this is [`FileId::DETACHED`].
    #[inline]
    pub const fn is_detached(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            f.write_str("FileId(detached)")
        } else {
            write!(f, "FileId({})", self.0)
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            f.write_str("<input>")
        } else {
            write!(f, "file#{}", self.0)
        }
    }
}

impl From<u32> for FileId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}
