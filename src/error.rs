//! The single error type returned by every stage.
//!
//! Errors are terminal for the unit being processed: nothing partially
//! parsed, resolved or compiled is ever handed back alongside one.

use std::path::PathBuf;

use thiserror::Error;

use crate::base::Span;

pub type Result<T, E = MooError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MooError {
    #[error("{span}: lex error: {message}")]
    Lex { span: Span, message: String },

    #[error("{span}: parse error: expected {expected}, found {found}")]
    Parse {
        span: Span,
        expected: String,
        found: String,
    },

    #[error("{span}: duplicate definition of {name} (first defined at {previous})")]
    DuplicateDefinition {
        span: Span,
        name: String,
        previous: Span,
    },

    #[error("{span}: undefined reference {name}: {reason}")]
    UndefinedReference {
        span: Span,
        name: String,
        reason: String,
    },

    #[error("{span}: forward declaration {name} is never defined")]
    UnresolvedForwardDeclaration { span: Span, name: String },

    #[error("{span}: circular parent chain through {name}: {}", .cycle.join(" -> "))]
    CircularParent {
        span: Span,
        name: String,
        cycle: Vec<String>,
    },

    #[error("{span}: parent {name} must be defined before its children")]
    ForwardParent { span: Span, name: String },

    #[error("{span}: cannot include {}: {reason}", .path.display())]
    IncludeNotFound {
        span: Span,
        path: PathBuf,
        reason: String,
    },

    #[error("{span}: include cycle: {}", display_chain(.chain))]
    IncludeCycle { span: Span, chain: Vec<PathBuf> },

    #[error("{span}: module {module} {found} does not satisfy {required}")]
    VersionConstraint {
        span: Span,
        module: String,
        required: String,
        found: String,
    },

    #[error("{span}: cannot transform verb body: {message}")]
    TransformInvariant { span: Span, message: String },

    #[error("{span}: recycled object #{number} {reason}")]
    RecycledConflict {
        span: Span,
        number: i64,
        reason: String,
    },

    #[error("invalid database image: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl MooError {
    /// Source position of the error, when it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            MooError::Lex { span, .. }
            | MooError::Parse { span, .. }
            | MooError::DuplicateDefinition { span, .. }
            | MooError::UndefinedReference { span, .. }
            | MooError::UnresolvedForwardDeclaration { span, .. }
            | MooError::CircularParent { span, .. }
            | MooError::ForwardParent { span, .. }
            | MooError::IncludeNotFound { span, .. }
            | MooError::IncludeCycle { span, .. }
            | MooError::VersionConstraint { span, .. }
            | MooError::TransformInvariant { span, .. }
            | MooError::RecycledConflict { span, .. } => Some(*span),
            MooError::Image(_) | MooError::Io(_) => None,
        }
    }

    pub(crate) fn parse(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        MooError::Parse {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn undefined(span: Span, name: impl Into<String>, reason: impl Into<String>) -> Self {
        MooError::UndefinedReference {
            span,
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transform(span: Span, message: impl Into<String>) -> Self {
        MooError::TransformInvariant {
            span,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MooError {
    fn from(err: serde_json::Error) -> Self {
        MooError::Image(err.to_string())
    }
}
