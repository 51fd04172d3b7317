use std::path::PathBuf;

use thiserror::Error;

/// Error type shared across docseed crates.
///
/// Every variant aborts the top-level call that produced it; nothing in the
/// pipeline recovers locally.
#[derive(Debug, Error)]
pub enum Error {
    /// An input file could not be parsed into a document tree.
    #[error("parse error{}: {message}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
    /// A fragment extends itself, directly or through other fragments.
    #[error("cyclic $extend: {}", .chain.join(" -> "))]
    CyclicExtend { chain: Vec<String> },
    /// `$extend` names a fragment that is not defined.
    #[error("unknown fragment '{0}'")]
    UnknownFragment(String),
    /// An `$eval` expression failed to parse or to evaluate.
    #[error("evaluation of '{expression}' failed: {message}")]
    Evaluation { expression: String, message: String },
    /// A `$require` target could not be read, parsed or composed.
    #[error("compose error{}: {message}", display_path(.path))]
    Compose {
        path: Option<PathBuf>,
        message: String,
    },
    /// The store driver reported a failure.
    #[error("store error: {0}")]
    Store(String),
    /// Directives are used in a shape the resolver cannot interpret.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn compose(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Compose {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidDocument(message.into())
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

/// Convenience alias for results returned by docseed crates.
pub type Result<T> = std::result::Result<T, Error>;
