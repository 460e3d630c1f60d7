//! Resolution errors.
//!
//! Every failure is plain data: a variant naming the kind of problem plus the
//! file location and scope/symbol/parameter path it concerns. Callers match on
//! the variant (or on [`Error::kind`]); the `Display` text is for humans.

use bindery_ast::{Location, ScopePath};
use thiserror::Error;

use crate::registry::ParamKind;

/// Resolution result type
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Lexing or parsing failed.
    #[error("{location}: syntax error: {message}")]
    Syntax { location: Location, message: String },

    #[error("{}unknown configurable `{name}`", at(.location))]
    UnknownConfigurable {
        name: String,
        location: Option<Location>,
    },

    /// A short name matched the suffix of several registrations.
    #[error("{}ambiguous configurable `{name}`, candidates: {}", at(.location), .candidates.join(", "))]
    AmbiguousConfigurable {
        name: String,
        candidates: Vec<String>,
        location: Option<Location>,
    },

    #[error("configurable `{name}` is already registered")]
    DuplicateRegistration { name: String },

    #[error("{}configurable `{symbol}` has no parameter `{param}`", at(.location))]
    UnknownParameter {
        symbol: String,
        param: String,
        location: Option<Location>,
    },

    #[error("missing required parameter `{param}` of `{}`", node_label(.scope, .symbol))]
    MissingRequiredParameter {
        scope: ScopePath,
        symbol: String,
        param: String,
    },

    #[error("{location}: undefined macro `%{name}`")]
    UndefinedMacro { name: String, location: Location },

    #[error("cyclic reference: {}", .chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error("{}circular include: {}", at(.location), .chain.join(" -> "))]
    CircularInclude {
        chain: Vec<String>,
        location: Option<Location>,
    },

    #[error("{}cannot load `{path}`: {reason}", at(.location))]
    FileLoad {
        path: String,
        reason: String,
        location: Option<Location>,
    },

    #[error("parameter `{param}` of `{}` expects {expected}, got {found}", node_label(.scope, .symbol))]
    ParameterType {
        scope: ScopePath,
        symbol: String,
        param: String,
        expected: ParamKind,
        found: String,
    },

    /// The external constructor callback reported a failure.
    #[error("constructor for `{}` failed: {message}", node_label(.scope, .symbol))]
    Constructor {
        scope: ScopePath,
        symbol: String,
        message: String,
    },

    #[error("invalid registry manifest: {0}")]
    Manifest(String),
}

/// Fieldless mirror of [`Error`] for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    UnknownConfigurable,
    AmbiguousConfigurable,
    DuplicateRegistration,
    UnknownParameter,
    MissingRequiredParameter,
    UndefinedMacro,
    CyclicReference,
    CircularInclude,
    FileLoad,
    ParameterType,
    Constructor,
    Manifest,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::UnknownConfigurable => "UnknownConfigurable",
            ErrorKind::AmbiguousConfigurable => "AmbiguousConfigurable",
            ErrorKind::DuplicateRegistration => "DuplicateRegistration",
            ErrorKind::UnknownParameter => "UnknownParameter",
            ErrorKind::MissingRequiredParameter => "MissingRequiredParameter",
            ErrorKind::UndefinedMacro => "UndefinedMacro",
            ErrorKind::CyclicReference => "CyclicReference",
            ErrorKind::CircularInclude => "CircularIncludeError",
            ErrorKind::FileLoad => "FileLoadError",
            ErrorKind::ParameterType => "ParameterType",
            ErrorKind::Constructor => "ConstructorFailed",
            ErrorKind::Manifest => "InvalidManifest",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax { .. } => ErrorKind::Syntax,
            Error::UnknownConfigurable { .. } => ErrorKind::UnknownConfigurable,
            Error::AmbiguousConfigurable { .. } => ErrorKind::AmbiguousConfigurable,
            Error::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
            Error::UnknownParameter { .. } => ErrorKind::UnknownParameter,
            Error::MissingRequiredParameter { .. } => ErrorKind::MissingRequiredParameter,
            Error::UndefinedMacro { .. } => ErrorKind::UndefinedMacro,
            Error::CyclicReference { .. } => ErrorKind::CyclicReference,
            Error::CircularInclude { .. } => ErrorKind::CircularInclude,
            Error::FileLoad { .. } => ErrorKind::FileLoad,
            Error::ParameterType { .. } => ErrorKind::ParameterType,
            Error::Constructor { .. } => ErrorKind::Constructor,
            Error::Manifest(_) => ErrorKind::Manifest,
        }
    }

    /// Source location of the offending statement, when one is known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Syntax { location, .. } | Error::UndefinedMacro { location, .. } => {
                Some(location)
            }
            Error::UnknownConfigurable { location, .. }
            | Error::AmbiguousConfigurable { location, .. }
            | Error::UnknownParameter { location, .. }
            | Error::CircularInclude { location, .. }
            | Error::FileLoad { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Attach a location to errors that were raised without one.
    ///
    /// Registry lookups have no idea which statement asked; the caller does.
    pub fn at(mut self, loc: Location) -> Self {
        match &mut self {
            Error::UnknownConfigurable { location, .. }
            | Error::AmbiguousConfigurable { location, .. }
            | Error::UnknownParameter { location, .. }
            | Error::CircularInclude { location, .. }
            | Error::FileLoad { location, .. } => {
                if location.is_none() {
                    *location = Some(loc);
                }
            }
            _ => {}
        }
        self
    }
}

fn at(location: &Option<Location>) -> String {
    location
        .as_ref()
        .map(|loc| format!("{}: ", loc))
        .unwrap_or_default()
}

fn node_label(scope: &ScopePath, symbol: &str) -> String {
    if scope.is_root() {
        symbol.to_string()
    } else {
        format!("{}/{}", scope, symbol)
    }
}
