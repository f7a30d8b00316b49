/// Category of an [`Error`], used to test membership through wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidValue,
    Crypto,
    Option,
    Storage,
    Invariant,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("crypto: {0}")]
    Crypto(String),

    #[error("option: {0}")]
    Option(Box<Error>),

    #[error("storage: {0}")]
    Storage(String),

    #[error("invariant: {0}")]
    Invariant(String),

    #[error("{0}: {1}")]
    Context(String, Box<Error>),
}

impl Error {
    /// The innermost category of this error, looking through context frames.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidValue(_) => ErrorKind::InvalidValue,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Option(_) => ErrorKind::Option,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Invariant(_) => ErrorKind::Invariant,
            Error::Context(_, inner) => inner.kind(),
        }
    }

    /// Whether `kind` appears at any level of the wrapping chain.
    ///
    /// An `option: invalid value: …` error is both an option error and an
    /// invalid-value error.
    pub fn is(&self, kind: ErrorKind) -> bool {
        match self {
            Error::Option(inner) => kind == ErrorKind::Option || inner.is(kind),
            Error::Context(_, inner) => inner.is(kind),
            _ => self.kind() == kind,
        }
    }

    /// Prefixes a context frame in front of the whole error:
    /// `advance chain: invalid value: master key is not set`.
    pub(crate) fn context(self, context: impl Into<String>) -> Error {
        Error::Context(context.into(), Box::new(self))
    }

    /// Adds a context frame inside the error's own category, keeping the
    /// category in front: `crypto: encrypt header: new cipher: …`.
    ///
    /// Used by call sites that introduce the category and the context as
    /// one unit; [`Error::context`] by contrast is for sites that only add
    /// context around an error categorized further down. Composite errors
    /// keep their shape and gain a plain context frame.
    pub(crate) fn context_in_kind(self, context: impl Into<String>) -> Error {
        let context = context.into();
        match self {
            Error::InvalidValue(msg) => Error::InvalidValue(format!("{context}: {msg}")),
            Error::Crypto(msg) => Error::Crypto(format!("{context}: {msg}")),
            Error::Storage(msg) => Error::Storage(format!("{context}: {msg}")),
            Error::Invariant(msg) => Error::Invariant(format!("{context}: {msg}")),
            other => Error::Context(context, Box::new(other)),
        }
    }
}
