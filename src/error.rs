//! Error taxonomy.
//!
//! Actions, decoders and middleware fail with [`Error`], a tagged error that
//! carries an explicit [`Kind`]. Error handlers switch on the kind directly to
//! pick a status code; nothing inspects concrete error types at runtime.
//!
//! Registration-time failures (bad route patterns, missing static files) are
//! [`MountError`]s and never reach a client.

use http::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What went wrong, from the client's point of view.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// The request was well-formed but failed validation. Client-caused.
    Validation,
    /// Anything else an action returned.
    Internal,
    /// The request body could not be parsed into the expected shape.
    Decode,
    /// The middleware chain completed without writing a response.
    Unhandled,
}

impl Kind {
    /// The status code an error of this kind maps to.
    pub fn status(self) -> StatusCode {
        match self {
            Self::Validation | Self::Decode => StatusCode::BAD_REQUEST,
            Self::Internal | Self::Unhandled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The error type returned by actions, decoders and middleware.
///
/// `Display` renders the message only; it is what the verbose error handler
/// writes into the response body.
#[derive(Debug, thiserror::Error)]
#[error("{msg}")]
pub struct Error {
    kind: Kind,
    msg: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: Kind, msg: impl Into<String>) -> Self {
        Self { kind, msg: msg.into(), source: None }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(Kind::Validation, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(Kind::Internal, msg)
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::new(Kind::Decode, msg)
    }

    /// The synthetic error raised when a request produced no response.
    pub fn unhandled() -> Self {
        Self::new(Kind::Unhandled, "unhandled request")
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::internal(format!("io: {e}")).with_source(e)
    }
}

/// Failures detected while registering routes or static files.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("invalid route `{pattern}`: {source}")]
    Route {
        pattern: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error(
        "path `{0}` may only include a wildcard that matches the entire end of the URL (e.g. *filepath)"
    )]
    PartialWildcard(String),

    #[error("cannot serve `{path}`: {source}")]
    MissingFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(Kind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Kind::Decode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(Kind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Kind::Unhandled.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = Error::internal("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(Error::unhandled().to_string(), "unhandled request");
    }

    #[test]
    fn io_errors_are_internal_and_keep_their_source() {
        use std::error::Error as _;

        let err: Error = std::io::Error::other("disk on fire").into();
        assert_eq!(err.kind(), Kind::Internal);
        assert!(err.source().is_some());
    }
}
