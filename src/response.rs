//! The buffered response slot behind a [`Context`](crate::Context).
//!
//! Handlers never build an `http::Response` themselves. They write through the
//! context, which records status, headers and body here exactly once; the
//! dispatcher turns the slot into the outgoing response when the chain is done.

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

/// The outgoing response type handed to hyper.
pub type Response = http::Response<Full<Bytes>>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Media types the runtime writes on its own: codec defaults, error bodies and
/// static files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,         // text/css
    Html,        // text/html; charset=utf-8
    Javascript,  // application/javascript
    Json,        // application/json
    OctetStream, // application/octet-stream
    Pdf,         // application/pdf
    Png,         // image/png
    Svg,         // image/svg+xml
    Text,        // text/plain; charset=utf-8
    Xml,         // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Css         => "text/css",
            Self::Html        => "text/html; charset=utf-8",
            Self::Javascript  => "application/javascript",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }

    /// Guesses from a file extension; unknown extensions are binary.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css"          => Self::Css,
            "htm" | "html" => Self::Html,
            "js" | "mjs"   => Self::Javascript,
            "json"         => Self::Json,
            "pdf"          => Self::Pdf,
            "png"          => Self::Png,
            "svg"          => Self::Svg,
            "txt"          => Self::Text,
            "xml"          => Self::Xml,
            _              => Self::OctetStream,
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── ResponseState ─────────────────────────────────────────────────────────────

/// Write-once response slot. `status` is `None` until the first write.
#[derive(Debug, Default)]
pub(crate) struct ResponseState {
    pub(crate) status: Option<StatusCode>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl ResponseState {
    /// Moves headers and body out into the wire response.
    ///
    /// A slot nobody wrote to becomes an empty `500`: the client still gets
    /// exactly one response even if every error handler failed to write.
    /// The status stays recorded, so the slot keeps rejecting writes.
    pub(crate) fn take(&mut self) -> Response {
        let status = *self.status.get_or_insert(StatusCode::INTERNAL_SERVER_ERROR);
        let mut res = http::Response::new(Full::new(std::mem::take(&mut self.body)));
        *res.status_mut() = status;
        *res.headers_mut() = std::mem::take(&mut self.headers);
        res
    }
}

pub(crate) fn status_only(status: StatusCode) -> Response {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_content_types() {
        assert_eq!(ContentType::from_extension("HTML"), ContentType::Html);
        assert_eq!(ContentType::from_extension("css"), ContentType::Css);
        assert_eq!(ContentType::from_extension("tar"), ContentType::OctetStream);
    }

    #[test]
    fn unwritten_slot_becomes_empty_500() {
        let mut slot = ResponseState::default();
        let res = slot.take();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().is_empty());
        assert_eq!(slot.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
