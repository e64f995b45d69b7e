//! API versions.
//!
//! A version bundles a routing table with the codecs its actions use. The
//! empty name is the unversioned default scope.

use std::sync::Arc;

use bytes::Bytes;
use http::header::HeaderName;

use crate::codec::{Codecs, Decoder, Encoder};
use crate::mux::Mux;

/// One named version under construction.
pub struct Version {
    name: String,
    mux: Mux,
    codecs: Codecs,
}

impl Version {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.to_owned(), mux: Mux::new(), codecs: Codecs::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mux(&mut self) -> &mut Mux {
        &mut self.mux
    }

    pub fn codecs(&self) -> &Codecs {
        &self.codecs
    }

    /// See [`Codecs::set_decoder`].
    pub fn set_decoder<F, D>(&mut self, factory: F, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: Decoder + 'static,
    {
        self.codecs.set_decoder(factory, make_default, content_types);
    }

    /// See [`Codecs::set_encoder`].
    pub fn set_encoder<F, E>(&mut self, factory: F, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: Encoder + 'static,
    {
        self.codecs.set_encoder(factory, make_default, content_types);
    }

    pub(crate) fn freeze(self) -> FrozenVersion {
        FrozenVersion { mux: self.mux, codecs: Arc::new(self.codecs) }
    }
}

/// A version after configuration: nothing in it changes again.
pub(crate) struct FrozenVersion {
    pub(crate) mux: Mux,
    pub(crate) codecs: Arc<Codecs>,
}

/// Picks the version that serves a request.
///
/// Requests naming no version, or one that was never registered, are served
/// by the default version.
#[derive(Clone, Debug)]
pub enum VersionSelector {
    /// The version is the value of a request header.
    Header(HeaderName),
    /// The version is the first path segment, as in `/v2/bottles`. Routes
    /// keep the segment in their patterns.
    PathSegment,
}

impl VersionSelector {
    pub(crate) fn select<'r>(&self, req: &'r http::Request<Bytes>) -> Option<&'r str> {
        match self {
            Self::Header(name) => req.headers().get(name)?.to_str().ok(),
            Self::PathSegment => req.uri().path().trim_start_matches('/').split('/').next(),
        }
    }
}

impl Default for VersionSelector {
    fn default() -> Self {
        Self::Header(HeaderName::from_static("x-api-version"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_selector_reads_the_header() {
        let req = http::Request::builder()
            .header("X-Api-Version", "v2")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(VersionSelector::default().select(&req), Some("v2"));
    }

    #[test]
    fn path_selector_reads_the_first_segment() {
        let req = http::Request::builder().uri("/v1/bottles/3").body(Bytes::new()).unwrap();
        assert_eq!(VersionSelector::PathSegment.select(&req), Some("v1"));
    }
}
