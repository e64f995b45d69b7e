//! Content-negotiated decoding and encoding.
//!
//! Each [`Version`](crate::Version) owns a [`Codecs`] table: decoder pools
//! keyed by request media type, encoder pools keyed by response media type,
//! and an optional default on each side for requests that match nothing.
//!
//! Codecs exchange values through the serde data model
//! ([`serde_json::Value`]), which keeps [`Decoder`] and [`Encoder`] object-safe.
//! [`Context::decode_request`](crate::Context::decode_request) and
//! [`Context::respond`](crate::Context::respond) do the typed conversion.

mod json;
mod pool;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::Error;

pub use json::{JsonDecoder, JsonEncoder};
pub use pool::Pool;

/// Parses a request body.
pub trait Decoder: Send {
    fn decode(&mut self, body: &[u8]) -> Result<Value, Error>;
}

/// Serializes a response value.
pub trait Encoder: Send {
    fn encode(&mut self, value: &Value) -> Result<Bytes, Error>;
}

type DecoderPool = Arc<Pool<dyn Decoder>>;
type EncoderPool = Arc<Pool<dyn Encoder>>;

/// Decoder and encoder pools for one version.
#[derive(Debug, Default)]
pub struct Codecs {
    decoders: HashMap<String, DecoderPool>,
    default_decoder: Option<DecoderPool>,
    encoders: HashMap<String, EncoderPool>,
    default_encoder: Option<EncoderPool>,
    encodable: Vec<String>,
}

impl Codecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for every type in `content_types`. A later
    /// registration for the same type replaces the earlier one.
    pub fn set_decoder<F, D>(&mut self, factory: F, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: Decoder + 'static,
    {
        let types = normalize_all(content_types);
        let pool: DecoderPool = Arc::new(Pool::new(
            Box::new(move || Box::new(factory()) as Box<dyn Decoder>),
            types.clone(),
        ));
        for ct in types {
            self.decoders.insert(ct, Arc::clone(&pool));
        }
        if make_default {
            self.default_decoder = Some(pool);
        }
    }

    /// Encoder counterpart of [`set_decoder`](Codecs::set_decoder). Types are
    /// appended to the encodable list in registration order.
    pub fn set_encoder<F, E>(&mut self, factory: F, make_default: bool, content_types: &[&str])
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: Encoder + 'static,
    {
        let types = normalize_all(content_types);
        let pool: EncoderPool = Arc::new(Pool::new(
            Box::new(move || Box::new(factory()) as Box<dyn Encoder>),
            types.clone(),
        ));
        for ct in types {
            if !self.encodable.contains(&ct) {
                self.encodable.push(ct.clone());
            }
            self.encoders.insert(ct, Arc::clone(&pool));
        }
        if make_default {
            self.default_encoder = Some(pool);
        }
    }

    /// Media types with a registered encoder, in registration order.
    pub fn encodable(&self) -> &[String] {
        &self.encodable
    }

    /// Decodes `body` with the decoder registered for `content_type`, falling
    /// back to the default decoder.
    pub fn decode(&self, content_type: Option<&str>, body: &[u8]) -> Result<Value, Error> {
        let declared = content_type.map(media_type).unwrap_or_default();
        let pool = self
            .decoders
            .get(&declared)
            .or(self.default_decoder.as_ref())
            .ok_or_else(|| {
                Error::decode(format!("no decoder registered for content type `{declared}`"))
            })?;
        pool.with(|decoder| decoder.decode(body))
    }

    /// Encodes `value` for the first acceptable type with a registered
    /// encoder, falling back to the default encoder. Returns the content type
    /// to declare alongside the bytes.
    pub fn encode(&self, accept: Option<&str>, value: &Value) -> Result<(String, Bytes), Error> {
        let (content_type, pool) = self.negotiate(accept).ok_or_else(|| {
            Error::internal(format!(
                "no encoder for accepted types `{}`",
                accept.unwrap_or_default()
            ))
        })?;
        let body = pool.with(|encoder| encoder.encode(value))?;
        Ok((content_type, body))
    }

    fn negotiate(&self, accept: Option<&str>) -> Option<(String, &EncoderPool)> {
        if let Some(accept) = accept {
            for wanted in parse_accept(accept) {
                if let Some(found) = self.lookup_encoder(&wanted) {
                    return Some(found);
                }
            }
        }
        if let Some(pool) = &self.default_encoder {
            let ct = pool.content_types().first().cloned().unwrap_or_default();
            return Some((ct, pool));
        }
        // No Accept header at all means anything goes.
        match accept {
            None => self.lookup_encoder("*/*"),
            Some(_) => None,
        }
    }

    fn lookup_encoder(&self, wanted: &str) -> Option<(String, &EncoderPool)> {
        let ct = if wanted == "*/*" {
            self.encodable.first()?
        } else if let Some(major) = wanted.strip_suffix("/*") {
            self.encodable
                .iter()
                .find(|ct| ct.split('/').next() == Some(major))?
        } else {
            self.encoders.get_key_value(wanted)?.0
        };
        self.encoders.get(ct).map(|pool| (ct.clone(), pool))
    }
}

/// Lower-cased media type without parameters: `Application/JSON; charset=utf-8`
/// becomes `application/json`.
pub(crate) fn media_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn normalize_all(content_types: &[&str]) -> Vec<String> {
    content_types.iter().map(|ct| media_type(ct)).filter(|ct| !ct.is_empty()).collect()
}

/// Media types from an `Accept` header, most preferred first. Entries with
/// equal weight keep their declared order; `q=0` entries are dropped.
fn parse_accept(header: &str) -> Vec<String> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let mt = parts.next()?.trim().to_ascii_lowercase();
            if mt.is_empty() {
                return None;
            }
            let q = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|v| v.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            (q > 0.0).then_some((mt, q))
        })
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries.into_iter().map(|(mt, _)| mt).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    /// Stands in for an XML codec: tags its output so tests can tell it apart.
    struct TaggedDecoder(&'static str);

    impl Decoder for TaggedDecoder {
        fn decode(&mut self, _body: &[u8]) -> Result<Value, Error> {
            Ok(json!({ "decoded_by": self.0 }))
        }
    }

    struct TaggedEncoder(&'static str);

    impl Encoder for TaggedEncoder {
        fn encode(&mut self, _value: &Value) -> Result<Bytes, Error> {
            Ok(Bytes::from_static(self.0.as_bytes()))
        }
    }

    #[test]
    fn decoder_matches_declared_type_ignoring_parameters() {
        let mut codecs = Codecs::new();
        codecs.set_decoder(|| JsonDecoder, false, &["application/json"]);

        let value = codecs
            .decode(Some("Application/JSON; charset=utf-8"), br#"{"a":1}"#)
            .unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn unknown_type_falls_back_to_default_decoder() {
        let mut codecs = Codecs::new();
        codecs.set_decoder(|| JsonDecoder, false, &["application/json"]);
        codecs.set_decoder(|| TaggedDecoder("xml"), true, &["application/xml"]);

        let value = codecs.decode(Some("text/unknown"), b"<a/>").unwrap();
        assert_eq!(value, json!({"decoded_by": "xml"}));
    }

    #[test]
    fn unknown_type_without_default_fails_to_decode() {
        let mut codecs = Codecs::new();
        codecs.set_decoder(|| TaggedDecoder("xml"), false, &["application/xml"]);

        let err = codecs.decode(Some("text/unknown"), b"<a/>").unwrap_err();
        assert_eq!(err.kind(), Kind::Decode);
    }

    #[test]
    fn accept_weights_pick_the_preferred_encoder() {
        let mut codecs = Codecs::new();
        codecs.set_encoder(JsonEncoder::default, true, &["application/json"]);
        codecs.set_encoder(|| TaggedEncoder("<xml/>"), false, &["application/xml"]);

        let (ct, body) = codecs
            .encode(Some("application/json;q=0.5, application/xml"), &json!({}))
            .unwrap();
        assert_eq!(ct, "application/xml");
        assert_eq!(&body[..], b"<xml/>");
    }

    #[test]
    fn unmatched_accept_uses_default_encoder() {
        let mut codecs = Codecs::new();
        codecs.set_encoder(JsonEncoder::default, true, &["application/json", "text/json"]);

        let (ct, _) = codecs.encode(Some("image/png"), &json!(1)).unwrap();
        assert_eq!(ct, "application/json");
    }

    #[test]
    fn wildcards_match_encodable_types_in_registration_order() {
        let mut codecs = Codecs::new();
        codecs.set_encoder(|| TaggedEncoder("xml"), false, &["application/xml"]);
        codecs.set_encoder(|| TaggedEncoder("text"), false, &["text/plain"]);

        let (ct, _) = codecs.encode(Some("text/*"), &json!(null)).unwrap();
        assert_eq!(ct, "text/plain");
        let (ct, _) = codecs.encode(Some("*/*"), &json!(null)).unwrap();
        assert_eq!(ct, "application/xml");
        let (ct, _) = codecs.encode(None, &json!(null)).unwrap();
        assert_eq!(ct, "application/xml");
    }

    #[test]
    fn no_acceptable_encoder_is_an_error() {
        let mut codecs = Codecs::new();
        codecs.set_encoder(|| TaggedEncoder("xml"), false, &["application/xml"]);

        assert!(codecs.encode(Some("application/json"), &json!(1)).is_err());
    }

    #[test]
    fn zero_weight_entries_are_ignored() {
        assert_eq!(
            parse_accept("text/html;q=0, application/json, */*;q=0.1"),
            ["application/json", "*/*"]
        );
    }
}
