//! JSON codecs.

use bytes::Bytes;
use serde_json::Value;

use super::{Decoder, Encoder};
use crate::error::Error;

/// Decodes `application/json` bodies.
#[derive(Debug, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&mut self, body: &[u8]) -> Result<Value, Error> {
        serde_json::from_slice(body).map_err(|e| Error::decode(format!("invalid JSON: {e}")).with_source(e))
    }
}

/// Encodes values as JSON, reusing its output buffer between calls.
#[derive(Debug, Default)]
pub struct JsonEncoder {
    buf: Vec<u8>,
}

impl Encoder for JsonEncoder {
    fn encode(&mut self, value: &Value) -> Result<Bytes, Error> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, value)
            .map_err(|e| Error::internal(format!("encode JSON: {e}")).with_source(e))?;
        Ok(Bytes::copy_from_slice(&self.buf))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Kind;

    #[test]
    fn decode_failure_is_a_decode_error() {
        let err = JsonDecoder.decode(b"{not json").unwrap_err();
        assert_eq!(err.kind(), Kind::Decode);
        assert!(err.message().starts_with("invalid JSON"));
    }

    #[test]
    fn encoder_output_does_not_leak_between_calls() {
        let mut enc = JsonEncoder::default();
        let long = enc.encode(&json!({"name": "a fairly long value"})).unwrap();
        let short = enc.encode(&json!(1)).unwrap();
        assert_eq!(&long[..], br#"{"name":"a fairly long value"}"#);
        assert_eq!(&short[..], b"1");
    }
}
