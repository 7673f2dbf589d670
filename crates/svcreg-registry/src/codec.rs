//! Address codec.
//!
//! Wire format:
//!
//! - An endpoint token is every `(protocol, address)` pair of the
//!   descriptor, in ascending protocol order, each field preceded by `$`:
//!   `$GRPC$10.0.0.1:9000$HTTP$10.0.0.1:8080`.
//! - A list blob is the UTF-8 bytes of the tokens joined by ASCII RS
//!   (`0x1E`). The empty list is the empty blob.
//!
//! Descriptor validation keeps both reserved characters out of protocols
//! and addresses, so field and endpoint boundaries never collide.

use std::collections::BTreeMap;
use svcreg_common::{
    EncodedEndpoint, EndpointDescriptor, Error, Result, FIELD_MARKER, LIST_SEPARATOR,
};

/// Encodes a descriptor into its canonical token.
pub fn encode_endpoint(descriptor: &EndpointDescriptor) -> EncodedEndpoint {
    let mut token = String::new();
    for (protocol, address) in descriptor.iter() {
        token.push(FIELD_MARKER);
        token.push_str(protocol);
        token.push(FIELD_MARKER);
        token.push_str(address);
    }
    EncodedEndpoint::new(token)
}

/// Decodes a token back into the descriptor it was produced from.
pub fn decode_endpoint(token: &EncodedEndpoint) -> Result<EndpointDescriptor> {
    let raw = token.as_str();
    let body = raw
        .strip_prefix(FIELD_MARKER)
        .ok_or_else(|| Error::malformed_endpoint(raw, "missing leading field marker"))?;

    let fields: Vec<&str> = body.split(FIELD_MARKER).collect();
    if fields.len() % 2 != 0 {
        return Err(Error::malformed_endpoint(raw, "protocol without address"));
    }

    let mut addresses = BTreeMap::new();
    for pair in fields.chunks_exact(2) {
        let (protocol, address) = (pair[0], pair[1]);
        if protocol.is_empty() || address.is_empty() {
            return Err(Error::malformed_endpoint(raw, "empty field"));
        }
        if addresses
            .insert(protocol.to_string(), address.to_string())
            .is_some()
        {
            return Err(Error::malformed_endpoint(raw, "duplicate protocol"));
        }
    }

    EndpointDescriptor::try_from(addresses)
}

/// Joins tokens into a single DHT value.
pub fn encode_list(endpoints: &[EncodedEndpoint]) -> Vec<u8> {
    let mut buf = [0u8; 4];
    let separator: &str = LIST_SEPARATOR.encode_utf8(&mut buf);

    endpoints
        .iter()
        .map(EncodedEndpoint::as_str)
        .collect::<Vec<_>>()
        .join(separator)
        .into_bytes()
}

/// Splits a DHT value back into its tokens. The empty blob is the empty list.
pub fn decode_list(blob: &[u8]) -> Result<Vec<EncodedEndpoint>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }

    let text = std::str::from_utf8(blob).map_err(|e| {
        Error::malformed_endpoint(String::from_utf8_lossy(blob), format!("invalid UTF-8: {}", e))
    })?;

    text.split(LIST_SEPARATOR)
        .map(|token| {
            if token.is_empty() {
                Err(Error::malformed_endpoint(text, "empty endpoint in list"))
            } else {
                Ok(EncodedEndpoint::new(token))
            }
        })
        .collect()
}
