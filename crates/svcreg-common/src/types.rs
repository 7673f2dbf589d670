//! Core domain types used throughout the registry.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Marker that precedes every protocol and address field of an encoded endpoint.
pub const FIELD_MARKER: char = '$';

/// Separator between encoded endpoints inside a stored list blob (ASCII RS).
pub const LIST_SEPARATOR: char = '\u{1e}';

/// Name of a registered service; also the DHT key its endpoint list lives under.
///
/// # Example
/// ```
/// use svcreg_common::ServiceName;
///
/// let service = ServiceName::from("CacheService");
/// assert_eq!(service.as_str(), "CacheService");
/// ```
///
/// `From` conversions are unchecked and meant for names that already key
/// the DHT. Names arriving from outside go through [`ServiceName::parse`],
/// which deserialization uses as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new ServiceName.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a ServiceName, rejecting names that cannot key the DHT.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_service_name(name, "name is empty"));
        }
        if name.chars().any(char::is_control) {
            return Err(Error::invalid_service_name(
                name,
                "name contains a control character",
            ));
        }
        Ok(Self(name))
    }

    /// True when the name would be accepted by [`ServiceName::parse`].
    pub fn is_valid(&self) -> bool {
        Self::parse(self.0.as_str()).is_ok()
    }

    /// Returns the service name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Self::parse(name).map_err(serde::de::Error::custom)
    }
}

impl From<ServiceName> for String {
    fn from(service: ServiceName) -> Self {
        service.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol → address mapping describing one reachable service instance.
///
/// # Rust Learning Note
///
/// The map is a `BTreeMap`, so iteration is always in ascending protocol
/// order. That ordering is what makes the encoded form deterministic:
/// two descriptors with the same pairs always encode to the same bytes.
///
/// Deserialization goes through [`EndpointDescriptor::try_from`], so a
/// descriptor that would break the wire format is rejected at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct EndpointDescriptor {
    addresses: BTreeMap<String, String>,
}

impl EndpointDescriptor {
    /// Creates a descriptor with a single protocol.
    pub fn single(protocol: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        Self::from_pairs([(protocol.into(), address.into())])
    }

    /// Creates a descriptor from protocol/address pairs.
    pub fn from_pairs<I, P, A>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, A)>,
        P: Into<String>,
        A: Into<String>,
    {
        let mut addresses = BTreeMap::new();
        for (protocol, address) in pairs {
            let protocol = protocol.into();
            if addresses.insert(protocol.clone(), address.into()).is_some() {
                return Err(Error::malformed_endpoint(
                    protocol,
                    "protocol listed more than once",
                ));
            }
        }
        Self::try_from(addresses)
    }

    /// Returns the address registered for `protocol`, if any.
    pub fn address(&self, protocol: &str) -> Option<&str> {
        self.addresses.get(protocol).map(String::as_str)
    }

    /// Iterates over the protocols in ascending order.
    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.addresses.keys().map(String::as_str)
    }

    /// Iterates over (protocol, address) pairs in ascending protocol order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.addresses
            .iter()
            .map(|(protocol, address)| (protocol.as_str(), address.as_str()))
    }

    /// Number of protocols in the descriptor.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Always false for a validated descriptor.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

fn validate_field(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::malformed_endpoint(value, format!("empty {}", kind)));
    }
    if value.contains(FIELD_MARKER) || value.contains(LIST_SEPARATOR) {
        return Err(Error::malformed_endpoint(
            value,
            format!("{} contains a reserved character", kind),
        ));
    }
    Ok(())
}

impl TryFrom<BTreeMap<String, String>> for EndpointDescriptor {
    type Error = Error;

    fn try_from(addresses: BTreeMap<String, String>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(Error::malformed_endpoint("", "descriptor has no protocols"));
        }
        for (protocol, address) in &addresses {
            validate_field("protocol", protocol)?;
            validate_field("address", address)?;
        }
        Ok(Self { addresses })
    }
}

impl From<EndpointDescriptor> for BTreeMap<String, String> {
    fn from(descriptor: EndpointDescriptor) -> Self {
        descriptor.addresses
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (protocol, address) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", protocol, address)?;
            first = false;
        }
        Ok(())
    }
}

/// Canonical string identity of an endpoint.
///
/// Two registrations refer to the same endpoint iff their encodings are
/// byte-equal. Produced by the registry's address codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedEndpoint(String);

impl EncodedEndpoint {
    /// Wraps an already-encoded token without validating it.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_orders_protocols() {
        let descriptor = EndpointDescriptor::from_pairs([
            ("HTTP", "10.0.0.1:8080"),
            ("GRPC", "10.0.0.1:9000"),
        ])
        .unwrap();

        let protocols: Vec<_> = descriptor.protocols().collect();
        assert_eq!(protocols, vec!["GRPC", "HTTP"]);
        assert_eq!(descriptor.address("HTTP"), Some("10.0.0.1:8080"));
        assert_eq!(descriptor.address("UDP"), None);
    }

    #[test]
    fn test_descriptor_rejects_reserved_characters() {
        let result = EndpointDescriptor::single("GR$PC", "10.0.0.1:9000");
        assert!(matches!(result, Err(Error::MalformedEndpoint { .. })));

        let result = EndpointDescriptor::single("GRPC", "10.0.0.1\u{1e}9000");
        assert!(matches!(result, Err(Error::MalformedEndpoint { .. })));
    }

    #[test]
    fn test_descriptor_rejects_empty_input() {
        assert!(EndpointDescriptor::try_from(BTreeMap::new()).is_err());
        assert!(EndpointDescriptor::single("", "10.0.0.1:9000").is_err());
        assert!(EndpointDescriptor::single("GRPC", "").is_err());
    }

    #[test]
    fn test_descriptor_rejects_duplicate_protocol() {
        let result = EndpointDescriptor::from_pairs([("GRPC", "a:1"), ("GRPC", "b:2")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_descriptor_json_validation() {
        let descriptor: EndpointDescriptor =
            serde_json::from_str(r#"{"GRPC":"10.0.0.1:9000"}"#).unwrap();
        assert_eq!(descriptor.address("GRPC"), Some("10.0.0.1:9000"));

        let invalid = serde_json::from_str::<EndpointDescriptor>(r#"{"GRPC":"a$b"}"#);
        assert!(invalid.is_err());

        let empty = serde_json::from_str::<EndpointDescriptor>("{}");
        assert!(empty.is_err());
    }

    #[test]
    fn test_service_name_validation() {
        assert!(ServiceName::parse("CacheService").is_ok());
        assert!(matches!(
            ServiceName::parse(""),
            Err(Error::InvalidServiceName { .. })
        ));
        assert!(ServiceName::parse("   ").is_err());
        assert!(ServiceName::parse("Cache\u{1e}Service").is_err());
        assert!(!ServiceName::from("").is_valid());

        assert!(serde_json::from_str::<ServiceName>(r#""Cache""#).is_ok());
        assert!(serde_json::from_str::<ServiceName>(r#""""#).is_err());
        assert_eq!(
            serde_json::to_string(&ServiceName::from("Cache")).unwrap(),
            r#""Cache""#
        );
    }

    #[test]
    fn test_service_name_display() {
        let service = ServiceName::from("TestService");
        assert_eq!(format!("{}", service), "TestService");
    }
}
