//! OAI identifier codec and set-spec slug derivation.
//!
//! External identifiers have the form `oai:{namespace}:{local-key}` where the
//! local key is percent-encoded on the wire. Parsing decodes the local key;
//! rendering re-encodes it, so identifiers round-trip losslessly even when
//! the underlying native key contains `/`, spaces, or other reserved
//! characters (repository handles routinely contain `/`).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ProviderError;

/// Scheme prefix required on every identifier string.
pub const OAI_SCHEME: &str = "oai";

/// Everything outside the RFC 3986 unreserved set is encoded in local keys.
const LOCAL_KEY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A parsed OAI identifier: `(namespace, local key)`.
///
/// Immutable value type; constructed by [`OaiIdentifier::parse`] from an
/// incoming identifier string, or by [`OaiIdentifier::compose`] from an
/// index-native key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaiIdentifier {
    pub namespace: String,
    /// Decoded local key (the repository-native key, e.g. `1903.1/12345`).
    pub local_key: String,
}

impl OaiIdentifier {
    /// Parses an identifier string, percent-decoding the local key.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MalformedIdentifier`] if the string does not
    /// start with the `oai:` scheme, is missing either of the two delimited
    /// components, or the local key is not valid percent-encoded UTF-8.
    pub fn parse(identifier: &str) -> Result<Self, ProviderError> {
        let malformed = || ProviderError::MalformedIdentifier(identifier.to_string());

        let mut parts = identifier.splitn(3, ':');
        let scheme = parts.next().ok_or_else(malformed)?;
        let namespace = parts.next().ok_or_else(malformed)?;
        let encoded_key = parts.next().ok_or_else(malformed)?;
        if scheme != OAI_SCHEME || namespace.is_empty() || encoded_key.is_empty() {
            return Err(malformed());
        }

        let local_key = percent_decode_str(encoded_key)
            .decode_utf8()
            .map_err(|_| malformed())?
            .into_owned();

        Ok(OaiIdentifier {
            namespace: namespace.to_string(),
            local_key,
        })
    }

    /// Builds an identifier from an index-native key. No decoding is applied;
    /// the key is taken verbatim as the local key.
    pub fn compose(namespace: &str, native_key: &str) -> Self {
        OaiIdentifier {
            namespace: namespace.to_string(),
            local_key: native_key.to_string(),
        }
    }

    /// Renders the identifier string, percent-encoding the local key.
    /// Inverse of [`OaiIdentifier::parse`].
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}",
            OAI_SCHEME,
            self.namespace,
            utf8_percent_encode(&self.local_key, LOCAL_KEY_ENCODE)
        )
    }
}

impl std::fmt::Display for OaiIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Derives a set spec slug from a set name: lowercased, with every run of
/// non-alphanumeric characters collapsed to a single `_`, and leading or
/// trailing separators dropped.
///
/// The derivation is total and deterministic. Distinct names can collide on
/// the same spec (`"Fine Arts"` and `"fine-arts"`); the set catalog logs
/// collisions rather than silently merging them.
pub fn derive_set_spec(name: &str) -> String {
    let mut spec = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !spec.is_empty() {
                spec.push('_');
            }
            pending_sep = false;
            spec.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_identifier() {
        let id = OaiIdentifier::parse("oai:fcrepo-local:12345").unwrap();
        assert_eq!(id.namespace, "fcrepo-local");
        assert_eq!(id.local_key, "12345");
    }

    #[test]
    fn test_parse_decodes_local_key() {
        let id = OaiIdentifier::parse("oai:fcrepo-local:1903.1%2F12345").unwrap();
        assert_eq!(id.local_key, "1903.1/12345");
    }

    #[test]
    fn test_round_trip_with_reserved_characters() {
        // slash, space, colon in the local key
        for s in [
            "oai:fcrepo-local:1903.1%2F12345",
            "oai:fcrepo-local:with%20space",
            "oai:fcrepo-local:scheme%3Akey",
            "oai:fcrepo-local:plain-key_1.0~x",
        ] {
            let id = OaiIdentifier::parse(s).unwrap();
            assert_eq!(id.render(), s);
        }
    }

    #[test]
    fn test_compose_does_not_decode() {
        let id = OaiIdentifier::compose("fcrepo-local", "1903.1/12345");
        assert_eq!(id.local_key, "1903.1/12345");
        assert_eq!(id.render(), "oai:fcrepo-local:1903.1%2F12345");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for s in ["not-an-id", "oai:", "oai:fcrepo-local", "oai::key", "urn:x:y", ""] {
            assert!(
                matches!(
                    OaiIdentifier::parse(s),
                    Err(ProviderError::MalformedIdentifier(_))
                ),
                "expected {s:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_display_matches_render() {
        let id = OaiIdentifier::compose("ns", "a/b");
        assert_eq!(id.to_string(), id.render());
    }

    #[test]
    fn test_derive_set_spec_is_deterministic() {
        assert_eq!(derive_set_spec("Fine Arts, 19th c."), "fine_arts_19th_c");
        assert_eq!(derive_set_spec("FINE ARTS  19TH C"), "fine_arts_19th_c");
    }

    #[test]
    fn test_derive_set_spec_trims_separators() {
        assert_eq!(derive_set_spec("  Music Collection  "), "music_collection");
        assert_eq!(derive_set_spec("---"), "");
    }
}
