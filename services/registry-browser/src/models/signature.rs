//! Detached JWS signatures carried by schema 1 manifests.
//!
//! Signatures are passed through as received; they are never verified.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A detached JSON web signature over the manifest payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Unprotected header, naming the key and algorithm.
    pub header: SignatureHeader,

    /// Base64url signature value.
    pub signature: String,

    /// Base64url protected header.
    pub protected: String,
}

/// Header of a [`Signature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureHeader {
    /// The signing key.
    pub jwk: Jwk,

    /// Signature algorithm, e.g. `ES256` or `RS256`.
    pub alg: String,

    /// Header members not modelled above, such as `x5c`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A JSON web key.
///
/// The elliptic curve members are modelled; members of other key types
/// (`n` and `e` for RSA) are kept in [`Jwk::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Curve name, e.g. `P-256`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Key id.
    pub kid: String,
    /// Key type, e.g. `EC` or `RSA`.
    pub kty: String,
    /// Base64url x coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Base64url y coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Key members not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[test]
    fn ec_keys_have_coordinates() {
        let signature: Signature = serde_json::from_str(indoc! {r#"
            {
              "header": {
                "jwk": { "crv": "P-256", "kid": "K1", "kty": "EC", "x": "xx", "y": "yy" },
                "alg": "ES256"
              },
              "signature": "c2ln",
              "protected": "cHJv"
            }
        "#})
        .unwrap();

        assert_eq!(signature.header.jwk.crv.as_deref(), Some("P-256"));
        assert_eq!(signature.header.jwk.x.as_deref(), Some("xx"));
        assert!(signature.header.jwk.extra.is_empty());
        assert!(signature.header.extra.is_empty());
    }

    #[test]
    fn rsa_keys_keep_their_members() {
        let raw = json!({
            "header": {
                "jwk": { "kid": "K2", "kty": "RSA", "n": "modulus", "e": "AQAB" },
                "alg": "RS256",
                "x5c": ["cert"]
            },
            "signature": "c2ln",
            "protected": "cHJv"
        });

        let signature: Signature = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(signature.header.jwk.crv, None);
        assert_eq!(signature.header.jwk.y, None);
        assert_eq!(signature.header.jwk.extra["n"], "modulus");
        assert_eq!(signature.header.extra["x5c"], json!(["cert"]));

        assert_eq!(serde_json::to_value(&signature).unwrap(), raw);
    }
}
