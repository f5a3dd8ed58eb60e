//! Signed token encoding and stateless verification.

use std::collections::HashSet;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{TokenClaims, TokenError, validate_claims};
use crate::Principal;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Process-wide symmetric signing key.
///
/// Injected into [`TokenCodec`] at construction; never read from global state.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Issues tokens for principals and decodes them back.
///
/// Decoding trusts the signed claims entirely: no user lookup happens per
/// request.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(key: SigningKey) -> Result<Self, TokenError> {
        if key.is_empty() {
            return Err(TokenError::EmptyKey);
        }
        if key.len() < 32 {
            tracing::warn!("signing key is shorter than recommended (32 bytes)");
        }

        // Expiry is checked by `validate_claims` against the caller's clock.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        })
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    /// Sign a token for `principal` as if issued at `now`.
    pub fn issue_at(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = TokenClaims::for_principal(principal, now);
        jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Principal, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Verify `token` and rebuild its principal, judging expiry against `now`.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        check_structure(token)?;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::SignatureInvalid
                }
                // Header and payload were decoded by `check_structure`, so a
                // base64 failure here can only come from the signature.
                ErrorKind::Base64(_) => TokenError::SignatureInvalid,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims.into_principal())
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

/// Separate "not a token at all" from "a token whose signature is wrong".
///
/// Three non-empty segments are required; header and payload must be
/// base64url JSON. Anything wrong with the third segment is a signature
/// problem, never a structural one.
fn check_structure(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(TokenError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };
    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(TokenError::Malformed("empty segment".to_string()));
    }

    jsonwebtoken::decode_header(token)
        .map_err(|e| TokenError::Malformed(format!("header: {}", e)))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;
    serde_json::from_slice::<serde_json::Value>(&payload)
        .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;

    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::SignatureInvalid)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;
    use crate::Role;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(SigningKey::new(secret)).unwrap()
    }

    fn test_codec() -> TokenCodec {
        codec("test-secret-key-that-is-long-enough-for-testing")
    }

    fn admin() -> Principal {
        Principal::new("alice", [Role::USER, Role::ADMIN])
    }

    #[test]
    fn issued_token_decodes_to_same_principal() {
        let codec = test_codec();
        let token = codec.issue(&admin()).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), admin());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(
            TokenCodec::new(SigningKey::new("")).unwrap_err(),
            TokenError::EmptyKey
        );
    }

    #[test]
    fn token_expires_after_one_hour() {
        let codec = test_codec();
        let issued_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = codec.issue_at(&admin(), issued_at).unwrap();

        assert!(codec.decode_at(&token, issued_at + Duration::minutes(59)).is_ok());
        assert_eq!(
            codec.decode_at(&token, issued_at + Duration::minutes(61)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn wrong_key_fails_signature_check() {
        let token = codec("secret-one-for-testing-purposes").issue(&admin()).unwrap();
        let result = codec("secret-two-for-testing-purposes").decode(&token);
        assert_eq!(result, Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn any_change_to_the_signature_is_rejected() {
        let codec = test_codec();
        let token = codec.issue(&admin()).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;

        for pos in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert_eq!(
                codec.decode(&tampered),
                Err(TokenError::SignatureInvalid),
                "position {pos} accepted a tampered signature"
            );
        }
    }

    #[test]
    fn forged_payload_is_rejected() {
        let codec = test_codec();
        let token = codec
            .issue(&Principal::new("mallory", [Role::USER]))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let now = Utc::now().timestamp();
        let forged_claims = serde_json::json!({
            "sub": "mallory",
            "authorities": ["ROLE_ADMIN"],
            "isAdmin": true,
            "iat": now,
            "exp": now + 3600,
        });
        let forged_payload = URL_SAFE_NO_PAD.encode(forged_claims.to_string());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.decode(&forged), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = test_codec();
        for input in ["", "abc", "a.b", "a.b.c.d", "invalid.token.here", "..", "x..y"] {
            let err = codec.decode(input).unwrap_err();
            assert!(
                matches!(err, TokenError::Malformed(_)),
                "{input:?} produced {err:?}"
            );
        }
    }

    #[test]
    fn missing_subject_is_malformed() {
        let codec = test_codec();
        let token = codec.issue(&admin()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let now = Utc::now().timestamp();
        let claims = serde_json::json!({ "authorities": [], "iat": now, "exp": now + 60 });
        let unsigned = format!("{}.{}", parts[0], URL_SAFE_NO_PAD.encode(claims.to_string()));
        let signature = jsonwebtoken::crypto::sign(
            unsigned.as_bytes(),
            &EncodingKey::from_secret(b"test-secret-key-that-is-long-enough-for-testing"),
            ALGORITHM,
        )
        .unwrap();
        let token = format!("{unsigned}.{signature}");

        assert!(matches!(codec.decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn admin_flag_in_payload_is_not_trusted() {
        let codec = test_codec();
        let user = Principal::new("bob", [Role::USER]);
        let token = codec.issue(&user).unwrap();

        let decoded = codec.decode(&token).unwrap();
        assert!(!decoded.is_admin());
        assert_eq!(decoded.roles().names(), vec!["ROLE_USER"]);
    }

    proptest! {
        #[test]
        fn claims_survive_a_round_trip(
            username in "[a-zA-Z0-9_.@-]{1,32}",
            roles in prop::collection::btree_set("ROLE_[A-Z]{1,12}", 0..5),
        ) {
            let codec = test_codec();
            let principal = Principal::new(username, roles.into_iter().map(Role::from));

            let token = codec.issue(&principal).unwrap();
            let decoded = codec.decode(&token).unwrap();

            prop_assert_eq!(decoded.username(), principal.username());
            prop_assert_eq!(decoded.roles(), principal.roles());
        }
    }
}
