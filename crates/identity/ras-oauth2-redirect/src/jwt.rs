//! ID token verification.

use crate::error::{RedirectError, RedirectResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `aud` may be a single string or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims of a verified ID token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub additional_claims: HashMap<String, serde_json::Value>,
}

/// What the ID token must assert for the login that requested it
#[derive(Debug, Clone)]
pub struct ExpectedClaims {
    pub issuer: String,
    pub audience: String,
    pub nonce: Option<String>,
    /// Clock skew tolerance in seconds
    pub leeway: u64,
}

/// Verifies signature and claims of an ID token.
pub trait IdTokenVerifier: Send + Sync {
    fn verify(&self, id_token: &str, expected: &ExpectedClaims) -> RedirectResult<IdTokenClaims>;
}

/// [`IdTokenVerifier`] backed by `jsonwebtoken` with a fixed decoding key.
pub struct JwtIdTokenVerifier {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtIdTokenVerifier {
    pub fn new(key: DecodingKey, algorithm: Algorithm) -> Self {
        Self { key, algorithm }
    }

    /// HS256 with a shared secret
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// RS256 with a PEM encoded public key
    pub fn from_rsa_pem(pem: &[u8]) -> RedirectResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| RedirectError::Config(format!("invalid RSA public key: {e}")))?;
        Ok(Self::new(key, Algorithm::RS256))
    }
}

impl IdTokenVerifier for JwtIdTokenVerifier {
    fn verify(&self, id_token: &str, expected: &ExpectedClaims) -> RedirectResult<IdTokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = expected.leeway;
        validation.set_issuer(&[expected.issuer.as_str()]);
        validation.set_audience(&[expected.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let token_data = decode::<IdTokenClaims>(id_token, &self.key, &validation)
            .map_err(|e| RedirectError::IdToken(e.to_string()))?;
        let claims = token_data.claims;

        if let Some(nonce) = &expected.nonce {
            match &claims.nonce {
                Some(actual) if actual == nonce => {}
                Some(_) => {
                    return Err(RedirectError::IdToken(
                        "nonce claim mismatch".to_string(),
                    ));
                }
                None => {
                    return Err(RedirectError::IdToken(
                        "nonce claim missing".to_string(),
                    ));
                }
            }
        }

        Ok(claims)
    }
}
