//! Random values and PKCE derivation on top of a pluggable crypto provider.

use crate::error::{RedirectError, RedirectResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Number of random bytes behind `state` and `nonce` values.
pub const STATE_BYTES: usize = 32;

/// Number of random bytes behind a PKCE verifier (86 characters once encoded).
pub const VERIFIER_BYTES: usize = 64;

pub const CODE_CHALLENGE_METHOD: &str = "S256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

/// Source of randomness and message digests.
///
/// Implementations report a missing or broken primitive with
/// [`RedirectError::PlatformUnsupported`].
pub trait CryptoProvider: Send + Sync {
    fn random_bytes(&self, len: usize) -> RedirectResult<Vec<u8>>;

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> RedirectResult<Vec<u8>>;
}

/// Operating system RNG and SHA-256 from `sha2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCryptoProvider;

impl CryptoProvider for OsCryptoProvider {
    fn random_bytes(&self, len: usize) -> RedirectResult<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RedirectError::PlatformUnsupported(format!("random source: {e}")))?;
        Ok(bytes)
    }

    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> RedirectResult<Vec<u8>> {
        match algorithm {
            DigestAlgorithm::Sha256 => Ok(Sha256::digest(data).to_vec()),
            other => Err(RedirectError::PlatformUnsupported(format!(
                "digest algorithm {other:?}"
            ))),
        }
    }
}

/// URL-safe random string built from `len` random bytes.
pub fn random_url_safe_string(crypto: &dyn CryptoProvider, len: usize) -> RedirectResult<String> {
    let bytes = crypto.random_bytes(len)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// PKCE code challenge and verifier
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

impl PkceChallenge {
    /// Generate a new PKCE pair from the given provider.
    pub fn generate(crypto: &dyn CryptoProvider) -> RedirectResult<Self> {
        let code_verifier = random_url_safe_string(crypto, VERIFIER_BYTES)?;
        let code_challenge = Self::challenge_for(crypto, &code_verifier)?;

        Ok(Self {
            code_verifier,
            code_challenge,
            code_challenge_method: CODE_CHALLENGE_METHOD,
        })
    }

    pub fn challenge_for(crypto: &dyn CryptoProvider, verifier: &str) -> RedirectResult<String> {
        let digest = crypto.digest(DigestAlgorithm::Sha256, verifier.as_bytes())?;
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Provider whose primitives are all missing.
    pub(crate) struct UnavailableCrypto;

    impl CryptoProvider for UnavailableCrypto {
        fn random_bytes(&self, _len: usize) -> RedirectResult<Vec<u8>> {
            Err(RedirectError::PlatformUnsupported(
                "no random source".to_string(),
            ))
        }

        fn digest(&self, _algorithm: DigestAlgorithm, _data: &[u8]) -> RedirectResult<Vec<u8>> {
            Err(RedirectError::PlatformUnsupported("no digest".to_string()))
        }
    }

    #[test]
    fn test_pkce_generation() {
        let crypto = OsCryptoProvider;
        let pkce1 = PkceChallenge::generate(&crypto).unwrap();
        let pkce2 = PkceChallenge::generate(&crypto).unwrap();

        assert_ne!(pkce1.code_verifier, pkce2.code_verifier);
        assert_ne!(pkce1.code_challenge, pkce2.code_challenge);
        assert_eq!(pkce1.code_challenge_method, "S256");

        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce1.code_verifier.as_bytes()));
        assert_eq!(pkce1.code_challenge, expected);

        // RFC 7636 bounds
        assert!(pkce1.code_verifier.len() >= 43);
        assert!(pkce1.code_verifier.len() <= 128);
    }

    #[test]
    fn test_known_challenge() {
        // RFC 7636 appendix B
        let challenge = PkceChallenge::challenge_for(
            &OsCryptoProvider,
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk",
        )
        .unwrap();
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_random_strings_are_url_safe() {
        let value = random_url_safe_string(&OsCryptoProvider, STATE_BYTES).unwrap();
        assert_eq!(value.len(), 43);
        assert!(
            value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_unsupported_digest() {
        let result = OsCryptoProvider.digest(DigestAlgorithm::Sha512, b"abc");
        assert!(matches!(result, Err(RedirectError::PlatformUnsupported(_))));

        let result = PkceChallenge::generate(&UnavailableCrypto);
        assert!(matches!(result, Err(RedirectError::PlatformUnsupported(_))));
    }
}
