//! OAuth2/OIDC authorization code flow with PKCE for redirect-based clients.
//!
//! A login is split in two independent calls connected only through storage:
//! [`RedirectClient::begin_login`] builds the authorize URL and stores a pending
//! [`Transaction`] under a random state, and [`RedirectClient::handle_redirect_callback`]
//! parses the URL the authorization server redirected back to, claims the matching
//! transaction (each state is usable once), exchanges the code for tokens and writes them
//! to the [`TokenCache`].
//!
//! Randomness, HTTP, ID token verification and storage are injected through the
//! [`CryptoProvider`], [`Transport`], [`IdTokenVerifier`] and [`KeyValueStore`] traits.

mod authorize;
mod cache;
mod callback;
mod client;
mod config;
mod crypto;
mod error;
mod flow;
mod jwt;
mod scope;
mod storage;
mod transaction;
mod transport;
mod types;


pub use authorize::AuthorizeRequestBuilder;
pub use cache::{CacheEntry, CacheKey, TokenCache};
pub use callback::{
    CallbackOptions, CurrentLocation, ResponseLocation, SharedLocation, parse_callback,
};
pub use client::{CLIENT_INFO_HEADER, RedirectClient};
pub use config::{
    ClientOptions, DEFAULT_AUDIENCE, DEFAULT_SCOPE, MAX_DEFAULT_EXPIRES_IN_SECONDS,
    MAX_LEEWAY_SECONDS, MAX_TRANSACTION_TTL_SECONDS, TokenRequestEncoding,
};
pub use crypto::{CryptoProvider, DigestAlgorithm, OsCryptoProvider, PkceChallenge};
pub use error::{ErrorKind, RedirectError, RedirectResult, StorageError, TransportError};
pub use flow::{CallbackFlow, CallbackPhase};
pub use jwt::{Audience, ExpectedClaims, IdTokenClaims, IdTokenVerifier, JwtIdTokenVerifier};
pub use scope::ScopeSet;
pub use storage::{InMemoryStore, KeyValueStore, StorageResult};
pub use transaction::{Transaction, TransactionManager};
pub use transport::{ReqwestTransport, Transport, TransportResponse};
pub use types::{
    AuthorizationResponse, AuthorizeRequest, LoginOptions, RedirectLoginResult, TokenRequest,
    TokenResponse, TokenSet,
};

// Re-export for callers building their own verifiers
pub use jsonwebtoken::{Algorithm, DecodingKey};
