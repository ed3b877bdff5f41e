//! Redirect login client: starts logins and completes them from the callback URL.

use crate::authorize::AuthorizeRequestBuilder;
use crate::cache::{CacheEntry, CacheKey, TokenCache};
use crate::callback::{CallbackOptions, CurrentLocation, ResponseLocation, parse_callback};
use crate::config::{ClientOptions, TokenRequestEncoding};
use crate::crypto::{CryptoProvider, OsCryptoProvider};
use crate::error::{RedirectError, RedirectResult, TransportError};
use crate::flow::{CallbackFlow, CallbackPhase};
use crate::jwt::{ExpectedClaims, IdTokenClaims, IdTokenVerifier};
use crate::storage::{InMemoryStore, KeyValueStore};
use crate::transaction::{Transaction, TransactionManager};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    AuthorizeRequest, GRANT_TYPE_AUTHORIZATION_CODE, LoginOptions, RedirectLoginResult,
    TokenRequest, TokenResponse, TokenSet,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Header identifying this library to the token endpoint
pub const CLIENT_INFO_HEADER: &str = "Ras-Client";

/// OAuth2 client for the authorization code + PKCE redirect flow
#[derive(Clone)]
pub struct RedirectClient {
    options: ClientOptions,
    crypto: Arc<dyn CryptoProvider>,
    transport: Arc<dyn Transport>,
    id_token_verifier: Arc<dyn IdTokenVerifier>,
    transactions: TransactionManager,
    cache: TokenCache,
    location: Option<Arc<dyn CurrentLocation>>,
}

impl RedirectClient {
    /// Client with in-memory stores, the OS crypto provider and a `reqwest` transport
    pub fn new(
        options: ClientOptions,
        id_token_verifier: Arc<dyn IdTokenVerifier>,
    ) -> RedirectResult<Self> {
        options.validate()?;
        let transport = ReqwestTransport::new(options.http_timeout_seconds)?;
        let cache = TokenCache::new(Arc::new(InMemoryStore::new()), options.leeway_seconds);

        Ok(Self {
            crypto: Arc::new(OsCryptoProvider),
            transport: Arc::new(transport),
            id_token_verifier,
            transactions: TransactionManager::new(Arc::new(InMemoryStore::new())),
            cache,
            location: None,
            options,
        })
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_transaction_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.transactions = TransactionManager::new(store);
        self
    }

    pub fn with_cache_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.cache = TokenCache::new(store, self.options.leeway_seconds);
        self
    }

    pub fn with_location(mut self, location: Arc<dyn CurrentLocation>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Build the authorize URL and its transaction without storing anything
    pub fn build_authorize_url(&self, login: LoginOptions) -> RedirectResult<AuthorizeRequest> {
        AuthorizeRequestBuilder::new(&self.options, self.crypto.as_ref()).build(login)
    }

    /// Start a login: store the transaction and return the URL to navigate to
    pub async fn begin_login(&self, login: LoginOptions) -> RedirectResult<AuthorizeRequest> {
        let request = self.build_authorize_url(login)?;
        self.transactions.create(&request.transaction).await?;

        info!("Started login for client {}", self.options.client_id);
        Ok(request)
    }

    /// Complete a login from the current location
    pub async fn handle_redirect_callback(&self) -> RedirectResult<RedirectLoginResult> {
        self.handle_redirect_callback_with(CallbackOptions::default())
            .await
    }

    /// Complete a login from an explicit redirect URL
    pub async fn handle_redirect_callback_url(
        &self,
        url: &str,
    ) -> RedirectResult<RedirectLoginResult> {
        self.handle_redirect_callback_with(CallbackOptions::url(url))
            .await
    }

    pub async fn handle_redirect_callback_with(
        &self,
        options: CallbackOptions,
    ) -> RedirectResult<RedirectLoginResult> {
        let url = match options.url {
            Some(url) => url,
            None => self
                .location
                .as_ref()
                .map(|location| location.href())
                .ok_or_else(|| {
                    RedirectError::Config("no current location configured".to_string())
                })?,
        };

        let mut flow = CallbackFlow::new();
        match self.run_callback(&mut flow, &url, options.location).await {
            Ok(result) => {
                flow.advance(CallbackPhase::Completed);
                info!("Completed login for client {}", self.options.client_id);
                Ok(result)
            }
            Err(e) => {
                warn!("Redirect callback failed: {}", e);
                Err(flow.fail(e))
            }
        }
    }

    async fn run_callback(
        &self,
        flow: &mut CallbackFlow,
        url: &str,
        location: ResponseLocation,
    ) -> RedirectResult<RedirectLoginResult> {
        let response = parse_callback(url, location)?;

        let Some(state) = response.state else {
            return Err(RedirectError::InvalidState);
        };
        flow.advance(CallbackPhase::AwaitingTransaction {
            state: state.clone(),
        });

        let Some(transaction) = self.transactions.get(&state).await? else {
            debug!("No transaction for callback state");
            return Err(RedirectError::InvalidState);
        };

        // Removal is the claim on the transaction. It is never undone.
        if !self.transactions.remove(&state).await? {
            warn!("Transaction consumed by a concurrent callback");
            return Err(RedirectError::InvalidState);
        }
        if transaction.is_expired() {
            debug!("Callback transaction expired");
            return Err(RedirectError::InvalidState);
        }

        if let Some(error) = response.error {
            return Err(RedirectError::Authorization {
                error,
                error_description: response.error_description,
                state: transaction.state,
                app_state: transaction.app_state,
            });
        }

        let Some(code) = response.code else {
            return Err(RedirectError::MissingAuthorizationCode);
        };

        flow.advance(CallbackPhase::ExchangingCode { state });
        let token_response = self.exchange_code(&transaction, code).await?;
        let claims = self.verify_id_token(&transaction, token_response.id_token.as_deref())?;

        let entry = CacheEntry {
            client_id: self.options.client_id.clone(),
            audience: self
                .options
                .cache_audience(transaction.audience.as_deref())
                .to_string(),
            scope: transaction.scope.clone(),
            tokens: TokenSet::from_response(
                token_response,
                self.options.use_refresh_tokens,
                self.options.default_expires_in_seconds,
            )?,
            claims: claims.clone(),
        };
        self.cache.set(&entry).await?;

        Ok(RedirectLoginResult {
            app_state: transaction.app_state,
            claims,
        })
    }

    /// Exchange authorization code for tokens
    async fn exchange_code(
        &self,
        transaction: &Transaction,
        code: String,
    ) -> RedirectResult<TokenResponse> {
        let request = TokenRequest {
            grant_type: GRANT_TYPE_AUTHORIZATION_CODE,
            client_id: self.options.client_id.clone(),
            code_verifier: transaction.code_verifier.clone(),
            code,
            redirect_uri: transaction.redirect_uri.clone(),
        };

        let encoding = self.options.token_request_encoding;
        let body = match encoding {
            TokenRequestEncoding::Json => request.to_json()?,
            TokenRequestEncoding::Form => request.to_form(),
        };
        let headers = [
            ("Content-Type".to_string(), encoding.content_type().to_string()),
            (CLIENT_INFO_HEADER.to_string(), client_info()),
        ];

        let response = self
            .transport
            .post(&self.options.token_endpoint, body, &headers)
            .await
            .inspect_err(|e| error!("Token exchange failed: {}", e))?;

        if !response.is_success() {
            let json = &response.json;
            let error = json
                .get("error")
                .and_then(|v| v.as_str())
                .or_else(|| json.as_str())
                .unwrap_or("request_failed")
                .to_string();
            let error_description = json
                .get("error_description")
                .and_then(|v| v.as_str())
                .map(String::from);

            error!("Token exchange failed with status {}: {}", response.status, error);
            return Err(TransportError::Status {
                status: response.status,
                error,
                error_description,
            }
            .into());
        }

        let token_response: TokenResponse = serde_json::from_value(response.json)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        info!("Successfully exchanged code for tokens");
        Ok(token_response)
    }

    fn verify_id_token(
        &self,
        transaction: &Transaction,
        id_token: Option<&str>,
    ) -> RedirectResult<Option<IdTokenClaims>> {
        match id_token {
            Some(id_token) => {
                let expected = ExpectedClaims {
                    issuer: self.options.issuer.clone(),
                    audience: self.options.client_id.clone(),
                    nonce: transaction.nonce.clone(),
                    leeway: self.options.leeway_seconds,
                };
                Ok(Some(self.id_token_verifier.verify(id_token, &expected)?))
            }
            None if transaction.nonce.is_some() => Err(RedirectError::IdToken(
                "token response has no id_token".to_string(),
            )),
            None => Ok(None),
        }
    }

    /// Cached, unexpired tokens for an audience and scope.
    ///
    /// The scope is merged with the client's default scopes the same way a login does.
    pub async fn get_cached_tokens(
        &self,
        audience: Option<&str>,
        scope: Option<&str>,
    ) -> RedirectResult<Option<CacheEntry>> {
        let scope = AuthorizeRequestBuilder::new(&self.options, self.crypto.as_ref())
            .scope_for(scope)
            .to_string();
        let key = CacheKey::new(
            &self.options.client_id,
            self.options.cache_audience(audience),
            scope,
        );
        self.cache.get(&key).await
    }

    pub async fn get_id_token_claims(
        &self,
        audience: Option<&str>,
        scope: Option<&str>,
    ) -> RedirectResult<Option<IdTokenClaims>> {
        Ok(self
            .get_cached_tokens(audience, scope)
            .await?
            .and_then(|entry| entry.claims))
    }

    pub async fn clear_cache(&self) -> RedirectResult<usize> {
        self.cache.clear().await
    }

    pub async fn cleanup_expired_transactions(&self) -> RedirectResult<usize> {
        self.transactions.cleanup_expired().await
    }
}

fn client_info() -> String {
    let info = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    });
    STANDARD.encode(info.to_string())
}
