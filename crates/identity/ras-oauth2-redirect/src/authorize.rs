//! Authorization request construction.

use crate::config::ClientOptions;
use crate::crypto::{CryptoProvider, PkceChallenge, STATE_BYTES, random_url_safe_string};
use crate::error::RedirectResult;
use crate::scope::{OFFLINE_ACCESS_SCOPE, OPENID_SCOPE, ScopeSet};
use crate::transaction::Transaction;
use crate::types::{AuthorizeRequest, LoginOptions};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// Parameters owned by the protocol; extra parameters may not replace them.
const PROTOCOL_PARAMS: &[&str] = &[
    "client_id",
    "redirect_uri",
    "scope",
    "audience",
    "response_type",
    "response_mode",
    "state",
    "nonce",
    "code_challenge",
    "code_challenge_method",
];

/// Builds authorize URLs together with the transaction that has to be stored for them.
pub struct AuthorizeRequestBuilder<'a> {
    options: &'a ClientOptions,
    crypto: &'a dyn CryptoProvider,
}

impl<'a> AuthorizeRequestBuilder<'a> {
    pub fn new(options: &'a ClientOptions, crypto: &'a dyn CryptoProvider) -> Self {
        Self { options, crypto }
    }

    /// Full scope for a login: `openid`, the default and client scopes, the login's scope
    /// and `offline_access` when refresh tokens are enabled.
    pub fn scope_for(&self, login_scope: Option<&str>) -> ScopeSet {
        let mut scopes = ScopeSet::from_parts([
            OPENID_SCOPE,
            self.options.default_scope.as_str(),
            self.options.scope.as_deref().unwrap_or_default(),
            login_scope.unwrap_or_default(),
        ]);
        if self.options.use_refresh_tokens {
            scopes.insert(OFFLINE_ACCESS_SCOPE);
        }
        scopes
    }

    pub fn build(&self, login: LoginOptions) -> RedirectResult<AuthorizeRequest> {
        // Randomness first: nothing is produced when the platform cannot supply it
        let state = random_url_safe_string(self.crypto, STATE_BYTES)?;
        let nonce = if self.options.use_nonce {
            Some(random_url_safe_string(self.crypto, STATE_BYTES)?)
        } else {
            None
        };
        let pkce = PkceChallenge::generate(self.crypto)?;

        let scope = self.scope_for(login.scope.as_deref()).to_string();
        let redirect_uri = login
            .redirect_uri
            .or_else(|| self.options.redirect_uri.clone());
        let audience = login.audience.or_else(|| self.options.audience.clone());
        let response_mode = login
            .response_mode
            .or_else(|| self.options.response_mode.clone());

        let mut url = Url::parse(&self.options.authorization_endpoint)?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("client_id", &self.options.client_id);
            if let Some(redirect_uri) = &redirect_uri {
                params.append_pair("redirect_uri", redirect_uri);
            }
            params.append_pair("scope", &scope);
            if let Some(audience) = &audience {
                params.append_pair("audience", audience);
            }
            params.append_pair("response_type", "code");
            if let Some(response_mode) = &response_mode {
                params.append_pair("response_mode", response_mode);
            }
            params.append_pair("state", &state);
            if let Some(nonce) = &nonce {
                params.append_pair("nonce", nonce);
            }
            params.append_pair("code_challenge", &pkce.code_challenge);
            params.append_pair("code_challenge_method", pkce.code_challenge_method);

            for (key, value) in self.extra_params(login.extra_params) {
                params.append_pair(&key, &value);
            }
        }

        let (created_at, expires_at) =
            Transaction::expiry_from_now(self.options.transaction_ttl_seconds)?;
        let transaction = Transaction {
            state,
            nonce,
            code_verifier: pkce.code_verifier,
            app_state: login.app_state,
            scope,
            audience,
            redirect_uri,
            created_at,
            expires_at,
        };

        debug!(
            "Built authorization URL for client {}",
            self.options.client_id
        );

        Ok(AuthorizeRequest { url, transaction })
    }

    fn extra_params(&self, login_params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = self.options.authorize_params.clone();
        merged.extend(login_params);
        merged.retain(|key, _| {
            let reserved = PROTOCOL_PARAMS.contains(&key.as_str());
            if reserved {
                warn!("Ignoring extra authorize parameter '{}'", key);
            }
            !reserved
        });
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::OsCryptoProvider;
    use crate::crypto::tests::UnavailableCrypto;
    use crate::error::RedirectError;
    use std::collections::HashMap;

    fn options() -> ClientOptions {
        ClientOptions::for_domain("auth.example.com", "test_client_id")
            .with_redirect_uri("http://localhost:3000/callback")
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_generation() {
        let options = options().with_audience("https://api.example.com");
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let request = builder
            .build(LoginOptions::new().with_app_state(serde_json::json!({ "key": "property" })))
            .unwrap();

        assert_eq!(request.url.host_str(), Some("auth.example.com"));
        assert_eq!(request.url.path(), "/authorize");

        let pairs = query(&request.url);
        let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "client_id",
                "redirect_uri",
                "scope",
                "audience",
                "response_type",
                "state",
                "nonce",
                "code_challenge",
                "code_challenge_method",
            ]
        );

        let params: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(params["client_id"], "test_client_id");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/callback");
        assert_eq!(params["scope"], "openid profile email");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], request.transaction.state);
        assert_eq!(Some(&params["nonce"]), request.transaction.nonce.as_ref());
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(
            params["code_challenge"],
            PkceChallenge::challenge_for(&OsCryptoProvider, &request.transaction.code_verifier)
                .unwrap()
        );

        let tx = &request.transaction;
        assert_eq!(tx.app_state, Some(serde_json::json!({ "key": "property" })));
        assert_eq!(tx.audience.as_deref(), Some("https://api.example.com"));
        assert_eq!(tx.scope, "openid profile email");
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let options = ClientOptions::for_domain("auth.example.com", "c").with_nonce(false);
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let request = builder.build(LoginOptions::new()).unwrap();
        let params: HashMap<_, _> = query(&request.url).into_iter().collect();

        for absent in ["redirect_uri", "audience", "nonce", "response_mode"] {
            assert!(!params.contains_key(absent), "{absent} should be omitted");
        }
        assert_eq!(request.transaction.redirect_uri, None);
        assert_eq!(request.transaction.nonce, None);
    }

    #[test]
    fn test_scope_merging() {
        let mut options = options().with_scope("read:users").with_refresh_tokens(true);
        options.default_scope = "profile".to_string();
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let scope = builder.scope_for(Some("email read:users"));
        assert_eq!(scope.to_string(), "openid profile read:users email offline_access");
    }

    #[test]
    fn test_extra_params_cannot_override_protocol() {
        let options = options().with_authorize_param("prompt", "consent");
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let request = builder
            .build(
                LoginOptions::new()
                    .with_param("prompt", "login")
                    .with_param("state", "attacker")
                    .with_param("ui_locales", "de"),
            )
            .unwrap();

        let pairs = query(&request.url);
        let states: Vec<_> = pairs.iter().filter(|(k, _)| k == "state").collect();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].1, request.transaction.state);

        let params: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(params["prompt"], "login");
        assert_eq!(params["ui_locales"], "de");
    }

    #[test]
    fn test_login_overrides_and_response_mode() {
        let options = options();
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let mut login = LoginOptions::new().with_redirect_uri("http://localhost:4000/cb");
        login.response_mode = Some("fragment".to_string());
        let request = builder.build(login).unwrap();

        let params: HashMap<_, _> = query(&request.url).into_iter().collect();
        assert_eq!(params["redirect_uri"], "http://localhost:4000/cb");
        assert_eq!(params["response_mode"], "fragment");
        assert_eq!(
            request.transaction.redirect_uri.as_deref(),
            Some("http://localhost:4000/cb")
        );
    }

    #[test]
    fn test_unique_states() {
        let options = options();
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let states: std::collections::HashSet<String> = (0..100)
            .map(|_| builder.build(LoginOptions::new()).unwrap().transaction.state)
            .collect();
        assert_eq!(states.len(), 100);
    }

    #[test]
    fn test_platform_unsupported() {
        let options = options();
        let builder = AuthorizeRequestBuilder::new(&options, &UnavailableCrypto);

        let result = builder.build(LoginOptions::new());
        assert!(matches!(result, Err(RedirectError::PlatformUnsupported(_))));
    }

    #[test]
    fn test_unrepresentable_transaction_ttl() {
        let options = options().with_transaction_ttl(u64::MAX);
        let builder = AuthorizeRequestBuilder::new(&options, &OsCryptoProvider);

        let result = builder.build(LoginOptions::new());
        assert!(matches!(result, Err(RedirectError::Config(_))));
    }
}
