//! Client configuration.

use crate::error::{RedirectError, RedirectResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const DEFAULT_SCOPE: &str = "openid profile email";
pub const DEFAULT_AUDIENCE: &str = "default";

pub const MAX_TRANSACTION_TTL_SECONDS: u64 = 24 * 60 * 60;
pub const MAX_LEEWAY_SECONDS: u64 = 60 * 60;
pub const MAX_DEFAULT_EXPIRES_IN_SECONDS: u64 = 365 * 24 * 60 * 60;

/// How the token request body is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRequestEncoding {
    #[default]
    Json,
    Form,
}

impl TokenRequestEncoding {
    pub fn content_type(self) -> &'static str {
        match self {
            TokenRequestEncoding::Json => "application/json",
            TokenRequestEncoding::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// OAuth2 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub client_id: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Expected `iss` claim of ID tokens
    pub issuer: String,
    pub redirect_uri: Option<String>,
    /// Scopes requested on every login in addition to `openid`
    pub default_scope: String,
    pub scope: Option<String>,
    pub audience: Option<String>,
    /// Additional parameters to include in every authorization request
    pub authorize_params: BTreeMap<String, String>,
    pub response_mode: Option<String>,
    pub token_request_encoding: TokenRequestEncoding,
    /// Request `offline_access` and keep refresh tokens in the cache
    pub use_refresh_tokens: bool,
    /// Send a nonce and require it back in the ID token
    pub use_nonce: bool,
    /// Clock skew tolerance for ID tokens and cache expiry, in seconds
    pub leeway_seconds: u64,
    pub transaction_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
    /// Lifetime assumed when the token endpoint omits `expires_in`
    pub default_expires_in_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authorization_endpoint: String::new(),
            token_endpoint: String::new(),
            issuer: String::new(),
            redirect_uri: None,
            default_scope: DEFAULT_SCOPE.to_string(),
            scope: None,
            audience: None,
            authorize_params: BTreeMap::new(),
            response_mode: None,
            token_request_encoding: TokenRequestEncoding::Json,
            use_refresh_tokens: false,
            use_nonce: true,
            leeway_seconds: 60,
            transaction_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 30,
            default_expires_in_seconds: 3600,
        }
    }
}

impl ClientOptions {
    pub fn new(
        client_id: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    /// Endpoints of a tenant domain: `/authorize`, `/oauth/token` and issuer `https://{domain}/`
    pub fn for_domain(domain: &str, client_id: impl Into<String>) -> Self {
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", domain.trim_end_matches('/'))
        };

        Self::new(
            client_id,
            format!("{base}/authorize"),
            format!("{base}/oauth/token"),
            format!("{base}/"),
        )
    }

    /// Parse options from TOML
    pub fn from_toml_str(source: &str) -> RedirectResult<Self> {
        let options: Self = toml::from_str(source)
            .map_err(|e| RedirectError::Config(format!("invalid TOML: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> RedirectResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(RedirectError::Config("client_id is required".to_string()));
        }

        for (name, endpoint) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            Url::parse(endpoint)
                .map_err(|e| RedirectError::Config(format!("{name} is not a valid URL: {e}")))?;
        }

        for (name, value, max) in [
            (
                "transaction_ttl_seconds",
                self.transaction_ttl_seconds,
                MAX_TRANSACTION_TTL_SECONDS,
            ),
            ("leeway_seconds", self.leeway_seconds, MAX_LEEWAY_SECONDS),
            (
                "default_expires_in_seconds",
                self.default_expires_in_seconds,
                MAX_DEFAULT_EXPIRES_IN_SECONDS,
            ),
        ] {
            if value > max {
                return Err(RedirectError::Config(format!(
                    "{name} must be at most {max}, got {value}"
                )));
            }
        }

        if let Some(redirect_uri) = &self.redirect_uri {
            Url::parse(redirect_uri)
                .map_err(|e| RedirectError::Config(format!("redirect_uri is not a valid URL: {e}")))?;
        }

        Ok(())
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.authorize_params.insert(key.into(), value.into());
        self
    }

    pub fn with_form_data(mut self, use_form_data: bool) -> Self {
        self.token_request_encoding = if use_form_data {
            TokenRequestEncoding::Form
        } else {
            TokenRequestEncoding::Json
        };
        self
    }

    pub fn with_refresh_tokens(mut self, enabled: bool) -> Self {
        self.use_refresh_tokens = enabled;
        self
    }

    pub fn with_nonce(mut self, enabled: bool) -> Self {
        self.use_nonce = enabled;
        self
    }

    pub fn with_transaction_ttl(mut self, seconds: u64) -> Self {
        self.transaction_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    /// Audience used in cache keys
    pub fn cache_audience<'a>(&'a self, audience: Option<&'a str>) -> &'a str {
        audience
            .or(self.audience.as_deref())
            .unwrap_or(DEFAULT_AUDIENCE)
    }
}
