//! OAuth2 protocol types.

use crate::error::TransportError;
use crate::jwt::IdTokenClaims;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// `seconds` as a chrono duration, `None` when it does not fit
pub(crate) fn checked_seconds(seconds: u64) -> Option<Duration> {
    i64::try_from(seconds).ok().and_then(Duration::try_seconds)
}

/// Per-login options for [`crate::RedirectClient::begin_login`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginOptions {
    /// Scopes merged on top of the client's default scopes
    pub scope: Option<String>,
    pub audience: Option<String>,
    /// Returned verbatim once the callback completes
    pub app_state: Option<serde_json::Value>,
    /// Overrides the client's redirect URI for this login
    pub redirect_uri: Option<String>,
    pub response_mode: Option<String>,
    /// Additional parameters to include in the authorization request
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

impl LoginOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_state(mut self, app_state: serde_json::Value) -> Self {
        self.app_state = Some(app_state);
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }
}

/// Response from OAuth2 authorization callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Body of the `authorization_code` token request
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub grant_type: &'static str,
    pub client_id: String,
    pub code_verifier: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl TokenRequest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_form(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", self.grant_type)
            .append_pair("client_id", &self.client_id)
            .append_pair("code_verifier", &self.code_verifier)
            .append_pair("code", &self.code);
        if let Some(redirect_uri) = &self.redirect_uri {
            form.append_pair("redirect_uri", redirect_uri);
        }
        form.finish()
    }
}

/// OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
}

/// Tokens issued by a successful code exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
    /// Scope reported by the token endpoint, absent when it reported none
    #[serde(
        rename = "oauth_token_scope",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub granted_scope: Option<String>,
}

impl TokenSet {
    /// Fails when `expires_in` does not describe a representable instant
    pub fn from_response(
        response: TokenResponse,
        keep_refresh_token: bool,
        default_expires_in: u64,
    ) -> Result<Self, TransportError> {
        let expires_in = response.expires_in.unwrap_or(default_expires_in);
        let expires_at = checked_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                TransportError::InvalidResponse(format!("expires_in out of range: {expires_in}"))
            })?;

        Ok(Self {
            id_token: response.id_token,
            access_token: response.access_token,
            refresh_token: response.refresh_token.filter(|_| keep_refresh_token),
            token_type: response.token_type,
            expires_in,
            expires_at,
            granted_scope: response.scope,
        })
    }
}

/// Authorize URL plus the transaction that must be persisted before navigating to it
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub url: Url,
    pub transaction: crate::transaction::Transaction,
}

impl AuthorizeRequest {
    pub fn state(&self) -> &str {
        &self.transaction.state
    }
}

/// Result of a completed redirect callback
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectLoginResult {
    pub app_state: Option<serde_json::Value>,
    pub claims: Option<IdTokenClaims>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_request(redirect_uri: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: GRANT_TYPE_AUTHORIZATION_CODE,
            client_id: "client".to_string(),
            code_verifier: "verifier".to_string(),
            code: "my code".to_string(),
            redirect_uri: redirect_uri.map(String::from),
        }
    }

    #[test]
    fn test_token_request_omits_missing_redirect_uri() {
        let json: serde_json::Value =
            serde_json::from_str(&token_request(None).to_json().unwrap()).unwrap();
        assert!(json.get("redirect_uri").is_none());
        assert_eq!(json["grant_type"], "authorization_code");

        let form = token_request(None).to_form();
        assert!(!form.contains("redirect_uri"));
        assert_eq!(
            form,
            "grant_type=authorization_code&client_id=client&code_verifier=verifier&code=my+code"
        );
    }

    #[test]
    fn test_token_request_with_redirect_uri() {
        let form = token_request(Some("http://localhost/cb")).to_form();
        assert!(form.ends_with("&redirect_uri=http%3A%2F%2Flocalhost%2Fcb"));

        let json: serde_json::Value = serde_json::from_str(
            &token_request(Some("http://localhost/cb")).to_json().unwrap(),
        )
        .unwrap();
        assert_eq!(json["redirect_uri"], "http://localhost/cb");
    }

    #[test]
    fn test_token_set_scope_and_refresh_token() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 60
        }))
        .unwrap();

        let tokens = TokenSet::from_response(response.clone(), false, 3600).unwrap();
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_in, 60);

        let json = serde_json::to_value(&tokens).unwrap();
        assert!(json.get("oauth_token_scope").is_none());

        let mut scoped = response;
        scoped.scope = Some("openid profile".to_string());
        scoped.expires_in = None;
        let tokens = TokenSet::from_response(scoped, true, 3600).unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_in, 3600);
        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json["oauth_token_scope"], "openid profile");
    }

    #[test]
    fn test_out_of_range_expires_in_is_an_error() {
        for expires_in in [100_000_000_000_000u64, i64::MAX as u64, u64::MAX] {
            let response: TokenResponse = serde_json::from_value(serde_json::json!({
                "access_token": "at",
                "expires_in": expires_in
            }))
            .unwrap();

            let result = TokenSet::from_response(response, false, 3600);
            assert!(
                matches!(result, Err(TransportError::InvalidResponse(_))),
                "expires_in {expires_in} should be rejected"
            );
        }

        let response: TokenResponse =
            serde_json::from_value(serde_json::json!({ "access_token": "at" })).unwrap();
        assert!(TokenSet::from_response(response, false, u64::MAX).is_err());
    }
}
