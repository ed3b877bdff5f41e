//! Redirect callback URL parsing.

use crate::error::{RedirectError, RedirectResult};
use crate::types::AuthorizationResponse;
use std::sync::{Arc, RwLock};

/// The host's current location, read when a callback is handled without an explicit URL.
pub trait CurrentLocation: Send + Sync {
    fn href(&self) -> String;
}

/// A location the host updates as it navigates.
#[derive(Debug, Clone, Default)]
pub struct SharedLocation {
    href: Arc<RwLock<String>>,
}

impl SharedLocation {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Arc::new(RwLock::new(href.into())),
        }
    }

    pub fn set(&self, href: impl Into<String>) {
        let mut current = self.href.write().unwrap_or_else(|e| e.into_inner());
        *current = href.into();
    }
}

impl CurrentLocation for SharedLocation {
    fn href(&self) -> String {
        self.href.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Options for handling a redirect callback
#[derive(Debug, Clone, Default)]
pub struct CallbackOptions {
    /// URL to parse instead of the current location
    pub url: Option<String>,
    pub location: ResponseLocation,
}

impl CallbackOptions {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            location: ResponseLocation::Query,
        }
    }

    pub fn use_fragment(mut self) -> Self {
        self.location = ResponseLocation::Fragment;
        self
    }
}

/// Where the authorization server put the response parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseLocation {
    /// The query string, falling back to a `?` inside the fragment for hash-routed apps
    #[default]
    Query,
    /// The fragment only
    Fragment,
}

/// Extract `code`, `state`, `error` and `error_description` from a redirect URL.
///
/// The URL may be absolute or relative. Repeated parameters keep their first value and
/// empty values count as absent. Fails with [`RedirectError::MissingParams`] when none of
/// `code`, `error` or `state` is present.
pub fn parse_callback(url: &str, location: ResponseLocation) -> RedirectResult<AuthorizationResponse> {
    let params = parameter_string(url, location).ok_or(RedirectError::MissingParams)?;

    let mut response = AuthorizationResponse::default();
    for (key, value) in url::form_urlencoded::parse(params.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        let slot = match key.as_ref() {
            "code" => &mut response.code,
            "state" => &mut response.state,
            "error" => &mut response.error,
            "error_description" => &mut response.error_description,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    if response.code.is_none() && response.error.is_none() && response.state.is_none() {
        return Err(RedirectError::MissingParams);
    }

    Ok(response)
}

fn parameter_string(url: &str, location: ResponseLocation) -> Option<&str> {
    let (before_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let query = before_fragment
        .split_once('?')
        .map(|(_, query)| query)
        .filter(|query| !query.is_empty());

    let params = match location {
        ResponseLocation::Query => {
            query.or_else(|| fragment.and_then(|f| f.split_once('?')).map(|(_, q)| q))
        }
        ResponseLocation::Fragment => {
            fragment.map(|f| f.split_once('?').map(|(_, q)| q).unwrap_or(f))
        }
    };
    params.filter(|params| !params.is_empty())
}
