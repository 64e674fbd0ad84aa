use std::{path::PathBuf, time::Duration};

use log::debug;

use crate::error::AuthError;

pub const WEB_IDENTITY_TOKEN_FILE: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
pub const TOKEN_REQUEST_URL: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";
pub const TOKEN_REQUEST_TOKEN: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the federated identity token comes from.
#[derive(PartialEq, Eq)]
pub enum TokenSource {
    /// A token file maintained by the environment.
    File(PathBuf),
    /// A CI token endpoint that issues tokens on request.
    Endpoint { url: String, bearer: String },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::File(path) => f.debug_tuple("File").field(path).finish(),
            TokenSource::Endpoint { url, .. } => f
                .debug_struct("Endpoint")
                .field("url", url)
                .field("bearer", &"<redacted>")
                .finish(),
        }
    }
}

impl TokenSource {
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        if let Some(path) = lookup(WEB_IDENTITY_TOKEN_FILE) {
            return Ok(TokenSource::File(path.into()));
        }
        match (lookup(TOKEN_REQUEST_URL), lookup(TOKEN_REQUEST_TOKEN)) {
            (Some(url), Some(bearer)) => Ok(TokenSource::Endpoint { url, bearer }),
            _ => Err(AuthError::NoIdentityToken),
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    value: String,
}

/// Requests an identity token for `audience` from a CI token endpoint.
pub fn request_token(
    client: &reqwest::blocking::Client,
    url: &str,
    bearer: &str,
    audience: &str,
) -> Result<String, AuthError> {
    let mut url = reqwest::Url::parse(url).map_err(|error| AuthError::Malformed {
        what: "the token endpoint variable",
        reason: error.to_string(),
    })?;
    url.query_pairs_mut().append_pair("audience", audience);
    debug!(
        "requesting identity token from {host:?} for audience {audience:?}",
        host = url.host_str()
    );

    let response = client
        .get(url)
        .bearer_auth(bearer)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(AuthError::IdentityToken)?;
    let TokenResponse { value } = response.json().map_err(AuthError::IdentityToken)?;
    if value.is_empty() {
        return Err(AuthError::Malformed {
            what: "the token endpoint",
            reason: "empty token".to_owned(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn token_file_takes_precedence() {
        let source = TokenSource::from_lookup(lookup(&[
            (WEB_IDENTITY_TOKEN_FILE, "/var/run/token"),
            (TOKEN_REQUEST_URL, "https://token.example/?x=1"),
            (TOKEN_REQUEST_TOKEN, "bearer"),
        ]))
        .unwrap();
        assert_eq!(source, TokenSource::File("/var/run/token".into()));
    }

    #[test]
    fn endpoint_requires_url_and_bearer() {
        let source = TokenSource::from_lookup(lookup(&[
            (TOKEN_REQUEST_URL, "https://token.example/?x=1"),
            (TOKEN_REQUEST_TOKEN, "bearer"),
        ]))
        .unwrap();
        assert_eq!(
            source,
            TokenSource::Endpoint {
                url: "https://token.example/?x=1".to_owned(),
                bearer: "bearer".to_owned()
            }
        );

        assert!(matches!(
            TokenSource::from_lookup(lookup(&[(TOKEN_REQUEST_URL, "https://token.example")])),
            Err(AuthError::NoIdentityToken)
        ));
        assert!(matches!(
            TokenSource::from_lookup(lookup(&[])),
            Err(AuthError::NoIdentityToken)
        ));
    }

    #[test]
    fn malformed_endpoint_url_is_an_auth_error() {
        let client = reqwest::blocking::Client::new();
        assert!(matches!(
            request_token(&client, "not a url", "bearer", STS_AUDIENCE),
            Err(AuthError::Malformed { .. })
        ));
    }
}
