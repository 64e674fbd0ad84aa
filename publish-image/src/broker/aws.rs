use std::path::Path;

use base64::Engine;
use log::{debug, info};
use time::OffsetDateTime;

use super::{
    oidc::{self, TokenSource},
    CredentialBroker, CredentialLease, Identity,
};
use crate::{error::AuthError, process, temp_path::TempDir};

pub const DEFAULT_SESSION_NAME: &str = "publish-image";
pub const DEFAULT_SESSION_DURATION_SECS: u32 = 3600;

/// Partial implementation of the JSON emitted by `aws sts assume-role-with-web-identity`.
/// See https://docs.aws.amazon.com/STS/latest/APIReference/API_AssumeRoleWithWebIdentity.html.
#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleOutput {
    credentials: SessionCredentials,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    #[serde(with = "time::serde::rfc3339")]
    expiration: OffsetDateTime,
}

/// Partial implementation of the JSON emitted by `aws ecr get-authorization-token`.
/// See https://docs.aws.amazon.com/AmazonECR/latest/APIReference/API_GetAuthorizationToken.html.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationTokenOutput {
    authorization_data: Vec<AuthorizationData>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationData {
    authorization_token: String,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    proxy_endpoint: String,
}

/// Obtains registry credentials by assuming an IAM role with a federated web identity token and
/// exchanging the role session for an ECR authorization token. Drives the `aws` command line.
pub struct AwsCredentialBroker {
    pub session_name: String,
    pub session_duration_secs: u32,
    pub client: reqwest::blocking::Client,
}

impl Default for AwsCredentialBroker {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_owned(),
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl CredentialBroker for AwsCredentialBroker {
    fn acquire(&self, identity: &Identity) -> Result<CredentialLease, AuthError> {
        // Holds the identity token when we have to fetch it ourselves. Removed when dropped.
        let scratch = TempDir::new("publish-image-oidc-")?;

        let token_file = match TokenSource::from_env()? {
            TokenSource::File(path) => path,
            TokenSource::Endpoint { url, bearer } => {
                let token = oidc::request_token(&self.client, &url, &bearer, oidc::STS_AUDIENCE)?;
                let path = scratch.join("token");
                std::fs::write(&path, token)?;
                path
            }
        };

        let session = self.assume_role(identity, &token_file)?;
        info!(
            "assumed role {role:?}, session expires at {expiry}",
            role = identity.role,
            expiry = session.expiration
        );

        let data = authorization_token(&identity.region, &session)?;
        let lease = lease_from_authorization(data, session.expiration)?;
        debug!("obtained credential lease {lease:?}");
        Ok(lease)
    }
}

impl AwsCredentialBroker {
    fn assume_role(
        &self,
        identity: &Identity,
        token_file: &Path,
    ) -> Result<SessionCredentials, AuthError> {
        // The token is passed by file so that it never shows up in the command line.
        let mut token_arg = std::ffi::OsString::from("file://");
        token_arg.push(token_file);

        let output = process::command!(
            "aws",
            "sts",
            "assume-role-with-web-identity",
            "--role-arn",
            identity.role,
            "--role-session-name",
            self.session_name,
            "--web-identity-token",
            token_arg,
            "--duration-seconds",
            self.session_duration_secs.to_string(),
            "--region",
            identity.region,
            "--output",
            "json",
        )
        .output()
        .map_err(|source| AuthError::AssumeRole {
            role: identity.role.clone(),
            source,
        })?;

        let AssumeRoleOutput { credentials } =
            serde_json::from_slice(&output.stdout).map_err(|error| AuthError::Malformed {
                what: "sts assume-role-with-web-identity",
                reason: error.to_string(),
            })?;
        Ok(credentials)
    }
}

fn authorization_token(
    region: &str,
    session: &SessionCredentials,
) -> Result<AuthorizationData, AuthError> {
    let output = process::command!(
        "aws",
        "ecr",
        "get-authorization-token",
        "--region",
        region,
        "--output",
        "json",
    )
    .env("AWS_ACCESS_KEY_ID", &session.access_key_id)
    .env("AWS_SECRET_ACCESS_KEY", &session.secret_access_key)
    .env("AWS_SESSION_TOKEN", &session.session_token)
    .output()
    .map_err(AuthError::RegistryToken)?;

    parse_authorization_token(&output.stdout)
}

fn parse_authorization_token(stdout: &[u8]) -> Result<AuthorizationData, AuthError> {
    let AuthorizationTokenOutput { authorization_data } =
        serde_json::from_slice(stdout).map_err(|error| AuthError::Malformed {
            what: "ecr get-authorization-token",
            reason: error.to_string(),
        })?;
    authorization_data
        .into_iter()
        .next()
        .ok_or_else(|| AuthError::Malformed {
            what: "ecr get-authorization-token",
            reason: "no authorization data".to_owned(),
        })
}

/// Builds the lease. It expires with whichever of the role session and the registry token expires
/// first.
fn lease_from_authorization(
    data: AuthorizationData,
    session_expiry: OffsetDateTime,
) -> Result<CredentialLease, AuthError> {
    let malformed = |reason: &str| AuthError::Malformed {
        what: "ecr get-authorization-token",
        reason: reason.to_owned(),
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(data.authorization_token.trim())
        .map_err(|_| malformed("authorization token is not base64"))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| malformed("authorization token is not UTF-8"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| malformed("authorization token is not `user:password`"))?;

    let scope = data
        .proxy_endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');

    Ok(CredentialLease::new(
        username,
        password,
        data.expires_at.min(session_expiry),
        scope,
    ))
}
