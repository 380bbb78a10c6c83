//! Authentication for Google APIs.
//!
//! Credentials are acquired by trying an ordered list of [`AuthStrategy`]
//! values; the first one that yields a usable [`Authenticator`] wins.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DriveSettings;
use crate::error::{DriveError, Result};
use crate::models::{AuthorizedUserToken, ServiceAccountKey, TokenResponse};

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration. `None` means the issuer gave no expiry.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<SystemTime>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > SystemTime::now() + EXPIRY_BUFFER,
            None => true,
        }
    }
}

enum Credential {
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
        token_uri: String,
    },
    AuthorizedUser {
        token_file: PathBuf,
        stored: AuthorizedUserToken,
        token_uri: String,
    },
}

/// Authenticator for Google APIs, holding one credential and its token cache.
#[derive(Clone)]
pub struct Authenticator {
    credential: Arc<Credential>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a service account JSON key file.
    ///
    /// The private key is parsed up front so a malformed key fails here rather
    /// than on the first request. No network call is made.
    pub async fn from_service_account_file(
        path: &Path,
        client: Client,
        default_token_uri: &str,
    ) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&content)?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token_uri = key
            .token_uri
            .clone()
            .unwrap_or_else(|| default_token_uri.to_string());

        Ok(Self::with_credential(
            Credential::ServiceAccount {
                key,
                signing_key,
                token_uri,
            },
            client,
            None,
        ))
    }

    /// Create an authenticator from a stored user OAuth token file.
    ///
    /// A still-valid token is used as-is. An expired token is refreshed
    /// immediately and written back to `path`.
    pub async fn from_token_file(
        path: &Path,
        client: Client,
        default_token_uri: &str,
    ) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let stored: AuthorizedUserToken = serde_json::from_str(&content)?;

        let current = stored.token.clone().map(|access_token| CachedToken {
            access_token,
            expires_at: stored.expiry.map(SystemTime::from),
        });
        let valid = current.as_ref().is_some_and(CachedToken::is_fresh);

        if !valid && stored.refresh_token.is_none() {
            return Err(DriveError::AuthenticationError(
                "OAuth token not found or invalid in server environment. \
                 Provide a Google service account key in the credentials file."
                    .to_string(),
            ));
        }

        let token_uri = stored
            .token_uri
            .clone()
            .unwrap_or_else(|| default_token_uri.to_string());

        let auth = Self::with_credential(
            Credential::AuthorizedUser {
                token_file: path.to_path_buf(),
                stored,
                token_uri,
            },
            client,
            current.filter(|_| valid),
        );

        if !valid {
            auth.get_access_token().await?;
        }

        Ok(auth)
    }

    fn with_credential(
        credential: Credential,
        client: Client,
        cached: Option<CachedToken>,
    ) -> Self {
        Self {
            credential: Arc::new(credential),
            client,
            cached_token: Arc::new(RwLock::new(cached)),
        }
    }

    /// Which kind of credential backs this authenticator.
    pub fn kind(&self) -> &'static str {
        match self.credential.as_ref() {
            Credential::ServiceAccount { .. } => "service_account",
            Credential::AuthorizedUser { .. } => "authorized_user",
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = match self.credential.as_ref() {
            Credential::ServiceAccount {
                key,
                signing_key,
                token_uri,
            } => self.mint_service_account_token(key, signing_key, token_uri).await?,
            Credential::AuthorizedUser {
                token_file,
                stored,
                token_uri,
            } => self.refresh_user_token(token_file, stored, token_uri).await?,
        };

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn mint_service_account_token(
        &self,
        key: &ServiceAccountKey,
        signing_key: &EncodingKey,
        token_uri: &str,
    ) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let claims = Claims {
            iss: key.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, signing_key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let token_response = self.request_token(token_uri, &params).await?;
        debug!(client_email = %key.client_email, "minted service account access token");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: Some(SystemTime::now() + Duration::from_secs(token_response.expires_in)),
        })
    }

    /// Use the stored refresh token, then persist the new access token.
    async fn refresh_user_token(
        &self,
        token_file: &Path,
        stored: &AuthorizedUserToken,
        token_uri: &str,
    ) -> Result<CachedToken> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            stored.refresh_token.as_deref(),
            stored.client_id.as_deref(),
            stored.client_secret.as_deref(),
        ) else {
            return Err(DriveError::TokenRefreshError(
                "stored token lacks refresh_token, client_id or client_secret".to_string(),
            ));
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let token_response = self.request_token(token_uri, &params).await?;
        let lifetime = Duration::from_secs(token_response.expires_in);

        let updated = AuthorizedUserToken {
            token: Some(token_response.access_token.clone()),
            expiry: chrono::Duration::from_std(lifetime)
                .ok()
                .map(|lifetime| Utc::now() + lifetime),
            ..stored.clone()
        };
        match serde_json::to_string_pretty(&updated) {
            Ok(body) => {
                if let Err(e) = tokio::fs::write(token_file, body).await {
                    warn!(path = %token_file.display(), error = %e, "failed to write refreshed token");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize refreshed token"),
        }
        info!(path = %token_file.display(), "refreshed stored user token");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: Some(SystemTime::now() + lifetime),
        })
    }

    async fn request_token(&self, token_uri: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(token_uri).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

/// One way of obtaining credentials.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// A service account JSON key file.
    ServiceAccountKey(PathBuf),
    /// A stored user OAuth token file, refreshed when expired.
    StoredUserToken(PathBuf),
}

impl AuthStrategy {
    /// The strategies tried for the given settings, in order.
    pub fn defaults(settings: &DriveSettings) -> Vec<AuthStrategy> {
        vec![
            AuthStrategy::ServiceAccountKey(settings.credentials_file.clone()),
            AuthStrategy::StoredUserToken(settings.token_file.clone()),
        ]
    }

    async fn authenticate(&self, client: &Client, default_token_uri: &str) -> Result<Authenticator> {
        match self {
            AuthStrategy::ServiceAccountKey(path) => {
                Authenticator::from_service_account_file(path, client.clone(), default_token_uri)
                    .await
            }
            AuthStrategy::StoredUserToken(path) => {
                Authenticator::from_token_file(path, client.clone(), default_token_uri).await
            }
        }
    }
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::ServiceAccountKey(path) => {
                write!(f, "service account key ({})", path.display())
            }
            AuthStrategy::StoredUserToken(path) => {
                write!(f, "stored user token ({})", path.display())
            }
        }
    }
}

/// Try each strategy in order and return the first authenticator obtained.
pub async fn authenticate(
    strategies: &[AuthStrategy],
    client: &Client,
    default_token_uri: &str,
) -> Result<Authenticator> {
    let mut failures = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        match strategy.authenticate(client, default_token_uri).await {
            Ok(auth) => {
                info!(
                    strategy = %strategy,
                    credential = auth.kind(),
                    "authenticated with Google Drive"
                );
                return Ok(auth);
            }
            Err(e) => {
                debug!(strategy = %strategy, error = %e, "authentication strategy failed");
                failures.push(format!("{}: {}", strategy, e));
            }
        }
    }

    if failures.is_empty() {
        return Err(DriveError::AuthenticationError(
            "no authentication strategies configured".to_string(),
        ));
    }
    Err(DriveError::AuthenticationError(failures.join("; ")))
}
