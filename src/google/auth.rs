// OAuth 2.0 for installed apps: loopback consent, cached tokens, refresh

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::errors::{check_status, ApiError};

/// Full Drive access (folder lookup, listing, upload) and read-only YouTube
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/youtube.readonly",
];

const CALLBACK_TIMEOUT_SECS: u64 = 300;
/// Tokens this close to expiry are refreshed up front
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client from a Google `client_secrets.json`
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        let file: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|e| ApiError::Auth(format!("invalid client secrets: {}", e)))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| ApiError::Auth("client secrets have neither 'installed' nor 'web' section".to_string()))
    }

    pub async fn from_file(path: &Path) -> Result<Self, ApiError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ApiError::Auth(format!("cannot read client secrets {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}

/// Source of bearer tokens for API clients
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// Fixed token, for tests and externally managed credentials
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}

/// Token cache file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// RFC 3339
    pub expires_at: String,
}

impl CachedToken {
    fn from_response(resp: TokenResponse, previous_refresh: Option<String>) -> Result<Self, ApiError> {
        let expires_at = OffsetDateTime::now_utc() + time::Duration::seconds(resp.expires_in.unwrap_or(3600));
        Ok(Self {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.or(previous_refresh),
            expires_at: expires_at
                .format(&Rfc3339)
                .map_err(|e| ApiError::Decode(format!("cannot format expiry: {}", e)))?,
        })
    }

    /// Unparseable expiry counts as expired
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        OffsetDateTime::parse(&self.expires_at, &Rfc3339)
            .map(|exp| exp - time::Duration::seconds(EXPIRY_MARGIN_SECS) > now)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Cached, refreshing, interactively bootstrapped credentials.
///
/// One consent covers both YouTube and Drive; the result is persisted to
/// `cache_path` and refreshed with the refresh token from then on.
pub struct Authenticator {
    http: reqwest::Client,
    secrets: ClientSecrets,
    cache_path: PathBuf,
    token: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(http: reqwest::Client, secrets: ClientSecrets, cache_path: PathBuf) -> Self {
        Self {
            http,
            secrets,
            cache_path,
            token: Mutex::new(None),
        }
    }

    async fn load_cache(&self) -> Option<CachedToken> {
        let raw = tokio::fs::read_to_string(&self.cache_path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(path = %self.cache_path.display(), error = %e, "ignoring unreadable token cache");
                None
            }
        }
    }

    async fn save_cache(&self, token: &CachedToken) -> Result<(), ApiError> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        tokio::fs::write(&self.cache_path, json).await?;
        Ok(())
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(form)
            .send()
            .await?;
        let response = check_status("oauth/token", response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("token response: {}", e)))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, ApiError> {
        tracing::debug!("refreshing access token");
        let resp = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await?;
        CachedToken::from_response(resp, Some(refresh_token.to_string()))
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<CachedToken, ApiError> {
        let resp = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.secrets.client_id.as_str()),
                ("client_secret", self.secrets.client_secret.as_str()),
            ])
            .await?;
        CachedToken::from_response(resp, None)
    }

    pub fn consent_url(&self, redirect_uri: &str) -> Result<url::Url, ApiError> {
        let scope = SCOPES.join(" ");
        url::Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ApiError::Auth(format!("invalid auth_uri: {}", e)))
    }

    /// Browser consent with a one-shot loopback listener
    async fn authorize_interactive(&self) -> Result<CachedToken, ApiError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);
        let consent = self.consent_url(&redirect_uri)?;

        tracing::info!(url = %consent, "authorize access in your browser");
        if let Err(e) = open::that(consent.as_str()) {
            tracing::warn!(error = %e, "could not open a browser, visit the URL above");
        }

        let code = wait_for_callback(listener, Duration::from_secs(CALLBACK_TIMEOUT_SECS)).await?;
        self.exchange_code(&code, &redirect_uri).await
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn access_token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;

        if guard.is_none() {
            *guard = self.load_cache().await;
        }

        if let Some(token) = guard.as_ref() {
            if token.is_fresh(OffsetDateTime::now_utc()) {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = guard.as_ref().and_then(|t| t.refresh_token.clone());
        let fresh = match refresh_token {
            Some(refresh_token) => match self.refresh(&refresh_token).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(error = %e, "token refresh failed, asking for consent again");
                    self.authorize_interactive().await?
                }
            },
            None => self.authorize_interactive().await?,
        };

        self.save_cache(&fresh).await?;
        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }
}

/// Accept one redirect and pull `code` out of its query string
async fn wait_for_callback(listener: TcpListener, timeout: Duration) -> Result<String, ApiError> {
    let (mut stream, _) = tokio::time::timeout(timeout, listener.accept())
        .await
        .map_err(|_| ApiError::Auth("timed out waiting for the OAuth redirect".to_string()))??;

    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let callback = url::Url::parse(&format!("http://127.0.0.1{}", target))
        .map_err(|e| ApiError::Auth(format!("malformed redirect: {}", e)))?;

    let param = |name: &str| {
        callback
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    let (status_line, message, result) = match (param("code"), param("error")) {
        (Some(code), _) => ("200 OK", "Authorization complete. You can close this tab.", Ok(code)),
        (None, Some(error)) => (
            "400 Bad Request",
            "Authorization was denied.",
            Err(ApiError::Auth(format!("consent denied: {}", error))),
        ),
        (None, None) => (
            "400 Bad Request",
            "No authorization code received.",
            Err(ApiError::Auth("no authorization code in redirect".to_string())),
        ),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h3>{}</h3></body></html>",
        status_line, message
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    result
}
