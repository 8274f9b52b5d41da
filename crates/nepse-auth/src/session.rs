//! Portal session and credential state
//!
//! A [`Session`] owns the current access/refresh tokens and salts for one
//! connection to the portal. It moves between unauthenticated and
//! authenticated by fetching the scrambled token endpoint and running the
//! descrambler; refresh replaces parts of the credentials in place. Nothing
//! here retries — retry policy belongs to the caller.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

use crate::descramble::{descramble, RawTokenResponse, Salts};
use crate::error::{AuthError, AuthResult};
use crate::signer::compute_payload_id;
use crate::transform::TokenTransform;

/// Portal base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://www.nepalstock.com.np";

/// Scheme name in the Authorization header
pub const AUTH_SCHEME: &str = "Salter";

const PROVE_PATH: &str = "/api/authenticate/prove";
const REFRESH_PATH: &str = "/api/authenticate/refresh-token";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// The portal rejects clients that don't look like a browser.
pub const PORTAL_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

/// Credentials held by an authenticated session
///
/// Replaced wholesale by `authenticate`, partially by `refresh`. Owned by
/// exactly one session; never shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
    refresh_token: Option<String>,
    salts: Salts,
    issued_at: u64,
}

impl Credentials {
    /// Assemble credentials from previously captured parts
    ///
    /// Useful for restoring a session without a fresh authenticate round
    /// trip.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        salts: Salts,
        issued_at: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            salts,
            issued_at,
        }
    }

    /// The descrambled access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The descrambled refresh token, if one is held
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Salts issued alongside the tokens
    pub fn salts(&self) -> &Salts {
        &self.salts
    }

    /// Epoch seconds at which the tokens were issued
    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("salts", &self.salts)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Body of `POST /api/authenticate/refresh-token`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Milliseconds since epoch
    #[serde(default)]
    server_time: Option<i64>,
    #[serde(default)]
    salt: Option<Vec<i64>>,
}

/// One authenticated connection to the portal
///
/// # Example
///
/// ```no_run
/// use nepse_auth::{Session, WasmTransform};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transform = WasmTransform::from_env()?;
/// let mut session = Session::new(transform);
///
/// let headers = session.auth_headers().await?; // authenticates lazily
/// # Ok(())
/// # }
/// ```
pub struct Session {
    client: Client,
    base_url: String,
    transform: Box<dyn TokenTransform + Send + Sync>,
    credentials: Option<Credentials>,
}

impl Session {
    /// Create a session against the production portal
    pub fn new(transform: impl TokenTransform + Send + Sync + 'static) -> Self {
        Self::with_base_url(transform, DEFAULT_BASE_URL)
    }

    /// Create a session against a custom base URL
    pub fn with_base_url(
        transform: impl TokenTransform + Send + Sync + 'static,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client: build_http_client(&base_url),
            base_url,
            transform: Box::new(transform),
            credentials: None,
        }
    }

    /// Restore a session from previously captured credentials
    pub fn restore(
        transform: impl TokenTransform + Send + Sync + 'static,
        base_url: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        let mut session = Self::with_base_url(transform, base_url);
        session.credentials = Some(credentials);
        session
    }

    /// The configured portal base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the session currently holds credentials
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Current credentials, if authenticated
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Salts from the last authenticate/refresh, if any
    pub fn salts(&self) -> Option<&Salts> {
        self.credentials.as_ref().map(Credentials::salts)
    }

    /// Fetch the scrambled token response and replace the held credentials
    ///
    /// Transport failures and non-2xx statuses surface as
    /// [`AuthError::Authentication`]; a failed attempt leaves the session
    /// unauthenticated if it was, or keeps the previous credentials if it
    /// was not. No retry is performed here.
    #[instrument(skip(self))]
    pub async fn authenticate(&mut self) -> AuthResult<()> {
        let url = format!("{}{}", self.base_url, PROVE_PATH);
        debug!("fetching scrambled token");

        let raw: RawTokenResponse = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AuthError::Authentication)?
            .json()
            .await
            .map_err(AuthError::Authentication)?;

        let tokens = descramble(self.transform.as_ref(), &raw)?;

        self.credentials = Some(Credentials {
            access_token: tokens.access_token,
            refresh_token: Some(tokens.refresh_token),
            salts: tokens.salts,
            issued_at: epoch_secs(),
        });

        info!("authenticated; token descrambled");
        Ok(())
    }

    /// Headers for an authenticated request, authenticating first if needed
    ///
    /// This is the only place authentication is triggered implicitly, and it
    /// happens at most once per call.
    pub async fn auth_headers(&mut self) -> AuthResult<HeaderMap> {
        if self.credentials.is_none() {
            self.authenticate().await?;
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AuthError::Unauthenticated("authentication did not yield credentials"))?;

        bearer_headers(credentials.access_token())
    }

    /// Exchange the held refresh token for a fresh access token
    ///
    /// On success the access token is replaced, salts are replaced when the
    /// response carries a 5-element `salt` array, and the refresh token is
    /// replaced only when the response provides a new one. On failure the
    /// previous credentials are kept untouched and the error surfaces; this
    /// never falls back to `authenticate`.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> AuthResult<()> {
        let (access_token, refresh_token) = match &self.credentials {
            Some(credentials) => match credentials.refresh_token() {
                Some(token) => (credentials.access_token.clone(), token.to_string()),
                None => return Err(AuthError::Unauthenticated("no refresh token held")),
            },
            None => return Err(AuthError::Unauthenticated("refresh requires a prior authenticate")),
        };

        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        debug!("refreshing access token");

        let body: RefreshResponse = self
            .client
            .post(&url)
            .headers(bearer_headers(&access_token)?)
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(AuthError::Refresh)?
            .json()
            .await
            .map_err(AuthError::Refresh)?;

        let credentials = self
            .credentials
            .as_mut()
            .ok_or(AuthError::Unauthenticated("refresh requires a prior authenticate"))?;

        if let Some(token) = body.access_token {
            credentials.access_token = token;
        }
        match body.server_time {
            Some(ms) if ms >= 0 => credentials.issued_at = (ms / 1000) as u64,
            _ => credentials.issued_at = epoch_secs(),
        }
        if let Some(values) = body.salt {
            match Salts::from_slice(&values) {
                Some(salts) => credentials.salts = salts,
                None => warn!("refresh returned {} salts, keeping previous", values.len()),
            }
        }
        if let Some(token) = body.refresh_token {
            credentials.refresh_token = Some(token);
        }

        info!("access token refreshed");
        Ok(())
    }

    /// Payload id for a signed POST request, derived from the session salts
    ///
    /// Fails with [`AuthError::Unauthenticated`] when the session has never
    /// authenticated; callers must authenticate first rather than rely on an
    /// implicit fetch here.
    pub fn payload_id(&self, base_id: i64, day_of_month: u32) -> AuthResult<i64> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AuthError::Unauthenticated("payload id requires salts"))?;

        Ok(compute_payload_id(base_id, day_of_month, credentials.salts()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

fn build_http_client(base_url: &str) -> Client {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(base_url) {
        headers.insert(REFERER, value.clone());
        headers.insert(ORIGIN, value);
    }

    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .user_agent(PORTAL_USER_AGENT)
        // The portal serves an incomplete certificate chain.
        .danger_accept_invalid_certs(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

fn bearer_headers(access_token: &str) -> AuthResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&format!("{} {}", AUTH_SCHEME, access_token)).map_err(|_| {
        AuthError::MalformedResponse {
            field: "accessToken",
            reason: "token contains bytes not allowed in a header".to_string(),
        }
    })?;
    headers.insert(AUTHORIZATION, value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthResult;

    struct NoopTransform;

    impl TokenTransform for NoopTransform {
        fn invoke(&self, _name: &str, _args: [i64; 5]) -> AuthResult<i64> {
            Ok(0)
        }
    }

    fn credentials() -> Credentials {
        Credentials::new(
            "access-token-value",
            Some("refresh-token-value".to_string()),
            Salts::new([1, 2, 3, 4, 5]),
            1_700_000_000,
        )
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("access-token-value"));
        assert!(!debug.contains("refresh-token-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = Session::new(NoopTransform);
        assert!(!session.is_authenticated());
        assert!(session.salts().is_none());
        assert_eq!(session.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_restore_holds_credentials() {
        let session = Session::restore(NoopTransform, DEFAULT_BASE_URL, credentials());
        assert!(session.is_authenticated());
        assert_eq!(
            session.credentials().unwrap().access_token(),
            "access-token-value"
        );
    }

    #[test]
    fn test_payload_id_requires_salts() {
        let session = Session::new(NoopTransform);
        assert!(matches!(
            session.payload_id(147, 12),
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_payload_id_uses_session_salts() {
        let session = Session::restore(
            NoopTransform,
            DEFAULT_BASE_URL,
            Credentials::new(
                "a",
                None,
                Salts::new([100, 200, 300, 400, 500]),
                0,
            ),
        );
        assert_eq!(session.payload_id(147, 12).unwrap(), 5534);
    }

    #[tokio::test]
    async fn test_refresh_without_credentials_is_a_precondition_error() {
        let mut session = Session::new(NoopTransform);
        assert!(matches!(
            session.refresh().await,
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_bearer_headers_carry_the_salter_scheme() {
        let headers = bearer_headers("tok").unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Salter tok"
        );
    }
}
